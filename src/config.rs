use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use serde::Deserialize;

use crate::agent::registry::{AgentDescriptor, AgentRegistry, RegistryError};

/// 設定檔相對於工作目錄的位置。
pub const CONFIG_PATH: &str = "config/persona-chat.toml";

/// 應用程式設定的頂層結構，從 `config/persona-chat.toml` 載入。
/// 檔案不存在時全部使用預設值。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// 補全服務的連線設定。
    pub provider: ProviderConfig,
    /// 附加在內建人設之後的額外人設。
    pub agents: Vec<AgentDescriptor>,
    pub ui: UiSettings,
    pub logging: LogSettings,
}

impl AppConfig {
    /// 從指定的工作目錄讀取設定。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_PATH);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("讀取設定失敗: {}", config_path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("解析設定失敗: {}", config_path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        config.logging.level_filter()?;
        Ok(config)
    }

    /// 以內建人設加上設定中的額外人設建立清單。
    pub fn registry(&self) -> Result<AgentRegistry, RegistryError> {
        AgentRegistry::builtin().with_extra(self.agents.iter().cloned())
    }
}

/// OpenAI 相容服務的連線設定。金鑰本身從不寫在檔案裡。
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// API 的基礎 URL，請求會送到 `{base_url}/chat/completions`。
    pub base_url: String,
    /// 要使用的模型名稱。
    pub model: String,
    /// 用於讀取 API 金鑰的環境變數名稱。
    pub api_key_env: String,
    /// 附加到請求中的額外 HTTP 標頭。
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-3.5-turbo".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    /// 從環境變數解析 API 金鑰。空白值視為未設定。
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| env::var(name).ok())
    }

    fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        lookup(&self.api_key_env)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiSettings {
    /// 畫面更新間隔（毫秒）。串流片段在每個 tick 套用。
    pub tick_rate_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self { tick_rate_ms: 250 }
    }
}

impl UiSettings {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(16))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// `off`、`error`、`warn`、`info`、`debug` 或 `trace`。
    pub level: String,
    /// 日誌檔路徑，相對路徑以工作目錄為基準。
    pub file: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: PathBuf::from("logs/persona-chat.log"),
        }
    }
}

impl LogSettings {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("無效的日誌等級: {}", self.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::AgentIcon;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();

        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.ui.tick_rate(), Duration::from_millis(250));
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Info);
        assert_eq!(config.registry().unwrap().len(), 5);
    }

    #[test]
    fn loads_provider_agents_and_ui() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join(CONFIG_PATH),
            r#"
[provider]
base_url = "http://localhost:8000/v1"
model = "llama-3-8b"
api_key_env = "LOCAL_KEY"

[provider.extra_headers]
"X-Team" = "chat"

[[agents]]
id = "rust"
display_name = "Rust Mentor"
icon = "code"
system_prompt = "You teach idiomatic Rust."

[ui]
tick_rate_ms = 50

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.provider.model, "llama-3-8b");
        assert_eq!(config.provider.extra_headers["X-Team"], "chat");
        assert_eq!(config.ui.tick_rate(), Duration::from_millis(50));
        assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::Debug);

        let registry = config.registry().unwrap();
        let rust = &registry.agents()[5];
        assert_eq!(rust.id, "rust");
        assert_eq!(rust.icon, AgentIcon::Code);
    }

    #[test]
    fn agent_icon_defaults_to_bot() {
        let config = AppConfig::from_toml(
            r#"
[[agents]]
id = "chef"
display_name = "Chef"
system_prompt = "You cook."
"#,
        )
        .unwrap();
        assert_eq!(config.agents[0].icon, AgentIcon::Bot);
    }

    #[test]
    fn duplicate_agent_id_is_a_registry_error() {
        let config = AppConfig::from_toml(
            r#"
[[agents]]
id = "general"
display_name = "Another General"
system_prompt = "Hi."
"#,
        )
        .unwrap();
        assert_eq!(
            config.registry().unwrap_err(),
            RegistryError::DuplicateId("general".into())
        );
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join(CONFIG_PATH), "[provider\nmodel = 1").unwrap();

        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("persona-chat.toml"));
    }

    #[test]
    fn unknown_keys_and_bad_levels_are_rejected() {
        assert!(AppConfig::from_toml("[provider]\napi_key = \"sk-inline\"").is_err());
        assert!(AppConfig::from_toml("[logging]\nlevel = \"loud\"").is_err());
    }

    #[test]
    fn api_key_comes_from_named_variable() {
        let provider = ProviderConfig::default();
        let key = provider.resolve_api_key_with(|name| {
            (name == "OPENAI_API_KEY").then(|| " sk-abc \n".to_string())
        });
        assert_eq!(key.as_deref(), Some("sk-abc"));

        let blank = provider.resolve_api_key_with(|_| Some("   ".to_string()));
        assert!(blank.is_none());
    }
}
