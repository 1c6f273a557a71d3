use std::path::Path;

use anyhow::{Context, Result};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Deserializers, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::LogSettings;

/// 使用者自訂的 log4rs 設定檔位置。存在時優先使用。
pub const LOG4RS_CONFIG_PATH: &str = "config/log4rs.yaml";

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:<5} {t} - {m}{n}";

/// 初始化日誌系統。
///
/// 終端介面佔用了 stdout，所以日誌一律寫到檔案。
pub fn init(workspace_root: &Path, settings: &LogSettings) -> Result<()> {
    let yaml_path = workspace_root.join(LOG4RS_CONFIG_PATH);
    if yaml_path.is_file() {
        log4rs::init_file(&yaml_path, Deserializers::default())
            .with_context(|| format!("載入日誌設定失敗: {}", yaml_path.display()))?;
        return Ok(());
    }

    let config = file_config(workspace_root, settings)?;
    log4rs::init_config(config).context("初始化日誌系統失敗")?;
    Ok(())
}

fn file_config(workspace_root: &Path, settings: &LogSettings) -> Result<Config> {
    let level = settings.level_filter()?;
    let log_path = workspace_root.join(&settings.file);
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&log_path)
        .with_context(|| format!("無法開啟日誌檔: {}", log_path.display()))?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(level))
        .context("建立日誌設定失敗")?;
    Ok(config)
}
