use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

/// 代理人設的圖示種類，實際顯示的符號由畫面層決定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentIcon {
    Code,
    PenTool,
    Languages,
    #[default]
    Bot,
}

/// 一個可供選擇的代理人設。啟動後不再變動。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentDescriptor {
    /// 唯一識別碼。
    pub id: String,
    /// 顯示名稱。
    pub display_name: String,
    #[serde(default)]
    pub icon: AgentIcon,
    /// 每次請求開頭插入的系統提示。
    pub system_prompt: String,
}

impl AgentDescriptor {
    fn builtin(id: &str, display_name: &str, icon: AgentIcon, system_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            icon,
            system_prompt: system_prompt.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent id `{0}` is defined more than once")]
    DuplicateId(String),
    #[error("agent `{0}` has an empty {1}")]
    EmptyField(String, &'static str),
}

/// 所有可用人設的固定清單，順序即選單顯示順序。
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    /// 內建的五個人設。
    pub fn builtin() -> Self {
        let agents = vec![
            AgentDescriptor::builtin(
                "python",
                "Python ProPrompt",
                AgentIcon::Code,
                "You are an expert Python programmer. Provide detailed, efficient, and well-commented Python code solutions.",
            ),
            AgentDescriptor::builtin(
                "cpp",
                "C++ Expert",
                AgentIcon::Code,
                "You are a C++ expert. Offer optimized C++ code solutions with clear explanations of advanced concepts.",
            ),
            AgentDescriptor::builtin(
                "writer",
                "Creative Writer",
                AgentIcon::PenTool,
                "You are a creative writer. Generate engaging and original content across various genres and styles.",
            ),
            AgentDescriptor::builtin(
                "translator",
                "Language Translator",
                AgentIcon::Languages,
                "You are a multilingual translator. Provide accurate translations between languages, considering context and cultural nuances.",
            ),
            AgentDescriptor::builtin(
                "general",
                "General Assistant",
                AgentIcon::Bot,
                "You are a helpful AI assistant. Provide informative and friendly responses on a wide range of topics.",
            ),
        ];
        Self { agents }
    }

    /// 在內建人設之後加上設定檔中的額外人設。
    ///
    /// 識別碼重複或欄位空白時回傳錯誤，整份清單都不會被採用。
    pub fn with_extra(
        mut self,
        extra: impl IntoIterator<Item = AgentDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut seen: HashSet<String> = self.agents.iter().map(|a| a.id.clone()).collect();
        for agent in extra {
            if agent.id.trim().is_empty() {
                return Err(RegistryError::EmptyField(agent.display_name, "id"));
            }
            if agent.display_name.trim().is_empty() {
                return Err(RegistryError::EmptyField(agent.id, "display_name"));
            }
            if agent.system_prompt.trim().is_empty() {
                return Err(RegistryError::EmptyField(agent.id, "system_prompt"));
            }
            if !seen.insert(agent.id.clone()) {
                return Err(RegistryError::DuplicateId(agent.id));
            }
            self.agents.push(agent);
        }
        Ok(self)
    }

    pub fn agents(&self) -> &[AgentDescriptor] {
        &self.agents
    }

    pub fn get(&self, index: usize) -> Option<&AgentDescriptor> {
        self.agents.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.agents.iter().position(|agent| agent.id == id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
