//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PILOT__*` 覆盖（双下划线表示嵌套，如 `PILOT__ORCHESTRATOR__MAX_CALLS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::PilotError;
use crate::llm::ToolChoice;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub drone: DroneSection,
    #[serde(default)]
    pub openapi: OpenApiSection,
}

/// [llm] 段：模型、端点与凭据
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [chat] 段：交互式对话
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    /// 覆盖 [llm].model
    pub model: Option<String>,
    #[serde(default = "default_chat_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: default_chat_system_prompt(),
            temperature: 0.0,
        }
    }
}

fn default_chat_system_prompt() -> String {
    "You are a Chatbot named Claire.".to_string()
}

/// [orchestrator] 段：工具调用编排循环
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    pub model: Option<String>,
    #[serde(default = "default_orchestrator_system_prompt")]
    pub system_prompt: String,
    /// 单个会话内工具调用次数上限
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    /// none / auto / required / function:<name>
    #[serde(default = "default_tool_choice")]
    pub tool_choice: String,
    #[serde(default)]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: default_orchestrator_system_prompt(),
            max_calls: default_max_calls(),
            tool_choice: default_tool_choice(),
            temperature: 0.0,
            max_tokens: None,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl OrchestratorSection {
    pub fn tool_choice(&self) -> Result<ToolChoice, PilotError> {
        self.tool_choice.parse()
    }
}

fn default_orchestrator_system_prompt() -> String {
    "You are a helpful assistant.\n\
     Respond to the following prompt by using function_call and then summarize actions.\n\
     Ask for clarification if a user request is ambiguous."
        .to_string()
}

fn default_max_calls() -> usize {
    5
}

fn default_tool_choice() -> String {
    "auto".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [drone] 段：无人机指令映射演示
#[derive(Debug, Clone, Deserialize)]
pub struct DroneSection {
    pub model: Option<String>,
    /// 未设置时使用内置的无人机控制 prompt
    pub system_prompt: Option<String>,
    #[serde(default = "default_drone_temperature")]
    pub temperature: f32,
    #[serde(default = "default_drone_max_tokens")]
    pub max_tokens: u32,
}

impl Default for DroneSection {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            temperature: default_drone_temperature(),
            max_tokens: default_drone_max_tokens(),
        }
    }
}

fn default_drone_temperature() -> f32 {
    1.0
}

fn default_drone_max_tokens() -> u32 {
    500
}

/// [openapi] 段：接口描述文件与默认指令
#[derive(Debug, Clone, Deserialize)]
pub struct OpenApiSection {
    #[serde(default = "default_spec_path")]
    pub spec_path: PathBuf,
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

impl Default for OpenApiSection {
    fn default() -> Self {
        Self {
            spec_path: default_spec_path(),
            instruction: default_instruction(),
        }
    }
}

fn default_spec_path() -> PathBuf {
    PathBuf::from("data/example_events_openapi.json")
}

fn default_instruction() -> String {
    "Instruction: Get all the events.\n\
     Then create a new event named AGI Party.\n\
     Then delete event with id 2456."
        .to_string()
}

impl AppConfig {
    /// 指定段的模型名，未覆盖时回落到 [llm].model
    pub fn model_for<'a>(&'a self, section_model: Option<&'a String>) -> &'a str {
        section_model.map(String::as_str).unwrap_or(&self.llm.model)
    }
}

/// 解析凭据：配置中的 api_key 优先，其次环境变量 OPENAI_API_KEY；都缺失则启动失败
pub fn resolve_api_key(llm: &LlmSection) -> Result<String, PilotError> {
    llm.api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            PilotError::MissingCredential(
                "set OPENAI_API_KEY or llm.api_key in config/default.toml".to_string(),
            )
        })
}

/// 从 config 目录加载配置，环境变量 PILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载配置；失败时告警并使用默认值
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.orchestrator.max_calls, 5);
        assert_eq!(cfg.chat.temperature, 0.0);
        assert_eq!(cfg.drone.max_tokens, 500);
        assert_eq!(cfg.orchestrator.tool_choice().unwrap(), ToolChoice::Auto);
        assert_eq!(cfg.model_for(cfg.chat.model.as_ref()), "gpt-4o-mini");
    }

    #[test]
    fn test_explicit_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[orchestrator]\nmax_calls = 2\ntool_choice = \"required\"\n[chat]\nmodel = \"gpt-4o\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.orchestrator.max_calls, 2);
        assert_eq!(cfg.orchestrator.tool_choice().unwrap(), ToolChoice::Required);
        assert_eq!(cfg.model_for(cfg.chat.model.as_ref()), "gpt-4o");
        assert_eq!(cfg.orchestrator.tool_timeout_secs, 30);
    }

    #[test]
    fn test_bad_tool_choice_is_config_error() {
        let section = OrchestratorSection {
            tool_choice: "sometimes".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            section.tool_choice(),
            Err(PilotError::ConfigError(_))
        ));
    }

    #[test]
    fn test_api_key_from_config() {
        let llm = LlmSection {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&llm).unwrap(), "sk-test");
    }

    #[test]
    fn test_blank_api_key_in_config_falls_through() {
        let llm = LlmSection {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        // 空白凭据视同缺失：结果取决于环境变量，但绝不能返回空白串
        match resolve_api_key(&llm) {
            Ok(key) => assert!(!key.trim().is_empty()),
            Err(e) => assert!(matches!(e, PilotError::MissingCredential(_))),
        }
    }
}
