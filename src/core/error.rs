//! Pilot 错误类型
//!
//! 配置 / 接口描述 / Schema 注册表 / LLM / 工具执行。畸形的模型响应不在此列：
//! 它是编排循环的一等结果（DoneError），不是错误。

use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LlmError;

/// 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PilotError {
    /// 启动即致命：未提供 Completion Client 凭据
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Failed to read interface description {path}: {source}")]
    SpecRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Interface description parse error: {0}")]
    SpecParse(String),

    #[error("Unresolved reference: {0}")]
    UnresolvedRef(String),

    #[error("Reference cycle through: {0}")]
    RefCycle(String),

    #[error("Invalid operation schema: {0}")]
    InvalidSchema(String),

    #[error("Duplicate operation: {0}")]
    DuplicateOperation(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for PilotError {
    fn from(e: config::ConfigError) -> Self {
        PilotError::ConfigError(e.to_string())
    }
}
