//! Pilot - Function Calling 演示集
//!
//! 模块划分：
//! - **chat**: 交互式对话循环（不带工具）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、编排会话状态、有界工具调用循环
//! - **llm**: Completion Client 抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 只追加的对话记录
//! - **observability**: 日志初始化
//! - **tools**: 操作 Schema 注册表、无人机目录、OpenAPI 派生、动作执行

pub mod chat;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use crate::chat::{run_chat, ChatSettings};
pub use crate::core::{Orchestrator, OrchestratorSettings, PilotError, SessionOutcome, Termination};
