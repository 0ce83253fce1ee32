//! 核心编排层：错误类型、会话状态、有界工具调用循环与过程事件

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;

pub use error::PilotError;
pub use events::OrchestrationEvent;
pub use orchestrator::{Orchestrator, OrchestratorSettings, DEFAULT_MAX_CALLS};
pub use session::{OrchestrationSession, SessionOutcome, SessionState, Termination};
