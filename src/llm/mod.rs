//! LLM 层：Completion Client 抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{
    AssistantReply, CompletionRequest, LlmClient, LlmError, RawFunctionCall, RawToolCall,
    ReplyShape, ToolChoice,
};
