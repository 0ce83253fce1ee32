//! 记忆层：会话内的只追加对话记录（不跨会话持久化）

pub mod conversation;

pub use conversation::{Message, Role, ToolCall, Transcript};
