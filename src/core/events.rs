//! 编排过程事件：用于控制台等前端展示远程调用、工具调用与终止状态

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    /// 第 n 次调用 Completion Client（从 1 开始）
    LlmCall { call: usize },
    /// 开始处理一次工具调用；call_number 为本会话第几次工具调用（从 1 开始）
    ToolCall {
        call_number: usize,
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具结果（预览，避免过长）
    ToolResult { id: String, tool: String, preview: String },
    /// 预算耗尽，同一回复中剩余的调用未处理
    ToolSkipped { id: String, tool: String },
    /// 模型给出最终文本
    Message { text: String },
    /// 达到工具调用上限
    MaxCallsReached { max_calls: usize },
    /// 畸形回复，会话终止
    Error { text: String, reason: String },
}
