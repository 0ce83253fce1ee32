//! LLM 客户端抽象
//!
//! Completion Client 边界：给定对话记录、可调用操作与选择模式，返回一条 assistant 回复。
//! 回复形态（文本 / 工具调用 / 畸形）由 `AssistantReply::shape` 显式区分，而不是靠错误分支。

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::PilotError;
use crate::memory::{Message, ToolCall};
use crate::tools::OperationSchema;

/// 远程调用失败（不重试，直接向上传播）
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Empty response: no choices returned")]
    EmptyResponse,

    #[error("Request build failed: {0}")]
    Request(String),
}

/// 工具选择模式：禁用 / 由模型决定 / 必须调用 / 指定某个操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    None,
    Auto,
    Required,
    Function(String),
}

impl ToolChoice {
    /// API 中 tool_choice 字段的取值
    pub fn to_value(&self) -> Value {
        match self {
            ToolChoice::None => Value::from("none"),
            ToolChoice::Auto => Value::from("auto"),
            ToolChoice::Required => Value::from("required"),
            ToolChoice::Function(name) => serde_json::json!({
                "type": "function",
                "function": { "name": name }
            }),
        }
    }
}

impl FromStr for ToolChoice {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(ToolChoice::None),
            "auto" => Ok(ToolChoice::Auto),
            "required" => Ok(ToolChoice::Required),
            other => match other.strip_prefix("function:") {
                Some(name) if !name.trim().is_empty() => {
                    Ok(ToolChoice::Function(name.trim().to_string()))
                }
                _ => Err(PilotError::ConfigError(format!(
                    "unknown tool_choice '{other}' (expected none / auto / required / function:<name>)"
                ))),
            },
        }
    }
}

/// 一次补全请求
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    /// 为空时不向模型提供任何工具
    pub tools: &'a [OperationSchema],
    pub tool_choice: Option<&'a ToolChoice>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    /// 纯对话请求（不带工具）
    pub fn chat(messages: &'a [Message]) -> Self {
        Self {
            messages,
            tools: &[],
            tool_choice: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a [OperationSchema], choice: &'a ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// 模型返回的函数调用片段（未校验）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    /// JSON 编码的参数字符串
    #[serde(default)]
    pub arguments: Option<String>,
}

/// 模型返回的工具调用（未校验）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub function: Option<RawFunctionCall>,
}

impl RawToolCall {
    /// 校验为 ToolCall：id、name、arguments 缺一不可，arguments 必须是 JSON 对象
    pub fn validate(&self) -> Result<ToolCall, String> {
        let id = self
            .id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or("tool call without id")?;
        let function = self
            .function
            .as_ref()
            .ok_or_else(|| format!("tool call {id} without function payload"))?;
        let name = function
            .name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("tool call {id} without function name"))?;
        let raw_args = function
            .arguments
            .as_deref()
            .ok_or_else(|| format!("tool call {id} ({name}) without arguments"))?;
        let arguments: Value = serde_json::from_str(raw_args)
            .map_err(|e| format!("tool call {id} ({name}) has invalid arguments: {e}"))?;
        if !arguments.is_object() {
            return Err(format!("tool call {id} ({name}) arguments are not an object"));
        }
        Ok(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        })
    }
}

/// 一条 assistant 回复（choices[0]）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<RawToolCall>>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// 回复形态
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyShape {
    /// 面向用户的文本
    Message(String),
    /// 一个或多个合法的工具调用
    ToolCalls(Vec<ToolCall>),
    /// 声称要调用工具但载荷缺失或无法解析
    Malformed { text: String, reason: String },
}

impl AssistantReply {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: None,
            finish_reason: Some("stop".to_string()),
        }
    }

    /// 单个工具调用的回复，id 随机生成
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: Some(vec![RawToolCall {
                id: Some(format!("call_{}", uuid::Uuid::new_v4().simple())),
                kind: Some("function".to_string()),
                function: Some(RawFunctionCall {
                    name: Some(name.into()),
                    arguments: Some(arguments.to_string()),
                }),
            }]),
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// 按形态分类回复
    pub fn shape(&self) -> ReplyShape {
        let text = self.text().to_string();
        match &self.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let mut parsed = Vec::with_capacity(calls.len());
                for raw in calls {
                    match raw.validate() {
                        Ok(call) => parsed.push(call),
                        Err(reason) => return ReplyShape::Malformed { text, reason },
                    }
                }
                ReplyShape::ToolCalls(parsed)
            }
            Some(_) => ReplyShape::Malformed {
                text,
                reason: "empty tool_calls list".to_string(),
            },
            None if self.finish_reason.as_deref() == Some("tool_calls") => ReplyShape::Malformed {
                text,
                reason: "finish_reason is tool_calls but no tool call was returned".to_string(),
            },
            None => ReplyShape::Message(text),
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回 choices[0]
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantReply, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
