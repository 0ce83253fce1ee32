//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。请求与响应走 byot 接口，
//! 用本地 serde 类型表达 tools、assistant 的 tool_calls 与 tool 结果消息。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{resolve_api_key, LlmSection};
use crate::core::PilotError;
use crate::llm::{AssistantReply, CompletionRequest, LlmClient, LlmError};
use crate::memory::{Message, Role};
use crate::tools::OperationSchema;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    /// 按 [llm] 段创建；凭据缺失时返回 MissingCredential
    pub fn from_config(llm: &LlmSection, model: &str) -> Result<Self, PilotError> {
        let api_key = resolve_api_key(llm)?;
        Ok(Self::new(llm.base_url.as_deref(), model, &api_key))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a OperationSchema,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn to_wire_message(m: &Message) -> WireMessage<'_> {
    // 携带工具调用且无文本的 assistant 消息按 API 约定发送 null
    let content = if m.content.is_empty() && !m.tool_calls.is_empty() {
        None
    } else {
        Some(m.content.as_str())
    };
    WireMessage {
        role: m.role,
        content,
        tool_calls: m
            .tool_calls
            .iter()
            .map(|tc| WireToolCall {
                id: &tc.id,
                kind: "function",
                function: WireFunctionCall {
                    name: &tc.name,
                    arguments: tc.arguments.to_string(),
                },
            })
            .collect(),
        tool_call_id: m.tool_call_id.as_deref(),
    }
}

fn build_request<'a>(model: &'a str, request: &CompletionRequest<'a>) -> ChatRequest<'a> {
    let tools: Vec<WireTool<'a>> = request
        .tools
        .iter()
        .map(|op| WireTool {
            kind: "function",
            function: op,
        })
        .collect();
    // 未提供工具时不能携带 tool_choice
    let tool_choice = if tools.is_empty() {
        None
    } else {
        request.tool_choice.map(|c| c.to_value())
    };
    ChatRequest {
        model,
        messages: request.messages.iter().map(to_wire_message).collect(),
        tools,
        tool_choice,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantReply, LlmError> {
        let body = build_request(&self.model, &request);
        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "chat completion request"
        );

        let response: ChatResponse = self
            .client
            .chat()
            .create_byot(body)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage.add(usage.prompt_tokens, usage.completion_tokens);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;
        let mut reply = choice.message;
        if reply.finish_reason.is_none() {
            reply.finish_reason = choice.finish_reason;
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolChoice;
    use crate::memory::ToolCall;
    use serde_json::json;

    #[test]
    fn test_request_with_tools_and_tool_turns() {
        let ops = vec![OperationSchema::new(
            "deleteEvent",
            "Delete an event by ID",
            json!({"type": "object", "properties": {}}),
        )
        .unwrap()];
        let messages = vec![
            Message::system("sys"),
            Message::user("delete 2456"),
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "deleteEvent".into(),
                    arguments: json!({"parameters": {"id": "2456"}}),
                }],
            ),
            Message::tool_result("call_1", "success"),
        ];
        let choice = ToolChoice::Auto;
        let req = CompletionRequest::chat(&messages)
            .with_tools(&ops, &choice)
            .with_temperature(0.0);
        let body = serde_json::to_value(build_request("gpt-4o-mini", &req)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "deleteEvent");
        assert_eq!(body["messages"][2]["content"], Value::Null);
        assert_eq!(body["messages"][2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            body["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"parameters\":{\"id\":\"2456\"}}"
        );
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_chat_request_omits_tool_fields() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let choice = ToolChoice::Auto;
        let req = CompletionRequest::chat(&messages).with_tools(&[], &choice);
        let body = serde_json::to_value(build_request("m", &req)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_response_decoding_moves_finish_reason() {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {"role": "assistant", "content": null}
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        });
        let resp: ChatResponse = serde_json::from_value(raw).unwrap();
        let choice = resp.choices.into_iter().next().unwrap();
        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(resp.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn test_from_config_with_key() {
        let llm = LlmSection {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let client = OpenAiClient::from_config(&llm, "gpt-4o-mini").unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.token_usage(), (0, 0, 0));
    }
}
