//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；可设置为永远重复同一条回复。记录调用次数与每次收到的对话记录。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{AssistantReply, CompletionRequest, LlmClient, LlmError};
use crate::memory::Message;

/// 脚本化客户端：预设回复用尽后返回 EmptyResponse
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<AssistantReply>>,
    repeat: Option<AssistantReply>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<AssistantReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// 每次都返回同一条回复
    pub fn repeating(reply: AssistantReply) -> Self {
        Self {
            repeat: Some(reply),
            ..Default::default()
        }
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的对话记录快照
    pub fn seen_transcripts(&self) -> Vec<Vec<Message>> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<AssistantReply, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.messages.to_vec());
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| LlmError::Api(e.to_string()))?
            .pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or(LlmError::EmptyResponse)
    }
}
