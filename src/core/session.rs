//! 编排会话状态
//!
//! 一次用户任务一个会话：对话记录以 [system, user] 起步，call_count 从 0 单调递增且不超过 max_calls。
//! 会话只在循环期间存在，结束后以 SessionOutcome 交还调用方。

use serde::Serialize;

use crate::memory::{Message, Transcript};

/// 编排循环的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Running,
    /// 已收到工具调用请求，正在逐个写回结果
    AwaitingToolResult,
    DoneMessage,
    DoneMaxCalls,
    DoneError,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::DoneMessage | SessionState::DoneMaxCalls | SessionState::DoneError
        )
    }
}

/// 会话如何结束
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// 模型给出的最终文本
    Message(String),
    /// 工具调用次数达到上限
    MaxCalls,
    /// 畸形回复：text 为最后一条 assistant 消息文本，reason 为解析失败原因
    Error { text: String, reason: String },
}

/// 会话结束后的结果
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub termination: Termination,
    pub call_count: usize,
    pub max_calls: usize,
    /// 远程调用次数
    pub llm_calls: usize,
    pub transcript: Transcript,
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self.termination {
            Termination::Message(_) => SessionState::DoneMessage,
            Termination::MaxCalls => SessionState::DoneMaxCalls,
            Termination::Error { .. } => SessionState::DoneError,
        }
    }
}

/// 单个编排会话
#[derive(Debug, Clone)]
pub struct OrchestrationSession {
    id: String,
    transcript: Transcript,
    call_count: usize,
    max_calls: usize,
    llm_calls: usize,
    state: SessionState,
    termination: Option<Termination>,
}

impl OrchestrationSession {
    pub fn new(system_prompt: &str, instruction: &str, max_calls: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transcript: Transcript::seeded(system_prompt, instruction),
            call_count: 0,
            max_calls,
            llm_calls: 0,
            state: SessionState::Running,
            termination: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn call_count(&self) -> usize {
        self.call_count
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn llm_calls(&self) -> usize {
        self.llm_calls
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn budget_exhausted(&self) -> bool {
        self.call_count >= self.max_calls
    }

    pub(crate) fn push(&mut self, msg: Message) {
        self.transcript.push(msg);
    }

    pub(crate) fn record_llm_call(&mut self) -> usize {
        self.llm_calls += 1;
        self.llm_calls
    }

    /// 记录一次已处理的工具调用，返回新的 call_count
    pub(crate) fn record_tool_call(&mut self) -> usize {
        debug_assert!(self.call_count < self.max_calls);
        self.call_count += 1;
        self.call_count
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn finish(&mut self, termination: Termination) {
        self.state = match termination {
            Termination::Message(_) => SessionState::DoneMessage,
            Termination::MaxCalls => SessionState::DoneMaxCalls,
            Termination::Error { .. } => SessionState::DoneError,
        };
        self.termination = Some(termination);
    }

    /// 结束会话；未到终止状态时视为预算耗尽
    pub fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.id,
            termination: self.termination.unwrap_or(Termination::MaxCalls),
            call_count: self.call_count,
            max_calls: self.max_calls,
            llm_calls: self.llm_calls,
            transcript: self.transcript,
        }
    }
}
