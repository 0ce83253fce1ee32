//! 编排循环：有界的多步工具调用
//!
//! 每一步：检查预算 -> 调用 Completion Client -> 回复写入对话 -> 按回复形态分支：
//! - 工具调用：逐个执行并写回 tool 结果（关联调用 id），每处理一个 call_count + 1，继续
//! - 文本：DoneMessage
//! - 畸形：DoneError，以最后一条 assistant 文本作为诊断
//!
//! 每一步要么消耗至少一个预算单位，要么终止，因此最多 max_calls + 1 次远程调用。
//! 远程调用失败不在此处理，直接以 Err 向上传播。

use tokio::sync::mpsc::UnboundedSender;

use crate::config::OrchestratorSection;
use crate::core::{
    OrchestrationEvent, OrchestrationSession, PilotError, SessionOutcome, SessionState,
    Termination,
};
use crate::llm::{CompletionRequest, LlmClient, ReplyShape, ToolChoice};
use crate::memory::Message;
use crate::tools::{SchemaRegistry, ToolExecutor};

/// 默认的工具调用上限
pub const DEFAULT_MAX_CALLS: usize = 5;
/// 工具结果预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 编排参数
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_calls: usize,
    pub tool_choice: ToolChoice,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            tool_choice: ToolChoice::Auto,
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(section: &OrchestratorSection) -> Result<Self, PilotError> {
        Ok(Self {
            max_calls: section.max_calls,
            tool_choice: section.tool_choice()?,
            temperature: Some(section.temperature),
            max_tokens: section.max_tokens,
        })
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls;
        self
    }
}

/// 编排器：持有客户端、操作目录与执行器的引用，按会话驱动循环
pub struct Orchestrator<'a> {
    client: &'a dyn LlmClient,
    registry: &'a SchemaRegistry,
    executor: &'a ToolExecutor,
    settings: OrchestratorSettings,
    event_tx: Option<&'a UnboundedSender<OrchestrationEvent>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        registry: &'a SchemaRegistry,
        executor: &'a ToolExecutor,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            client,
            registry,
            executor,
            settings,
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<OrchestrationEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: OrchestrationEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 新建会话：对话记录为 [system, user]
    pub fn start(&self, system_prompt: &str, instruction: &str) -> OrchestrationSession {
        OrchestrationSession::new(system_prompt, instruction, self.settings.max_calls)
    }

    /// 执行完整会话直到终止
    pub async fn run(
        &self,
        system_prompt: &str,
        instruction: &str,
    ) -> Result<SessionOutcome, PilotError> {
        let mut session = self.start(system_prompt, instruction);
        while !self.step(&mut session).await?.is_terminal() {}

        let outcome = session.into_outcome();
        tracing::info!(
            session = %outcome.session_id,
            state = ?outcome.state(),
            call_count = outcome.call_count,
            llm_calls = outcome.llm_calls,
            "orchestration finished"
        );
        Ok(outcome)
    }

    /// 执行一步，返回执行后的状态；已终止的会话原样返回
    pub async fn step(&self, session: &mut OrchestrationSession) -> Result<SessionState, PilotError> {
        if session.state().is_terminal() {
            return Ok(session.state());
        }

        if session.budget_exhausted() {
            tracing::warn!(
                session = %session.id(),
                max_calls = session.max_calls(),
                "reached max chained function calls"
            );
            self.send_event(OrchestrationEvent::MaxCallsReached {
                max_calls: session.max_calls(),
            });
            session.finish(Termination::MaxCalls);
            return Ok(session.state());
        }

        let call = session.record_llm_call();
        self.send_event(OrchestrationEvent::LlmCall { call });
        tracing::debug!(
            session = %session.id(),
            call,
            messages = session.transcript().len(),
            "calling completion client"
        );

        let request = CompletionRequest::chat(session.transcript().messages())
            .with_tools(self.registry.operations(), &self.settings.tool_choice)
            .with_max_tokens(self.settings.max_tokens);
        let request = match self.settings.temperature {
            Some(t) => request.with_temperature(t),
            None => request,
        };
        let reply = self.client.complete(request).await?;

        match reply.shape() {
            ReplyShape::Message(text) => {
                session.push(Message::assistant(text.clone()));
                self.send_event(OrchestrationEvent::Message { text: text.clone() });
                session.finish(Termination::Message(text));
            }
            ReplyShape::Malformed { text, reason } => {
                session.push(Message::assistant(text));
                let diagnostic = session
                    .transcript()
                    .last_assistant_text()
                    .unwrap_or_default()
                    .to_string();
                tracing::warn!(session = %session.id(), %reason, "malformed tool call response");
                self.send_event(OrchestrationEvent::Error {
                    text: diagnostic.clone(),
                    reason: reason.clone(),
                });
                session.finish(Termination::Error {
                    text: diagnostic,
                    reason,
                });
            }
            ReplyShape::ToolCalls(calls) => {
                session.push(Message::assistant_tool_calls(reply.text(), calls.clone()));
                session.set_state(SessionState::AwaitingToolResult);

                for tc in calls {
                    if session.budget_exhausted() {
                        tracing::warn!(session = %session.id(), tool = %tc.name, "call budget exhausted, tool call left unresolved");
                        self.send_event(OrchestrationEvent::ToolSkipped {
                            id: tc.id.clone(),
                            tool: tc.name.clone(),
                        });
                        continue;
                    }
                    self.send_event(OrchestrationEvent::ToolCall {
                        call_number: session.call_count() + 1,
                        id: tc.id.clone(),
                        tool: tc.name.clone(),
                        args: tc.arguments.clone(),
                    });

                    let content = if self.registry.contains(&tc.name) {
                        match self.executor.execute(&tc).await {
                            Ok(r) => r,
                            Err(e) => format!("Error: {e}"),
                        }
                    } else {
                        tracing::warn!(session = %session.id(), tool = %tc.name, "model requested an unknown operation");
                        format!("Error: unknown operation '{}'", tc.name)
                    };

                    self.send_event(OrchestrationEvent::ToolResult {
                        id: tc.id.clone(),
                        tool: tc.name.clone(),
                        preview: preview(&content),
                    });
                    session.push(Message::tool_result(tc.id, content));
                    session.record_tool_call();
                }

                session.set_state(SessionState::Running);
            }
        }

        Ok(session.state())
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", s.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AssistantReply, ScriptedLlmClient};
    use crate::memory::Role;
    use crate::tools::OperationSchema;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_operations([
            OperationSchema::new("listEvents", "List all events", json!({"type": "object", "properties": {}}))
                .unwrap(),
            OperationSchema::new("deleteEvent", "Delete an event", json!({"type": "object", "properties": {}}))
                .unwrap(),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_step_by_step_invariants() {
        let client = ScriptedLlmClient::repeating(AssistantReply::tool_call("listEvents", json!({})));
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default().with_max_calls(3));

        let mut session = orch.start("sys", "list");
        let mut iterations = 0;
        let mut last_count = 0;
        let mut prefix = session.transcript().messages().to_vec();
        loop {
            let state = orch.step(&mut session).await.unwrap();
            iterations += 1;
            assert!(session.call_count() >= last_count);
            assert!(session.call_count() <= session.max_calls());
            assert_eq!(&session.transcript().messages()[..prefix.len()], prefix.as_slice());
            last_count = session.call_count();
            prefix = session.transcript().messages().to_vec();
            if state.is_terminal() {
                break;
            }
        }
        assert_eq!(session.state(), SessionState::DoneMaxCalls);
        assert!(iterations <= 3 + 1);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_tool_result_correlates_to_call_id() {
        let client = ScriptedLlmClient::new(vec![
            AssistantReply::tool_call("deleteEvent", json!({"parameters": {"id": "2456"}})),
            AssistantReply::message("Deleted."),
        ]);
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default());

        let outcome = orch.run("sys", "delete 2456").await.unwrap();
        assert_eq!(outcome.termination, Termination::Message("Deleted.".into()));
        let msgs = outcome.transcript.messages();
        assert_eq!(msgs.len(), 5);
        let call_id = &msgs[2].tool_calls[0].id;
        assert_eq!(msgs[3].role, Role::Tool);
        assert_eq!(msgs[3].tool_call_id.as_ref(), Some(call_id));
        assert_eq!(msgs[3].content, "success");
        assert_eq!(msgs[4].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_multiple_calls_in_one_reply_respect_budget() {
        let mut reply = AssistantReply::tool_call("listEvents", json!({}));
        let extra = AssistantReply::tool_call("deleteEvent", json!({}));
        let extra2 = AssistantReply::tool_call("deleteEvent", json!({}));
        let calls = reply.tool_calls.as_mut().unwrap();
        calls.extend(extra.tool_calls.unwrap());
        calls.extend(extra2.tool_calls.unwrap());

        let client = ScriptedLlmClient::repeating(reply);
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default().with_max_calls(2));

        let outcome = orch.run("sys", "do three things").await.unwrap();
        assert_eq!(outcome.state(), SessionState::DoneMaxCalls);
        assert_eq!(outcome.call_count, 2);
        assert_eq!(outcome.llm_calls, 1);
        let tool_turns = outcome
            .transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_turns, 2);
    }

    #[tokio::test]
    async fn test_unknown_operation_reports_error_result() {
        let client = ScriptedLlmClient::new(vec![
            AssistantReply::tool_call("launchRocket", json!({})),
            AssistantReply::message("Sorry."),
        ]);
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default());

        let outcome = orch.run("sys", "launch").await.unwrap();
        assert_eq!(outcome.call_count, 1);
        assert!(outcome.transcript.messages()[3].content.contains("unknown operation"));
    }

    #[tokio::test]
    async fn test_zero_budget_makes_no_calls() {
        let client = ScriptedLlmClient::repeating(AssistantReply::message("hi"));
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default().with_max_calls(0));

        let outcome = orch.run("sys", "anything").await.unwrap();
        assert_eq!(outcome.state(), SessionState::DoneMaxCalls);
        assert_eq!(client.calls(), 0);
        assert_eq!(outcome.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let client = ScriptedLlmClient::new(vec![
            AssistantReply::tool_call("listEvents", json!({})),
            AssistantReply::message("Here they are."),
        ]);
        let reg = registry();
        let exec = ToolExecutor::simulated(5);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let orch = Orchestrator::new(&client, &reg, &exec, OrchestratorSettings::default()).with_event_tx(&tx);

        orch.run("sys", "list").await.unwrap();
        drop(tx);
        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec!["llm_call", "tool_call", "tool_result", "llm_call", "message"]
        );
    }
}
