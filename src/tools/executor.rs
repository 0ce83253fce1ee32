//! 工具执行器
//!
//! ActionHandler 是可插拔的动作执行接口；默认的 SimulatedHandler 不产生副作用，恒返回固定结果。
//! ToolExecutor 对每次调用施加超时，失败转为 PilotError，并输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::core::PilotError;
use crate::memory::ToolCall;

/// 动作执行接口：接收已校验的工具调用，返回写回对话的结果文本
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<String, String>;
}

/// 模拟执行：不调用任何外部系统，直接返回固定结果
#[derive(Debug, Clone)]
pub struct SimulatedHandler {
    response: String,
}

impl SimulatedHandler {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for SimulatedHandler {
    fn default() -> Self {
        Self::new("success")
    }
}

#[async_trait]
impl ActionHandler for SimulatedHandler {
    async fn execute(&self, call: &ToolCall) -> Result<String, String> {
        tracing::debug!(tool = %call.name, "simulated execution");
        Ok(self.response.clone())
    }
}

/// 工具执行器：超时 + 审计日志
pub struct ToolExecutor {
    handler: Arc<dyn ActionHandler>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(handler: Arc<dyn ActionHandler>, timeout_secs: u64) -> Self {
        Self {
            handler,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 使用 SimulatedHandler 的执行器
    pub fn simulated(timeout_secs: u64) -> Self {
        Self::new(Arc::new(SimulatedHandler::default()), timeout_secs)
    }

    /// 执行工具调用；超时返回 ToolTimeout，handler 返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(&self, call: &ToolCall) -> Result<String, PilotError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.handler.execute(call)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview(&call.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(PilotError::ToolExecutionFailed(format!("{}: {e}", call.name))),
            Err(_) => Err(PilotError::ToolTimeout(call.name.clone())),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingHandler;

    #[async_trait]
    impl ActionHandler for FailingHandler {
        async fn execute(&self, _call: &ToolCall) -> Result<String, String> {
            Err("drone offline".to_string())
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl ActionHandler for SlowHandler {
        async fn execute(&self, _call: &ToolCall) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn call() -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: "takeoff_drone".into(),
            arguments: json!({"altitude": 50}),
        }
    }

    #[tokio::test]
    async fn test_simulated_returns_success() {
        let exec = ToolExecutor::simulated(5);
        assert_eq!(exec.execute(&call()).await.unwrap(), "success");
    }

    #[tokio::test]
    async fn test_handler_error_maps_to_execution_failed() {
        let exec = ToolExecutor::new(Arc::new(FailingHandler), 5);
        let err = exec.execute(&call()).await.unwrap_err();
        assert!(matches!(err, PilotError::ToolExecutionFailed(msg) if msg.contains("drone offline")));
    }

    #[tokio::test]
    async fn test_timeout() {
        let exec = ToolExecutor::new(Arc::new(SlowHandler), 1);
        let err = exec.execute(&call()).await.unwrap_err();
        assert!(matches!(err, PilotError::ToolTimeout(name) if name == "takeoff_drone"));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({"text": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&json!({})), "{}");
    }
}
