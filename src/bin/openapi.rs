//! Pilot OpenAPI 工具链编排演示
//!
//! 读取接口描述 -> 派生操作 Schema 并打印 -> 对一条多步指令运行有界编排循环。
//! 用法：pilot-openapi [接口描述路径] [指令]

use std::path::PathBuf;

use anyhow::Context;
use pilot::{
    config::load_config_or_default,
    core::{OrchestrationEvent, Orchestrator, OrchestratorSettings, Termination},
    llm::{LlmClient, OpenAiClient},
    observability,
    tools::{load_spec, openapi_to_registry, ToolExecutor},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let mut args = std::env::args().skip(1);
    let spec_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.openapi.spec_path.clone());
    let instruction = args.next().unwrap_or_else(|| cfg.openapi.instruction.clone());

    let spec = load_spec(&spec_path).context("Failed to load interface description")?;
    let registry = openapi_to_registry(&spec).context("Failed to derive operations")?;
    let tools = registry.to_tools_json();
    for tool in tools.as_array().map(Vec::as_slice).unwrap_or_default() {
        println!("{}\n", serde_json::to_string_pretty(tool)?);
    }

    let settings =
        OrchestratorSettings::from_config(&cfg.orchestrator).context("Invalid orchestrator config")?;
    let model = cfg.model_for(cfg.orchestrator.model.as_ref());
    let client = OpenAiClient::from_config(&cfg.llm, model).context("Failed to create LLM client")?;
    tracing::info!("Using OpenAI LLM ({})", client.model());
    let executor = ToolExecutor::simulated(cfg.orchestrator.tool_timeout_secs);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            match ev {
                OrchestrationEvent::ToolCall {
                    call_number,
                    tool,
                    args,
                    ..
                } => {
                    println!("\n>> Function call #: {call_number}\n");
                    println!("{tool}({args})");
                }
                OrchestrationEvent::ToolSkipped { tool, .. } => {
                    println!(">> Skipped {tool}: call budget exhausted");
                }
                OrchestrationEvent::Message { text } => {
                    println!("\n>> Message:\n");
                    println!("{text}");
                }
                OrchestrationEvent::Error { text, reason } => {
                    println!("\n>> Malformed response ({reason}):\n");
                    println!("{text}");
                }
                _ => {}
            }
        }
    });

    let outcome = {
        let orchestrator =
            Orchestrator::new(&client, &registry, &executor, settings).with_event_tx(&event_tx);
        orchestrator
            .run(&cfg.orchestrator.system_prompt, &instruction)
            .await
            .context("Orchestration failed")?
    };
    drop(event_tx);
    let _ = printer.await;

    if outcome.termination == Termination::MaxCalls {
        println!("Reached max chained function calls: {}", outcome.max_calls);
    }

    let (prompt, completion, total) = client.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
