//! Pilot 无人机指令映射演示
//!
//! 每条指令独立开一个会话（max_calls = 1），把模型选中的操作与参数打印出来。
//! 用法：pilot-drone ["指令" ...]；不带参数时使用内置示例指令。

use anyhow::Context;
use pilot::{
    config::load_config_or_default,
    core::{Orchestrator, OrchestratorSettings, Termination},
    llm::{LlmClient, OpenAiClient, ToolChoice},
    observability,
    tools::{drone_registry, ToolExecutor, DRONE_SYSTEM_PROMPT, SAMPLE_PROMPTS},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let model = cfg.model_for(cfg.drone.model.as_ref());
    let client = OpenAiClient::from_config(&cfg.llm, model).context("Failed to create LLM client")?;
    tracing::info!("Using OpenAI LLM ({})", client.model());

    let registry = drone_registry().context("Failed to build drone catalog")?;
    let executor = ToolExecutor::simulated(cfg.orchestrator.tool_timeout_secs);
    let settings = OrchestratorSettings {
        max_calls: 1,
        tool_choice: ToolChoice::Auto,
        temperature: Some(cfg.drone.temperature),
        max_tokens: Some(cfg.drone.max_tokens),
    };
    let orchestrator = Orchestrator::new(&client, &registry, &executor, settings);
    let system_prompt = cfg
        .drone
        .system_prompt
        .clone()
        .unwrap_or_else(|| DRONE_SYSTEM_PROMPT.to_string());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let prompts: Vec<String> = if args.is_empty() {
        SAMPLE_PROMPTS.iter().map(|p| p.to_string()).collect()
    } else {
        args
    };

    for prompt in &prompts {
        let outcome = orchestrator
            .run(&system_prompt, prompt)
            .await
            .with_context(|| format!("Request failed for prompt: {prompt}"))?;

        println!("{prompt}");
        let calls: Vec<_> = outcome
            .transcript
            .messages()
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .collect();
        if calls.is_empty() {
            match &outcome.termination {
                Termination::Message(text) => println!("(no function call) {text}"),
                Termination::Error { text, reason } => println!("(malformed: {reason}) {text}"),
                Termination::MaxCalls => println!("(no function call)"),
            }
        }
        for call in calls {
            println!("{}({})", call.name, call.arguments);
        }
        println!();
    }

    let (prompt, completion, total) = client.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
