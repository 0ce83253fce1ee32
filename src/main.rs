//! Pilot - 交互式对话
//!
//! 入口：初始化日志、加载配置、创建 LLM 客户端，并在控制台上运行对话循环，Ctrl-C 或输入结束时退出。

use anyhow::Context;
use pilot::{
    chat::{run_chat, spawn_stdin_lines, ChatSettings},
    config::load_config_or_default,
    llm::{LlmClient, OpenAiClient},
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config_or_default(None);
    let model = cfg.model_for(cfg.chat.model.as_ref());
    let client = OpenAiClient::from_config(&cfg.llm, model).context("Failed to create LLM client")?;
    tracing::info!("Using OpenAI LLM ({})", client.model());

    let settings = ChatSettings::from_config(&cfg.chat);
    let mut input = spawn_stdin_lines();
    let mut output = tokio::io::stdout();
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    run_chat(&client, &settings, &mut input, &mut output, interrupt)
        .await
        .context("Chat failed")?;

    let (prompt, completion, total) = client.token_usage();
    tracing::info!(prompt, completion, total, "token usage");
    Ok(())
}
