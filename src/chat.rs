//! 交互式对话
//!
//! 读一行 -> 追加 user -> 调用 Completion Client（不带工具，固定低温度）-> 追加 assistant -> 打印。
//! 仅在等待输入时响应中断（或输入结束），请求进行中不会被打断；对话记录不做持久化。
//! 输入按行经 channel 送入：stdin 在独立线程上阻塞读取，中断后进程可直接退出。

use std::future::Future;
use std::io::BufRead;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::ChatSection;
use crate::core::PilotError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::{Message, Transcript};

/// 对话参数
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub temperature: f32,
    pub user_prefix: String,
    pub bot_prefix: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&ChatSection::default())
    }
}

impl ChatSettings {
    pub fn from_config(section: &ChatSection) -> Self {
        Self {
            system_prompt: section.system_prompt.clone(),
            temperature: section.temperature,
            user_prefix: "You: ".to_string(),
            bot_prefix: "Bot: ".to_string(),
        }
    }
}

/// 在独立线程上读取 stdin，逐行发送；EOF 或读错误时关闭 channel
///
/// 不使用 `tokio::io::stdin()`：其阻塞读无法取消，会让 runtime 关闭一直等到下一次回车。
pub fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("stdin read failed: {}", e);
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// 运行对话循环，直到 interrupt 完成或输入结束（channel 关闭）；返回本次的对话记录
pub async fn run_chat<W, I>(
    client: &dyn LlmClient,
    settings: &ChatSettings,
    input: &mut mpsc::Receiver<String>,
    output: &mut W,
    interrupt: I,
) -> Result<Transcript, PilotError>
where
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let mut transcript = Transcript::new();
    transcript.push(Message::system(settings.system_prompt.clone()));

    tokio::pin!(interrupt);

    loop {
        output.write_all(settings.user_prefix.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            biased;
            _ = &mut interrupt => {
                tracing::info!("chat interrupted");
                break;
            }
            line = input.recv() => line,
        };
        let Some(line) = line else {
            tracing::info!("input closed");
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        transcript.push(Message::user(text));
        let request =
            CompletionRequest::chat(transcript.messages()).with_temperature(settings.temperature);
        let reply = client.complete(request).await?;
        let content = reply.text().to_string();
        transcript.push(Message::assistant(content.clone()));

        output
            .write_all(format!("{}{}\n", settings.bot_prefix, content).as_bytes())
            .await?;
        output.flush().await?;
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AssistantReply, ScriptedLlmClient};
    use crate::memory::Role;
    use std::time::Duration;

    /// 预先写入若干行后关闭的输入
    fn closed_input(lines: &[&str]) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            tx.try_send(line.to_string()).unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn test_chat_until_eof() {
        let client = ScriptedLlmClient::new(vec![
            AssistantReply::message("Hi, I'm Claire."),
            AssistantReply::message("Rust."),
        ]);
        let mut input = closed_input(&["hello", "", "what language?"]);
        let mut out = Vec::new();

        let transcript = run_chat(
            &client,
            &ChatSettings::default(),
            &mut input,
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(client.calls(), 2);
        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Bot: Hi, I'm Claire.\n"));
        assert!(printed.contains("Bot: Rust.\n"));

        // 第二次请求带上了完整历史
        let seen = client.seen_transcripts();
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][0].content, "You are a Chatbot named Claire.");
    }

    #[tokio::test]
    async fn test_interrupt_exits_cleanly() {
        let client = ScriptedLlmClient::repeating(AssistantReply::message("never"));
        let mut input = closed_input(&["hello"]);
        let mut out = Vec::new();

        let transcript = run_chat(
            &client,
            &ChatSettings::default(),
            &mut input,
            &mut out,
            std::future::ready(()),
        )
        .await
        .unwrap();

        assert_eq!(client.calls(), 0);
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_while_input_pending() {
        let client = ScriptedLlmClient::repeating(AssistantReply::message("never"));
        // 发送端保持存活：输入永远不会到达也不会关闭
        let (_tx, mut input) = mpsc::channel::<String>(1);
        let mut out = Vec::new();

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            run_chat(
                &client,
                &ChatSettings::default(),
                &mut input,
                &mut out,
                tokio::time::sleep(Duration::from_millis(50)),
            ),
        )
        .await;

        let transcript = result.expect("chat did not return after interrupt").unwrap();
        assert_eq!(client.calls(), 0);
        assert_eq!(transcript.len(), 1);
        assert!(String::from_utf8(out).unwrap().starts_with("You: "));
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let client = ScriptedLlmClient::new(vec![]);
        let mut input = closed_input(&["hello"]);
        let mut out = Vec::new();

        let err = run_chat(
            &client,
            &ChatSettings::default(),
            &mut input,
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PilotError::LlmError(_)));
    }
}
