use crate::traits::ChannelAdapter;
use crate::types::{InboundMessage, OutboundKind, OutboundMessage};
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};

pub const CONSOLE_CHANNEL: &str = "console";
pub const CONSOLE_SENDER: &str = "local";

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// Line-oriented terminal front end: each non-empty line is one command.
/// A line reading `exit` or `quit` on its own, or end of input, stops the channel.
#[derive(Clone)]
pub struct ConsoleAdapter {
    reader: Arc<Mutex<Option<Reader>>>,
    writer: Arc<Mutex<Writer>>,
    assistant_name: String,
}

impl ConsoleAdapter {
    pub fn stdio() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    pub fn with_io(
        reader: impl AsyncBufRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Some(Box::new(reader)))),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            assistant_name: "Jarvis".to_string(),
        }
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    async fn read_loop(mut reader: Reader, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::info!("console input closed");
                return Ok(());
            }
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if matches!(text.to_ascii_lowercase().as_str(), "exit" | "quit") {
                tracing::info!("console exit requested");
                return Ok(());
            }
            let msg = InboundMessage::new(CONSOLE_CHANNEL, CONSOLE_SENDER, text);
            if tx.send(msg).await.is_err() {
                return Err(anyhow!("gateway queue closed"));
            }
        }
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for ConsoleAdapter {
    fn channel_id(&self) -> &str {
        CONSOLE_CHANNEL
    }

    async fn start(&self, tx: mpsc::Sender<InboundMessage>) -> Result<()> {
        let reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("console adapter already started"))?;
        tokio::spawn(async move {
            if let Err(e) = Self::read_loop(reader, tx).await {
                tracing::error!(%e, "console read loop exited");
            }
        });
        Ok(())
    }

    async fn send(&self, _recipient_id: &str, message: OutboundMessage) -> Result<()> {
        let body = message.content.trim();
        if body.is_empty() {
            return Ok(());
        }
        let line = match message.kind {
            OutboundKind::Reply => format!("{}: {body}\n", self.assistant_name),
            OutboundKind::Notice => format!("[{}] {body}\n", self.assistant_name),
        };
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn lines_become_messages_until_exit() {
        let input: &[u8] = b"open safari\n\n  what time is it  \nexit\nignored\n";
        let (out_w, _out_r) = tokio::io::duplex(64);
        let adapter = ConsoleAdapter::with_io(input, out_w);
        let (tx, mut rx) = mpsc::channel(8);
        adapter.start(tx).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "open safari");
        assert_eq!(first.channel_id.as_str(), CONSOLE_CHANNEL);
        assert_eq!(rx.recv().await.unwrap().content, "what time is it");
        assert!(rx.recv().await.is_none());
        assert!(adapter.start(mpsc::channel(1).0).await.is_err());
    }

    #[tokio::test]
    async fn replies_and_notices_are_labelled() {
        let (out_w, mut out_r) = tokio::io::duplex(256);
        let adapter = ConsoleAdapter::with_io(&b""[..], out_w);
        let id = crate::types::MessageId::new("m1");
        adapter
            .send(CONSOLE_SENDER, OutboundMessage::reply("Done.", &id))
            .await
            .unwrap();
        adapter
            .send(CONSOLE_SENDER, OutboundMessage::notice("Reminder: stretch"))
            .await
            .unwrap();
        drop(adapter);

        let mut printed = String::new();
        out_r.read_to_string(&mut printed).await.unwrap();
        assert_eq!(printed, "Jarvis: Done.\n[Jarvis] Reminder: stretch\n");
    }
}
