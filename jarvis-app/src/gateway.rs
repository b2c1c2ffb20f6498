//! Session multiplexer: all channel adapters feed into a single inbound queue.
//!
//! Messages are handled one at a time. Each turn checks its session out of the
//! manager and hands it back afterwards, so no map guard is held across awaits.

use crate::assistant::AssistantAgent;
use crate::commands::{self, StatusInfo};
use crate::session::SessionManager;
use anyhow::Result;
use jarvis_channels::{ChannelAdapter, InboundMessage, OutboundMessage};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Gateway {
    started_at: Instant,
    data_dir: PathBuf,
    sessions: Arc<SessionManager>,
    assistant: Arc<AssistantAgent>,
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
}

impl Gateway {
    pub fn new(
        started_at: Instant,
        data_dir: PathBuf,
        sessions: Arc<SessionManager>,
        assistant: Arc<AssistantAgent>,
        channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    ) -> Self {
        Self {
            started_at,
            data_dir,
            sessions,
            assistant,
            channels,
        }
    }

    /// Run until every sender is gone or `shutdown` fires.
    pub fn start(
        self: Arc<Self>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(inbound_rx, shutdown).await;
        })
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_loop(&self, mut inbound_rx: mpsc::Receiver<InboundMessage>, shutdown: CancellationToken) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("gateway received shutdown signal");
                    return;
                }
                msg = inbound_rx.recv() => msg,
            };
            let Some(inbound) = msg else {
                tracing::info!("all channels closed; gateway stopping");
                return;
            };

            if let Err(e) = self.handle_inbound(inbound).await {
                tracing::warn!(%e, "handle_inbound failed");
            }
        }
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(channel_id = %inbound.channel_id, sender_id = %inbound.sender_id, message_id = %inbound.message_id)
    )]
    async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        let channel = self
            .channels
            .get(inbound.channel_id.as_str())
            .ok_or_else(|| anyhow::anyhow!("unknown channel: {}", inbound.channel_id))?
            .clone();

        let reply = self.respond(&inbound).await;
        channel
            .send(
                inbound.sender_id.as_str(),
                OutboundMessage::reply(reply, &inbound.message_id),
            )
            .await
    }

    /// Reply text for one inbound message: a slash command result or an assistant turn.
    pub async fn respond(&self, inbound: &InboundMessage) -> String {
        let channel_id = inbound.channel_id.as_str();
        let sender_id = inbound.sender_id.as_str();
        let mut session = self.sessions.check_out(channel_id, sender_id);

        let status = StatusInfo {
            model: self.assistant.brain().model(),
            router_mode: self.assistant.brain().router_mode().as_str(),
            data_dir: &self.data_dir,
            uptime: self.started_at.elapsed(),
        };
        let reply = match commands::handle_command(&status, &mut session, &inbound.content) {
            Some(reply) => reply,
            None => self.assistant.run(&mut session, &inbound.content).await.reply,
        };

        self.sessions.check_in(channel_id, sender_id, session);
        tracing::debug!(active_sessions = self.sessions.len(), "turn finished");
        reply
    }
}
