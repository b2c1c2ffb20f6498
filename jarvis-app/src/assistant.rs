//! One assistant turn: intent gate, router, completion, dispatch, reply.
//!
//! `run` never fails. Model outages, refused tool calls and tool errors all end
//! up as reply text, and the session is left ready for the next turn.

use crate::brain::{Brain, BrainReply};
use crate::dispatcher::{self, CallResult, Dispatch};
use crate::intent::{self, Intent};
use crate::memory;
use crate::prompt;
use crate::router::RouterDecision;
use crate::session::Session;
use crate::speech;
use jarvis_tools::ToolBox;
use std::sync::Arc;

const REFUSED_REPLY: &str = "I can walk you through that, but I won't take any action for a question.";

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub reply: String,
    pub gate: Intent,
    pub decision: RouterDecision,
    pub executed: Vec<CallResult>,
    pub degraded: bool,
}

pub struct AssistantAgent {
    assistant_name: String,
    brain: Brain,
    toolbox: Arc<ToolBox>,
}

impl AssistantAgent {
    pub fn new(assistant_name: impl Into<String>, brain: Brain, toolbox: Arc<ToolBox>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
            brain,
            toolbox,
        }
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn toolbox(&self) -> &ToolBox {
        &self.toolbox
    }

    pub async fn greeting(&self) -> String {
        let record = self.toolbox.stores().memory.load().await;
        memory::greeting(&self.assistant_name, record.user_name())
    }

    #[tracing::instrument(level = "info", skip_all, fields(session_id = %session.id))]
    pub async fn run(&self, session: &mut Session, command: &str) -> Turn {
        let command = command.trim();
        let gate = intent::classify(command);
        let decision = self.brain.route(command, gate).await;
        tracing::info!(
            %gate,
            intent = %decision.intent,
            should_use_tools = decision.should_use_tools,
            history = session.len(),
            "turn routed"
        );

        let record = self.toolbox.stores().memory.load().await;
        let system = prompt::system_prompt(&self.assistant_name, &record, self.toolbox.locations());
        let reply = self
            .brain
            .respond(system, gate, decision, session, command)
            .await;

        let mut turn = Turn {
            reply: String::new(),
            gate,
            decision,
            executed: Vec::new(),
            degraded: false,
        };
        match reply {
            BrainReply::Degraded(text) => {
                // Nothing is recorded so a retry starts from the same context.
                turn.reply = text;
                turn.degraded = true;
            }
            BrainReply::Text(text) => {
                memory::learn_from(&self.toolbox.stores().memory, command).await;
                session.record(command, &text, Vec::new());
                turn.reply = text;
            }
            BrainReply::ToolCalls { calls, text } => {
                match dispatcher::dispatch(&self.toolbox, gate, decision, &calls).await {
                    Dispatch::Refused { dropped } => {
                        tracing::debug!(dropped, "answering without tools");
                        let text = if text.is_empty() {
                            REFUSED_REPLY.to_string()
                        } else {
                            text
                        };
                        session.record(command, &text, Vec::new());
                        turn.reply = text;
                    }
                    Dispatch::Ran(results) => {
                        let spoken = speech::summarize(&results, || session.next_style());
                        let tools = results.iter().map(|r| r.tool.clone()).collect();
                        session.record(command, &spoken, tools);
                        turn.reply = spoken;
                        turn.executed = results;
                    }
                }
            }
        }
        turn
    }
}
