//! Executes the structured tool calls of one turn.
//!
//! Calls run only when the gate and the router both allow tools. Each call is
//! validated against the closed tool set and run in order; a failing call is
//! recorded and the batch continues. Nothing is rolled back.

use crate::intent::Intent;
use crate::router::RouterDecision;
use jarvis_llm::ToolCall;
use jarvis_tools::{ToolBox, ToolInvocation, ToolKind, ToolOutcome, parse_arguments};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Succeeded(ToolOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub tool: String,
    /// `None` when the model named a tool outside the registry.
    pub kind: Option<ToolKind>,
    pub outcome: CallOutcome,
}

impl CallResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, CallOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Tools were not allowed this turn; `dropped` calls were ignored.
    Refused { dropped: usize },
    Ran(Vec<CallResult>),
}

fn dedupe_key(call: &ToolCall) -> (String, String) {
    let args = parse_arguments(&call.arguments)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| call.arguments.trim().to_string());
    (call.name.trim().to_string(), args)
}

#[tracing::instrument(level = "info", skip_all, fields(gate = %gate, calls = calls.len()))]
pub async fn dispatch(
    toolbox: &ToolBox,
    gate: Intent,
    decision: RouterDecision,
    calls: &[ToolCall],
) -> Dispatch {
    if gate == Intent::Query || !decision.should_use_tools {
        if !calls.is_empty() {
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            tracing::warn!(?names, should_use_tools = decision.should_use_tools, "tool calls refused for this turn");
        }
        return Dispatch::Refused {
            dropped: calls.len(),
        };
    }

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        if !seen.insert(dedupe_key(call)) {
            tracing::debug!(tool = %call.name, "duplicate tool call skipped");
            continue;
        }

        let kind = call.name.parse::<ToolKind>().ok();
        let outcome = match ToolInvocation::parse(&call.name, &call.arguments) {
            Ok(invocation) => match toolbox.execute(&invocation).await {
                Ok(out) => CallOutcome::Succeeded(out),
                Err(e) => CallOutcome::Failed(e.user_message()),
            },
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call rejected");
                CallOutcome::Failed(e.user_message())
            }
        };
        results.push(CallResult {
            tool: call.name.clone(),
            kind,
            outcome,
        });
    }
    Dispatch::Ran(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_tools::{Locations, RecordingAutomation, Stores};
    use std::sync::Arc;

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: args.to_string(),
        }
    }

    fn toolbox(dir: &tempfile::TempDir, auto: Arc<RecordingAutomation>) -> ToolBox {
        ToolBox::new(auto, Stores::open(dir.path()), Locations::new(dir.path()))
    }

    const ALLOW: RouterDecision = RouterDecision {
        intent: Intent::Action,
        should_use_tools: true,
    };

    #[tokio::test]
    async fn query_gate_refuses_every_call() {
        let tmp = tempfile::tempdir().unwrap();
        let auto = Arc::new(RecordingAutomation::with_running(["Terminal"]));
        let tb = toolbox(&tmp, auto.clone());

        let calls = [call("close_app", r#"{"app_name":"Terminal"}"#)];
        let out = dispatch(&tb, Intent::Query, ALLOW, &calls).await;
        assert_eq!(out, Dispatch::Refused { dropped: 1 });
        assert!(auto.invocations().is_empty());
    }

    #[tokio::test]
    async fn router_veto_refuses_every_call() {
        let tmp = tempfile::tempdir().unwrap();
        let auto = Arc::new(RecordingAutomation::new());
        let tb = toolbox(&tmp, auto.clone());

        let veto = RouterDecision { intent: Intent::Action, should_use_tools: false };
        let calls = [call("add_task", r#"{"description":"x"}"#)];
        assert_eq!(dispatch(&tb, Intent::Action, veto, &calls).await, Dispatch::Refused { dropped: 1 });
        assert!(tb.stores().tasks.load().await.is_empty());
    }

    #[tokio::test]
    async fn duplicates_run_once_and_failures_do_not_stop_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let tb = toolbox(&tmp, Arc::new(RecordingAutomation::new()));

        let calls = [
            call("add_task", r#"{"description": "buy milk"}"#),
            call("add_task", r#"{ "description":"buy milk" }"#),
            call("delete_everything", "{}"),
            call("complete_task", r#"{"task_id": "abc"}"#),
            call("add_task", r#"{"description": "call mom"}"#),
        ];
        let Dispatch::Ran(results) = dispatch(&tb, Intent::Action, ALLOW, &calls).await else {
            panic!("expected calls to run");
        };
        assert_eq!(results.len(), 4);
        assert!(results[0].succeeded());
        assert_eq!(results[1].kind, None);
        assert!(!results[1].succeeded());
        assert!(!results[2].succeeded());
        assert!(results[3].succeeded());
        assert_eq!(tb.stores().tasks.load().await.len(), 2);
    }
}
