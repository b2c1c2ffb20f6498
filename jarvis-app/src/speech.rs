//! How tool results are phrased back to the user.

use crate::dispatcher::{CallOutcome, CallResult};

const CONFIRMATIONS: [&str; 3] = ["At your service.", "Consider it done.", "Affirmative."];

fn sentence(text: &str) -> String {
    let t = text.trim();
    if t.ends_with(['.', '!', '?', ':']) || t.contains('\n') {
        t.to_string()
    } else {
        format!("{t}.")
    }
}

/// Reply text for one executed call. `style` rotates the confirmation phrase.
pub fn phrase(result: &CallResult, style: usize) -> String {
    match &result.outcome {
        CallOutcome::Failed(msg) => {
            let msg = msg.trim();
            let mut chars = msg.chars();
            let lowered: String = match chars.next() {
                // Keep acronyms and names ("I", "HTTP") intact.
                Some(first) if chars.next().is_some_and(char::is_lowercase) => {
                    first.to_lowercase().chain(msg.chars().skip(1)).collect()
                }
                _ => msg.to_string(),
            };
            format!("I apologize, but {}", sentence(&lowered))
        }
        CallOutcome::Succeeded(out) => {
            if result.kind.is_some_and(|k| k.is_informational()) {
                return sentence(&out.message);
            }
            let lead = CONFIRMATIONS[style % CONFIRMATIONS.len()];
            format!("{lead} {}", sentence(&out.message))
        }
    }
}

/// One reply for the whole batch; an empty batch reads as "Done."
pub fn summarize(results: &[CallResult], mut next_style: impl FnMut() -> usize) -> String {
    if results.is_empty() {
        return "Done.".to_string();
    }
    results
        .iter()
        .map(|r| phrase(r, next_style()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarvis_tools::{ToolKind, ToolOutcome};

    fn ok(kind: ToolKind, msg: &str) -> CallResult {
        CallResult {
            tool: kind.name().to_string(),
            kind: Some(kind),
            outcome: CallOutcome::Succeeded(ToolOutcome::text(msg)),
        }
    }

    #[test]
    fn actions_rotate_confirmations() {
        let r = ok(ToolKind::OpenApp, "Opened Safari");
        assert_eq!(phrase(&r, 0), "At your service. Opened Safari.");
        assert_eq!(phrase(&r, 1), "Consider it done. Opened Safari.");
        assert_eq!(phrase(&r, 5), "Affirmative. Opened Safari.");
    }

    #[test]
    fn informational_results_are_spoken_verbatim() {
        let r = ok(ToolKind::SystemInfo, "Your battery is at 80% (charging).");
        assert_eq!(phrase(&r, 0), "Your battery is at 80% (charging).");
    }

    #[test]
    fn failures_apologize() {
        let r = CallResult {
            tool: "close_app".to_string(),
            kind: Some(ToolKind::CloseApp),
            outcome: CallOutcome::Failed("Only supported on macOS".to_string()),
        };
        assert_eq!(phrase(&r, 0), "I apologize, but only supported on macOS.");
        let r = CallResult {
            tool: "x".to_string(),
            kind: None,
            outcome: CallOutcome::Failed("I don't have a tool called x.".to_string()),
        };
        assert_eq!(phrase(&r, 0), "I apologize, but I don't have a tool called x.");
    }

    #[test]
    fn batch_joins_with_spaces() {
        let results = [ok(ToolKind::OpenWebsite, "Opened https://youtube.com"), ok(ToolKind::AddTask, "Added task: milk")];
        let mut n = 0;
        let text = summarize(&results, || {
            n += 1;
            n
        });
        assert_eq!(text, "Consider it done. Opened https://youtube.com. Affirmative. Added task: milk.");
        assert_eq!(summarize(&[], || 0), "Done.");
    }
}
