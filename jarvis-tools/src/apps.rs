use crate::automation::{Automation, Invocation};
use crate::error::{Result, ToolError};
use crate::toolbox::ToolOutcome;
use std::time::Duration;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(5);
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(500);

const QUIT_SCRIPT: &str = "on run argv\n  set appName to item 1 of argv\n  tell application appName to quit\nend run";

const APP_ALIASES: &[(&str, &str)] = &[
    ("chrome", "Google Chrome"),
    ("google chrome", "Google Chrome"),
    ("vscode", "Visual Studio Code"),
    ("vs code", "Visual Studio Code"),
    ("code", "Visual Studio Code"),
    ("finder", "Finder"),
    ("safari", "Safari"),
    ("notes", "Notes"),
    ("calculator", "Calculator"),
    ("terminal", "Terminal"),
    ("spotify", "Spotify"),
    ("slack", "Slack"),
    ("discord", "Discord"),
    ("whatsapp", "WhatsApp"),
    ("telegram", "Telegram"),
    ("messages", "Messages"),
    ("mail", "Mail"),
    ("music", "Music"),
    ("photos", "Photos"),
    ("preview", "Preview"),
    ("pages", "Pages"),
    ("numbers", "Numbers"),
    ("keynote", "Keynote"),
    ("xcode", "Xcode"),
    ("iterm", "iTerm"),
    ("iterm2", "iTerm"),
    ("brave", "Brave Browser"),
    ("firefox", "Firefox"),
    ("arc", "Arc"),
    ("notion", "Notion"),
    ("figma", "Figma"),
    ("zoom", "zoom.us"),
    ("teams", "Microsoft Teams"),
    ("word", "Microsoft Word"),
    ("excel", "Microsoft Excel"),
    ("powerpoint", "Microsoft PowerPoint"),
    ("calendar", "Calendar"),
    ("reminders", "Reminders"),
    ("maps", "Maps"),
    ("weather", "Weather"),
    ("settings", "System Settings"),
    ("system preferences", "System Settings"),
    ("system settings", "System Settings"),
    ("activity monitor", "Activity Monitor"),
    ("app store", "App Store"),
    ("capcut", "CapCut"),
    ("cap cut", "CapCut"),
];

/// Map a spoken app name onto its bundle display name.
pub fn resolve_app_name(name: &str) -> String {
    let trimmed = name.trim();
    let key = trimmed.to_ascii_lowercase();
    APP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, app)| (*app).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Exact process names an app may run under, longest first. Matching is
/// whole-name only so a word like "System" never reaches unrelated processes.
pub fn process_names(names: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        if !s.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(s)) {
            out.push(s.to_string());
        }
    };
    for name in names {
        let value = name.trim();
        if value.is_empty() {
            continue;
        }
        push(value);
        push(&value.replace(' ', ""));
    }
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    out
}

pub(crate) async fn is_running(automation: &dyn Automation, names: &[&str]) -> bool {
    for name in process_names(names) {
        let check = Invocation::new("pgrep", ["-ix", name.as_str()]);
        match automation.run(&check, CHECK_TIMEOUT).await {
            Ok(out) if out.success && !out.stdout.trim().is_empty() => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, %name, "pgrep failed"),
        }
    }
    false
}

fn require_app_control(automation: &dyn Automation) -> Result<()> {
    if automation.supports_app_control() {
        Ok(())
    } else {
        Err(ToolError::Unsupported("Only supported on macOS".to_string()))
    }
}

#[tracing::instrument(level = "info", skip(automation))]
pub(crate) async fn open_app(automation: &dyn Automation, app_name: &str) -> Result<ToolOutcome> {
    require_app_control(automation)?;
    let requested = app_name.trim();
    if requested.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please tell me which app to open.".to_string(),
        ));
    }
    let resolved = resolve_app_name(requested);

    let first = automation
        .run(&Invocation::new("open", ["-a", resolved.as_str()]), LAUNCH_TIMEOUT)
        .await?;
    if first.success {
        return Ok(ToolOutcome::app(format!("Opened {resolved}"), &resolved));
    }

    if resolved != requested {
        let retry = automation
            .run(&Invocation::new("open", ["-a", requested]), LAUNCH_TIMEOUT)
            .await?;
        if retry.success {
            return Ok(ToolOutcome::app(format!("Opened {requested}"), requested));
        }
    }

    // Spotlight knows about apps outside /Applications.
    let search = automation
        .run(
            &Invocation::new(
                "mdfind",
                ["kMDItemKind == \"Application\"", "-name", requested],
            ),
            LAUNCH_TIMEOUT,
        )
        .await;
    if let Ok(found) = search {
        if let Some(path) = found.stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            let launched = automation
                .run(&Invocation::new("open", [path]), LAUNCH_TIMEOUT)
                .await?;
            if launched.success {
                return Ok(ToolOutcome::app(format!("Opened {requested}"), requested));
            }
        }
    }

    tracing::warn!(app = %requested, stderr = %first.stderr.trim(), "app launch failed");
    Err(ToolError::ExecutionFailed(format!(
        "I could not find '{requested}'. Make sure it's installed."
    )))
}

#[tracing::instrument(level = "info", skip(automation))]
pub(crate) async fn close_app(automation: &dyn Automation, app_name: &str) -> Result<ToolOutcome> {
    require_app_control(automation)?;
    let requested = app_name.trim();
    if requested.is_empty() {
        return Err(ToolError::InvalidArguments(
            "Please tell me which app to close.".to_string(),
        ));
    }
    let resolved = resolve_app_name(requested);
    let names = [resolved.as_str(), requested];

    if !is_running(automation, &names).await {
        return Ok(ToolOutcome::app(format!("{resolved} is already closed"), &resolved));
    }

    let quit = automation
        .run(
            &Invocation::new("osascript", ["-e", QUIT_SCRIPT, resolved.as_str()]),
            LAUNCH_TIMEOUT,
        )
        .await?;
    if quit.success {
        tokio::time::sleep(SETTLE).await;
        if !is_running(automation, &names).await {
            return Ok(ToolOutcome::app(format!("Closed {resolved}"), &resolved));
        }
    }

    if resolved != requested {
        let retry = automation
            .run(
                &Invocation::new("osascript", ["-e", QUIT_SCRIPT, requested]),
                LAUNCH_TIMEOUT,
            )
            .await?;
        if retry.success {
            tokio::time::sleep(SETTLE).await;
            if !is_running(automation, &names).await {
                return Ok(ToolOutcome::app(format!("Closed {requested}"), requested));
            }
        }
    }

    for name in process_names(&names) {
        if let Err(e) = automation
            .run(&Invocation::new("pkill", ["-ix", name.as_str()]), CHECK_TIMEOUT)
            .await
        {
            tracing::debug!(error = %e, %name, "pkill fallback failed");
        }
    }
    tokio::time::sleep(SETTLE).await;
    if !is_running(automation, &names).await {
        return Ok(ToolOutcome::app(format!("Closed {resolved}"), &resolved));
    }

    tracing::warn!(app = %resolved, stderr = %quit.stderr.trim(), "app quit failed");
    Err(ToolError::ExecutionFailed(format!(
        "I could not close {requested}. It may not be running."
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{CommandOutput, RecordingAutomation};

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(resolve_app_name(" VS Code "), "Visual Studio Code");
        assert_eq!(resolve_app_name("terminal"), "Terminal");
        assert_eq!(resolve_app_name("Obsidian"), "Obsidian");
    }

    #[test]
    fn process_names_are_whole_names_only() {
        let c = process_names(&["Google Chrome", "chrome"]);
        assert_eq!(c, vec!["Google Chrome", "GoogleChrome", "chrome"]);
        assert!(process_names(&["Terminal", "terminal"]) == vec!["Terminal"]);
    }

    #[tokio::test]
    async fn forced_quit_leaves_similarly_named_apps_alone() {
        let auto = RecordingAutomation::with_running([
            "System Settings",
            "SystemUIServer",
            "Settings Sync",
            "Microsoft Word",
            "Microsoft Teams",
        ]);
        // The app ignores AppleScript, so only the pkill fallback can close it.
        auto.respond("osascript", CommandOutput::failed("quit ignored"));

        let out = close_app(&auto, "settings").await.unwrap();
        assert_eq!(out.message, "Closed System Settings");
        let left: Vec<String> = auto.running_apps().into_iter().collect();
        assert_eq!(
            left,
            vec!["Microsoft Teams", "Microsoft Word", "Settings Sync", "SystemUIServer"]
        );

        let allowed = ["System Settings", "SystemSettings", "settings"];
        for call in auto.invocations() {
            if call.program == "pgrep" || call.program == "pkill" {
                assert_eq!(call.args[0], "-ix");
                assert!(allowed.contains(&call.args[1].as_str()), "{:?}", call.args);
            }
        }
    }

    #[tokio::test]
    async fn forced_quit_of_word_keeps_other_office_apps() {
        let auto = RecordingAutomation::with_running(["Microsoft Word", "Microsoft Teams"]);
        auto.respond("osascript", CommandOutput::failed("quit ignored"));
        close_app(&auto, "word").await.unwrap();
        assert!(auto.running_apps().contains("Microsoft Teams"));
        assert!(!auto.invocations().iter().any(|c| c.args.iter().any(|a| a == "Microsoft")));
    }

    #[tokio::test]
    async fn close_terminal_sends_exactly_one_quit() {
        let auto = RecordingAutomation::with_running(["Terminal"]);
        let out = close_app(&auto, "Terminal").await.unwrap();
        assert_eq!(out.message, "Closed Terminal");
        assert_eq!(auto.quit_requests(), 1);
        assert!(auto.running_apps().is_empty());
    }

    #[tokio::test]
    async fn closing_a_stopped_app_is_a_noop() {
        let auto = RecordingAutomation::new();
        let out = close_app(&auto, "spotify").await.unwrap();
        assert_eq!(out.message, "Spotify is already closed");
        assert_eq!(auto.quit_requests(), 0);
    }

    #[tokio::test]
    async fn open_app_uses_resolved_alias() {
        let auto = RecordingAutomation::new();
        let out = open_app(&auto, "chrome").await.unwrap();
        assert_eq!(out.message, "Opened Google Chrome");
        let calls = auto.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["-a", "Google Chrome"]);
    }
}
