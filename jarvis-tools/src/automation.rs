//! Process-spawn boundary for OS automation.
//!
//! Handlers never spawn processes directly. They describe a command and hand it
//! to an [`Automation`], which is either the real host ([`HostAutomation`]) or a
//! simulated Mac that records what would have run ([`RecordingAutomation`]).

use crate::error::{Result, ToolError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
pub trait Automation: Send + Sync {
    /// Whether macOS application control (`open -a`, AppleScript, Spotlight) is available.
    fn supports_app_control(&self) -> bool;

    /// Run a program with argv arguments and wait for it, bounded by `timeout`.
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutput>;
}

/// Spawns real processes on the host.
#[derive(Debug, Default, Clone)]
pub struct HostAutomation;

#[async_trait]
impl Automation for HostAutomation {
    fn supports_app_control(&self) -> bool {
        cfg!(target_os = "macos")
    }

    #[tracing::instrument(level = "debug", skip_all, fields(program = %invocation.program))]
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                ToolError::ExecutionFailed(format!("{} timed out", invocation.program))
            })?
            .map_err(|e| ToolError::ExecutionFailed(format!("{}: {e}", invocation.program)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// A simulated Mac: records every command and keeps a set of running apps so
/// launch, quit and process checks behave consistently. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingAutomation {
    log: Mutex<Vec<Invocation>>,
    running: Mutex<BTreeSet<String>>,
    canned: Mutex<Vec<(String, CommandOutput)>>,
}

impl RecordingAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_running<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let out = Self::default();
        if let Ok(mut running) = out.running.lock() {
            running.extend(apps.into_iter().map(Into::into));
        }
        out
    }

    /// Answer every later call to `program` with `output`.
    pub fn respond(&self, program: &str, output: CommandOutput) {
        if let Ok(mut canned) = self.canned.lock() {
            canned.retain(|(p, _)| p != program);
            canned.push((program.to_string(), output));
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn running_apps(&self) -> BTreeSet<String> {
        self.running.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of AppleScript quit requests sent so far.
    pub fn quit_requests(&self) -> usize {
        self.invocations()
            .iter()
            .filter(|i| i.program == "osascript" && is_quit_script(&i.args))
            .count()
    }

    fn simulate(&self, inv: &Invocation) -> CommandOutput {
        let Ok(mut running) = self.running.lock() else {
            return CommandOutput::failed("simulator state poisoned");
        };
        let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
        match (inv.program.as_str(), args.as_slice()) {
            ("pgrep", ["-ix", name]) => {
                let hits: Vec<String> = running
                    .iter()
                    .filter(|app| app.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect();
                if hits.is_empty() {
                    CommandOutput::failed("")
                } else {
                    CommandOutput::ok(hits.join("\n"))
                }
            }
            ("pgrep", ["-x", name]) => {
                if running.contains(*name) {
                    CommandOutput::ok("1")
                } else {
                    CommandOutput::failed("")
                }
            }
            ("pkill", ["-ix", name]) => {
                let before = running.len();
                running.retain(|app| !app.eq_ignore_ascii_case(name));
                if running.len() < before {
                    CommandOutput::ok("")
                } else {
                    CommandOutput::failed("")
                }
            }
            ("osascript", _) if is_quit_script(&inv.args) => {
                if let Some(app) = inv.args.last() {
                    running.remove(app);
                }
                CommandOutput::ok("")
            }
            ("open", ["-a", app]) => {
                running.insert((*app).to_string());
                CommandOutput::ok("")
            }
            _ => CommandOutput::ok(""),
        }
    }
}

fn is_quit_script(args: &[String]) -> bool {
    args.iter().any(|a| a.contains("to quit"))
}

#[async_trait]
impl Automation for RecordingAutomation {
    fn supports_app_control(&self) -> bool {
        true
    }

    async fn run(&self, invocation: &Invocation, _timeout: Duration) -> Result<CommandOutput> {
        tracing::debug!(program = %invocation.program, args = ?invocation.args, "recorded automation command");
        if let Ok(mut log) = self.log.lock() {
            log.push(invocation.clone());
        }
        let canned = self.canned.lock().ok().and_then(|c| {
            c.iter()
                .find(|(p, _)| *p == invocation.program)
                .map(|(_, out)| out.clone())
        });
        Ok(canned.unwrap_or_else(|| self.simulate(invocation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn simulator_tracks_launch_and_quit() {
        let auto = RecordingAutomation::new();
        auto.run(&Invocation::new("open", ["-a", "Notes"]), T)
            .await
            .unwrap();
        assert!(auto.running_apps().contains("Notes"));

        let check = auto
            .run(&Invocation::new("pgrep", ["-ix", "notes"]), T)
            .await
            .unwrap();
        assert!(check.success);

        auto.run(
            &Invocation::new(
                "osascript",
                ["-e", "on run argv\ntell application (item 1 of argv) to quit\nend run", "Notes"],
            ),
            T,
        )
        .await
        .unwrap();
        assert!(auto.running_apps().is_empty());
        assert_eq!(auto.quit_requests(), 1);
        assert_eq!(auto.invocations().len(), 3);
    }

    #[tokio::test]
    async fn canned_responses_override_simulation() {
        let auto = RecordingAutomation::new();
        auto.respond("pmset", CommandOutput::ok("-InternalBattery-0\t80%; charging"));
        let out = auto
            .run(&Invocation::new("pmset", ["-g", "batt"]), T)
            .await
            .unwrap();
        assert!(out.stdout.contains("80%"));
    }

    #[tokio::test]
    async fn host_automation_reports_missing_programs() {
        let err = HostAutomation
            .run(&Invocation::new("jarvis-definitely-missing-binary", Vec::<String>::new()), T)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
