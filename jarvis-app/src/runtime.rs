//! Process wiring: builds the assistant from config and runs the console loop,
//! the reminder ticker and the one-shot subcommands.

use crate::assistant::AssistantAgent;
use crate::brain::{Brain, CompletionSettings};
use crate::config::JarvisConfig;
use crate::gateway::Gateway;
use crate::session::{Session, SessionManager};
use anyhow::{Result, anyhow};
use chrono::Utc;
use jarvis_channels::{CONSOLE_CHANNEL, CONSOLE_SENDER, ChannelAdapter, ConsoleAdapter, OutboundMessage};
use jarvis_llm::{LlmClient, validate_tool_name};
use jarvis_tools::{
    Automation, CalendarClient, CalendarSettings, HostAutomation, Locations, RecordingAutomation,
    ReminderPolicy, ReminderStore, Stores, ToolBox, tool_definitions,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INBOUND_QUEUE: usize = 64;

fn build_llm(cfg: &JarvisConfig) -> Result<LlmClient> {
    let provider = cfg.provider()?;
    let api_key = cfg.api_key().ok_or_else(|| {
        anyhow!(
            "no API key for provider {}; set {} or the [keys] section of the config",
            provider.as_str(),
            match provider {
                jarvis_llm::Provider::Groq => "GROQ_API_KEY",
                jarvis_llm::Provider::OpenAi => "OPENAI_API_KEY",
            }
        )
    })?;
    let mut client = LlmClient::new(provider, &api_key, &cfg.llm.model)?;
    if let Some(base_url) = cfg.llm.base_url.as_deref() {
        client = client.with_base_url(base_url);
    }
    Ok(client)
}

fn build_calendar(cfg: &JarvisConfig, http: reqwest::Client) -> Result<Option<CalendarClient>> {
    if !cfg.calendar.enabled {
        return Ok(None);
    }
    let settings = CalendarSettings {
        calendar_id: cfg.calendar.calendar_id.trim().to_string(),
        token_file: cfg.calendar_token_file()?,
        popup_minutes: cfg.calendar.popup_minutes,
        email_minutes: cfg.calendar.email_minutes,
        use_default_notifications: cfg.calendar.use_default_notifications,
    };
    Ok(Some(CalendarClient::new(http, settings)))
}

fn build_toolbox(cfg: &JarvisConfig, data_dir: &std::path::Path) -> Result<ToolBox> {
    let automation: Arc<dyn Automation> = if cfg.automation.dry_run {
        tracing::warn!("automation dry_run enabled; OS actions are recorded, not executed");
        Arc::new(RecordingAutomation::new())
    } else {
        Arc::new(HostAutomation)
    };
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| anyhow!("build http client: {e}"))?;

    let mut toolbox = ToolBox::new(automation, Stores::open(data_dir), Locations::from_env())
        .with_reminder_policy(ReminderPolicy {
            sync_to_calendar: cfg.calendar.enabled && cfg.calendar.auto_create_events_for_reminders,
            require_calendar_sync: cfg.calendar.require_sync_for_reminders,
        });
    if cfg.automation.resolve_youtube_videos {
        toolbox = toolbox.with_http(http.clone());
    }
    if let Some(calendar) = build_calendar(cfg, http)? {
        toolbox = toolbox.with_calendar(calendar);
    }
    Ok(toolbox)
}

fn preflight_validate_tool_names() -> Result<()> {
    for def in tool_definitions() {
        validate_tool_name(&def.name)
            .map_err(|e| anyhow!("preflight tool name validation failed for '{}': {e}", def.name))?;
    }
    Ok(())
}

async fn build_assistant(cfg: &JarvisConfig) -> Result<(Arc<AssistantAgent>, PathBuf)> {
    preflight_validate_tool_names()?;
    let data_dir = cfg.data_dir()?;
    tokio::fs::create_dir_all(&data_dir)
        .await
        .map_err(|e| anyhow!("create data dir {}: {e}", data_dir.display()))?;

    let llm = build_llm(cfg)?;
    tracing::info!(
        provider = llm.provider().as_str(),
        base_url = %llm.base_url(),
        model = %cfg.llm.model,
        router_mode = cfg.llm.router_mode.as_str(),
        data_dir = %data_dir.display(),
        calendar_enabled = cfg.calendar.enabled,
        dry_run = cfg.automation.dry_run,
        "assistant configuration loaded"
    );

    let toolbox = build_toolbox(cfg, &data_dir)?;
    let brain = Brain::new(
        Arc::new(llm),
        cfg.llm.router_mode,
        CompletionSettings::from(&cfg.llm),
        tool_definitions(),
    );
    let assistant = AssistantAgent::new(cfg.general.assistant_name.clone(), brain, Arc::new(toolbox));
    Ok((Arc::new(assistant), data_dir))
}

/// Seed the stored user name from config the first time.
async fn seed_user_name(cfg: &JarvisConfig, assistant: &AssistantAgent) {
    let Some(name) = cfg.general.user_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return;
    };
    let memory = &assistant.toolbox().stores().memory;
    if memory.load().await.user_name().is_none() {
        if let Err(e) = memory.set_user_info("name", name).await {
            tracing::warn!(error = %e, "could not seed user name");
        }
    }
}

/// Push due reminders to the console until `shutdown` fires.
pub fn spawn_reminder_ticker(
    store: ReminderStore,
    channel: Arc<dyn ChannelAdapter>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("reminder ticker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }
            let due = match store.take_due(Utc::now()).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::warn!(error = %e, "reminder poll failed");
                    continue;
                }
            };
            for reminder in due {
                tracing::info!(reminder_id = reminder.id, "delivering reminder");
                let notice = OutboundMessage::notice(format!("Reminder: {}", reminder.description));
                if let Err(e) = channel.send(CONSOLE_SENDER, notice).await {
                    tracing::warn!(error = %e, "reminder delivery failed");
                }
            }
        }
    })
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = JarvisConfig::load(config_path).await?;
    let started_at = Instant::now();
    let (assistant, data_dir) = build_assistant(&cfg).await?;
    seed_user_name(&cfg, &assistant).await;

    let console: Arc<dyn ChannelAdapter> =
        Arc::new(ConsoleAdapter::stdio().with_assistant_name(cfg.general.assistant_name.clone()));
    let mut channels: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    channels.insert(CONSOLE_CHANNEL.to_string(), console.clone());

    let greeting = assistant.greeting().await;
    console.send(CONSOLE_SENDER, OutboundMessage::notice(greeting)).await?;

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE);
    console.start(inbound_tx).await?;

    let shutdown = CancellationToken::new();
    let gateway = Arc::new(Gateway::new(
        started_at,
        data_dir,
        Arc::new(SessionManager::new()),
        assistant.clone(),
        channels,
    ));
    let mut gateway_handle = gateway.start(inbound_rx, shutdown.child_token());
    let ticker = spawn_reminder_ticker(
        assistant.toolbox().stores().reminders.clone(),
        console,
        Duration::from_secs(cfg.reminders.poll_interval_secs),
        shutdown.child_token(),
    );
    tracing::info!(poll_interval_secs = cfg.reminders.poll_interval_secs, "jarvis serving on console");

    let gateway_done = tokio::select! {
        _ = shutdown_signal() => false,
        res = &mut gateway_handle => {
            if let Err(e) = res {
                tracing::error!(error = %e, "gateway task join failed");
            }
            true
        }
    };

    shutdown.cancel();
    if !gateway_done {
        if let Err(e) = gateway_handle.await {
            tracing::error!(error = %e, "gateway task join failed during shutdown");
        }
    }
    if let Err(e) = ticker.await {
        tracing::error!(error = %e, "reminder ticker join failed during shutdown");
    }
    tracing::info!("jarvis shutdown completed");
    Ok(())
}

/// Run a single command through the full pipeline and print the reply.
pub async fn ask(config_path: Option<PathBuf>, text: &str) -> Result<()> {
    let cfg = JarvisConfig::load(config_path).await?;
    let (assistant, _) = build_assistant(&cfg).await?;
    seed_user_name(&cfg, &assistant).await;
    let mut session = Session::new();
    let turn = assistant.run(&mut session, text).await;
    tracing::info!(
        gate = %turn.gate,
        should_use_tools = turn.decision.should_use_tools,
        executed = turn.executed.len(),
        degraded = turn.degraded,
        "ask completed"
    );
    println!("{}", turn.reply);
    Ok(())
}

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = JarvisConfig::load(config_path).await?;
    let provider = cfg.provider()?;
    let data_dir = cfg.data_dir()?;
    preflight_validate_tool_names()?;

    let stores = Stores::open(&data_dir);
    let pending_tasks = stores.tasks.pending_tasks().await.len();
    let pending_reminders = stores.reminders.pending_reminders().await.len();
    let api_key_configured = cfg.api_key().is_some();
    let token_file = cfg.calendar_token_file()?;
    let token_present = tokio::fs::try_exists(&token_file).await.unwrap_or(false);

    tracing::info!(
        provider = provider.as_str(),
        model = %cfg.llm.model,
        router_mode = cfg.llm.router_mode.as_str(),
        api_key_configured,
        data_dir = %data_dir.display(),
        pending_tasks,
        pending_reminders,
        calendar_enabled = cfg.calendar.enabled,
        calendar_token_present = token_present,
        "config ok"
    );
    println!("provider={} model={}", provider.as_str(), cfg.llm.model);
    println!("router_mode={}", cfg.llm.router_mode.as_str());
    println!("api_key={}", if api_key_configured { "configured" } else { "missing" });
    println!("data_dir={}", data_dir.display());
    println!("pending_tasks={pending_tasks} pending_reminders={pending_reminders}");
    if cfg.calendar.enabled {
        println!(
            "calendar={} token_file={} ({})",
            cfg.calendar.calendar_id,
            token_file.display(),
            if token_present { "present" } else { "missing" }
        );
    }
    if !api_key_configured {
        return Err(anyhow!("no API key configured for provider {}", provider.as_str()));
    }
    Ok(())
}

pub fn tools() {
    for def in tool_definitions() {
        println!("{:<22} {}", def.name, def.description);
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use jarvis_tools::JsonStore;
    use tokio::io::AsyncReadExt;

    #[test]
    fn missing_api_key_is_reported() {
        let mut cfg = JarvisConfig::default();
        cfg.keys.groq_api_key = None;
        let err = build_llm(&cfg).err().unwrap().to_string();
        assert!(err.contains("GROQ_API_KEY"), "{err}");
    }

    #[test]
    fn base_url_override_is_applied() {
        let mut cfg = JarvisConfig::default();
        cfg.keys.groq_api_key = Some("gsk_test".to_string());
        cfg.llm.base_url = Some("http://localhost:8080/v1/".to_string());
        let client = build_llm(&cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn tool_names_pass_preflight() {
        preflight_validate_tool_names().unwrap();
    }

    #[tokio::test]
    async fn toolbox_wires_calendar_only_when_enabled() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = JarvisConfig::default();
        cfg.automation.dry_run = true;
        assert!(!build_toolbox(&cfg, tmp.path()).unwrap().has_calendar());
        cfg.calendar.enabled = true;
        cfg.calendar.token_file = tmp.path().join("token.json").display().to_string();
        assert!(build_toolbox(&cfg, tmp.path()).unwrap().has_calendar());
    }

    #[tokio::test]
    async fn ticker_delivers_due_reminders_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store: ReminderStore = JsonStore::new(tmp.path().join("reminders.json"));
        let past = Utc::now() - ChronoDuration::minutes(1);
        store.add_reminder("stretch", past, None).await.unwrap();

        let (out_w, mut out_r) = tokio::io::duplex(1024);
        let console: Arc<dyn ChannelAdapter> = Arc::new(ConsoleAdapter::with_io(&b""[..], out_w));
        let shutdown = CancellationToken::new();
        let handle = spawn_reminder_ticker(
            store.clone(),
            console,
            Duration::from_millis(10),
            shutdown.clone(),
        );

        let mut buf = vec![0u8; 64];
        let n = out_r.read(&mut buf).await.unwrap();
        assert_eq!(std::str::from_utf8(&buf[..n]).unwrap(), "[Jarvis] Reminder: stretch\n");

        shutdown.cancel();
        handle.await.unwrap();
        assert!(store.pending_reminders().await.is_empty());
    }
}
