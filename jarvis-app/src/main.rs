//! Jarvis main binary.

mod assistant;
mod brain;
mod commands;
mod config;
mod dispatcher;
mod gateway;
mod init;
mod intent;
mod memory;
mod prompt;
mod router;
mod runtime;
mod session;
mod speech;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "jarvis", version, about = "Jarvis desktop assistant")]
struct Cli {
    /// Config file (default: ~/.jarvis/config.toml).
    #[arg(long, global = true, env = "JARVIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the interactive console assistant (default).
    Serve,
    /// Run one command through the assistant and print the reply.
    Ask {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Initialize ~/.jarvis with the config template (idempotent).
    Init,
    /// Validate config and report storage and integration health.
    Doctor,
    /// List the tools the assistant can call.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("jarvis: ignoring unreadable .env: {e}");
        }
    }
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    match command {
        Command::Serve => runtime::serve(cli.config).await,
        Command::Ask { text } => runtime::ask(cli.config, &text.join(" ")).await,
        Command::Init => {
            let report = init::initialize_default().await?;
            if report.created.is_empty() {
                println!("jarvis init: already initialized at {}", report.root.display());
            } else {
                println!("jarvis init: initialized {}", report.root.display());
                for path in &report.created {
                    println!("created {}", path.display());
                }
                if !report.skipped.is_empty() {
                    println!("kept {} existing file(s) unchanged", report.skipped.len());
                }
            }
            println!("next: add your API key to {}", report.root.join("config.toml").display());
            Ok(())
        }
        Command::Doctor => runtime::doctor(cli.config).await,
        Command::Tools => {
            runtime::tools();
            Ok(())
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new(
            "info,jarvis=debug,jarvis_app=debug,jarvis_tools=debug,jarvis_llm=debug,jarvis_channels=debug",
        ),
    };
    let log_format = std::env::var("JARVIS_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    // Logs go to stderr; stdout belongs to the console conversation.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported JARVIS_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::debug!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
