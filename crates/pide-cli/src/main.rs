//! pide - headless bridge between an editor front end and a PIDE server
//!
//! Editor events arrive as JSON lines on stdin, UI effects leave as JSON
//! lines on stdout. Logs go to stderr.

mod frontend;
mod surfaces;

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pide_core::{transport, Connection, EventSender, PideConfig, ServerCommand, Session};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use frontend::FrontendMessage;
use surfaces::JsonLines;

#[derive(Parser, Debug)]
#[command(name = "pide", version, about = "Headless PIDE client bridge")]
struct Cli {
    /// Settings file (defaults to <config dir>/pide/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prover installation root, overrides the settings file
    #[arg(long)]
    home: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let lines = JsonLines::stdout();
    match run(cli, &lines).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            lines.emit(json!({ "kind": "error", "message": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_directive: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<PideConfig> {
    let mut config = match &cli.config {
        Some(path) => PideConfig::load(path)?,
        None => PideConfig::load_default()?,
    };
    if let Some(home) = &cli.home {
        config.home = home.clone();
    }
    Ok(config)
}

async fn run(cli: Cli, lines: &JsonLines) -> Result<()> {
    let config = load_config(&cli)?;
    // A missing home is reported once and nothing is started
    let server = ServerCommand::from_config(&config, cfg!(windows))?;

    info!(program = %server.program.display(), "Starting PIDE server");
    let mut child = server
        .command()
        .spawn()
        .with_context(|| format!("Failed to start {}", server.program.display()))?;
    let (reader, writer) = transport::from_tokio_child(&mut child)?;

    let mut session = Session::new(Connection::new(), lines.surfaces(), config.selector());
    let events = session.sender();
    session
        .connection_mut()
        .connect(reader, writer, events.clone())
        .context("Failed to connect to PIDE server")?;
    let frontend_done = spawn_frontend_reader(BufReader::new(std::io::stdin()), events)?;

    let server_gone = tokio::select! {
        _ = session.run() => true,
        _ = frontend_done => {
            info!("Front end gone, shutting down");
            false
        }
    };

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to stop PIDE server");
    }
    if server_gone {
        lines.emit(json!({ "kind": "closed", "message": "PIDE server exited" }));
    }
    info!("PIDE session ended");
    Ok(())
}

/// Read front end lines on a dedicated thread.
///
/// A blocking stdin read must not hold the runtime open at shutdown. The
/// returned receiver resolves once input ends or the session stops.
fn spawn_frontend_reader<R>(input: R, events: EventSender) -> Result<oneshot::Receiver<()>>
where
    R: BufRead + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("pide-frontend".to_string())
        .spawn(move || {
            forward_frontend(input, &events);
            let _ = done_tx.send(());
        })
        .context("Failed to start front end reader")?;
    Ok(done_rx)
}

/// Forward front end lines into the session queue
fn forward_frontend(input: impl BufRead, events: &EventSender) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read front end input");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match FrontendMessage::parse(&line) {
            Ok(message) => {
                if !events.emit(message.into_event()) {
                    return;
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed front end message"),
        }
    }
    info!("Front end closed stdin");
}
