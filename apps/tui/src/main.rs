//! kbchat chat widget: a floating chat panel over the terminal with a
//! password-gated admin view for managing the knowledge base.
//!
//! Built with `ratatui` + `crossterm`. Logs go to a file under the config
//! directory so they never draw over the UI.

mod app;
mod screens;
mod widgets;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use kbchat_core::{AdminGate, AnswerService, KnowledgeAdmin};
use kbchat_shared::{config_dir, load_config_with, resolve_db_path};
use kbchat_storage::Storage;
use tracing::info;

use app::{Persona, Services};

/// Floating chat widget for the kbchat knowledge base.
#[derive(Parser)]
#[command(name = "kbchat-tui", version, about, long_about = None)]
struct Args {
    /// Config file to use instead of ~/.kbchat/kbchat.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Knowledge database path (overrides `[storage] db_path`).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log file (defaults to ~/.kbchat/kbchat-tui.log).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&args)?;

    let config = load_config_with(args.config.as_deref(), args.db.as_deref())?;

    let db_path = resolve_db_path(&config)?;
    let storage = Arc::new(Storage::open(&db_path).await?);
    let services = Services {
        answer: Arc::new(AnswerService::from_config(&config, storage.clone())?),
        gate: AdminGate::from_config(&config.admin),
        admin: KnowledgeAdmin::new(storage),
    };
    let persona = Persona {
        name: config.assistant.name.clone(),
        greeting: config.assistant.greeting.clone(),
    };

    info!(db = %db_path.display(), model = %config.gemini.model, "starting chat widget");
    app::run(services, persona)
}

/// Send logs to a file; the terminal belongs to the UI.
fn init_tracing(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let path = match &args.log_file {
        Some(path) => path.clone(),
        None => config_dir()?.join("kbchat-tui.log"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| eyre!("cannot open log file {}: {e}", path.display()))?;

    let filter = match args.verbose {
        0 => "kbchat=info",
        1 => "kbchat=debug",
        _ => "kbchat=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
