//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use kbchat_core::admin::notice;
use kbchat_core::{
    AdminGate, AdminSession, AnswerService, KnowledgeAdmin, build_context, parse_citations,
    password_digest,
};
use kbchat_shared::{
    AppConfig, config_file_path, init_config, load_config_from, load_config_with,
    resolve_db_path, save_config_to,
};
use kbchat_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// kbchat: ask questions answered from your own markdown knowledge base.
#[derive(Parser)]
#[command(
    name = "kbchat",
    version,
    about = "Chat assistant grounded on an admin-managed markdown knowledge base.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.kbchat/kbchat.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Knowledge database path (overrides `[storage] db_path`).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask one question and print the answer.
    Ask {
        /// The question (words are joined with spaces).
        #[arg(required = true)]
        question: Vec<String>,

        /// Print `{answer, citations}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Launch the interactive chat widget.
    #[command(alias = "tui")]
    Chat,

    /// Knowledge base administration.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Print the knowledge context exactly as it is sent to the model.
    Context,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Admin password, from the flag or the environment.
#[derive(clap::Args)]
pub(crate) struct AdminAuth {
    /// Admin password.
    #[arg(long, env = "KBCHAT_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Knowledge base subcommands.
#[derive(Subcommand)]
pub(crate) enum KbAction {
    /// Upload markdown files; each becomes one document.
    Upload {
        #[command(flatten)]
        auth: AdminAuth,

        /// Files to upload. Non-markdown files are skipped.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored documents.
    List {
        #[command(flatten)]
        auth: AdminAuth,
    },
    /// Print one document.
    Show {
        #[command(flatten)]
        auth: AdminAuth,

        /// Document ID.
        id: String,
    },
    /// Delete one document.
    Delete {
        #[command(flatten)]
        auth: AdminAuth,

        /// Document ID.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
    /// Store the SHA-256 digest of a new admin password.
    SetAdminPassword {
        /// New admin password.
        #[arg(long, env = "KBCHAT_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "kbchat=warn",
        1 => "kbchat=info",
        2 => "kbchat=debug",
        _ => "kbchat=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    // These write the config file, so they must not require it to exist.
    if let Command::Config { action } = &cli.command {
        match action {
            ConfigAction::Init => return cmd_config_init(cli.config.as_deref()),
            ConfigAction::SetAdminPassword { password } => {
                return cmd_config_set_admin_password(cli.config.as_deref(), password);
            }
            ConfigAction::Show => {}
        }
    }

    let config = load_config_with(cli.config.as_deref(), cli.db.as_deref())?;

    match cli.command {
        Command::Ask { question, json } => cmd_ask(&config, &question_text(&question)?, json).await,
        Command::Chat => cmd_chat(cli.config.as_deref(), cli.db.as_deref()),
        Command::Kb { action } => match action {
            KbAction::Upload { auth, files } => cmd_kb_upload(&config, &auth, &files).await,
            KbAction::List { auth } => cmd_kb_list(&config, &auth).await,
            KbAction::Show { auth, id } => cmd_kb_show(&config, &auth, &id).await,
            KbAction::Delete { auth, id, yes } => cmd_kb_delete(&config, &auth, &id, yes).await,
        },
        Command::Context => cmd_context(&config).await,
        Command::Config { .. } => cmd_config_show(&config),
    }
}

/// Join the question words; a blank question is rejected.
fn question_text(words: &[String]) -> Result<String> {
    let question = words.join(" ").trim().to_string();
    if question.is_empty() {
        return Err(eyre!("question must not be empty"));
    }
    Ok(question)
}

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = resolve_db_path(config)?;
    info!(path = %path.display(), "opening knowledge store");
    Ok(Arc::new(Storage::open(&path).await?))
}

async fn admin_login(config: &AppConfig, auth: &AdminAuth) -> Result<(KnowledgeAdmin, AdminSession)> {
    let session = AdminGate::from_config(&config.admin).login(&auth.password)?;
    let admin = KnowledgeAdmin::new(open_storage(config).await?);
    Ok((admin, session))
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(config: &AppConfig, question: &str, json: bool) -> Result<()> {
    let service = AnswerService::from_config(config, open_storage(config).await?)?;

    info!(model = %config.gemini.model, "asking question");
    let progress = spinner(format!("{} is thinking...", config.assistant.name));
    let answer = service.answer(question).await;
    progress.finish_and_clear();

    let citations = parse_citations(&answer);
    if json {
        let out = serde_json::json!({
            "answer": answer,
            "citations": citations,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{answer}");
    if !citations.is_empty() {
        println!();
        for c in &citations {
            match &c.section {
                Some(section) => println!("  source: {} / {section}", c.file_name),
                None => println!("  source: {}", c.file_name),
            }
        }
    }
    Ok(())
}

/// Start the `kbchat-tui` binary, looked up next to this executable first.
fn cmd_chat(config_path: Option<&Path>, db: Option<&Path>) -> Result<()> {
    let bin_name = format!("kbchat-tui{}", std::env::consts::EXE_SUFFIX);
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&bin_name)))
        .filter(|p| p.exists());
    let program = sibling.unwrap_or_else(|| PathBuf::from(&bin_name));

    let mut cmd = std::process::Command::new(&program);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    if let Some(path) = db {
        cmd.arg("--db").arg(path);
    }

    info!(program = %program.display(), "launching chat widget");
    let status = cmd
        .status()
        .map_err(|e| eyre!("failed to launch {}: {e}", program.display()))?;

    if !status.success() {
        return Err(eyre!(
            "chat widget exited with status: {}",
            status.code().unwrap_or(-1)
        ));
    }
    Ok(())
}

async fn cmd_kb_upload(config: &AppConfig, auth: &AdminAuth, files: &[PathBuf]) -> Result<()> {
    let (admin, session) = admin_login(config, auth).await?;

    let progress = spinner(notice::uploading(files.len()));
    let result = admin.upload(&session, files).await;
    progress.finish_and_clear();

    let report = result.map_err(|e| eyre!("{}\n{e}", notice::UPLOAD_FAILED))?;
    if let Some(n) = &report.notice {
        eprintln!("{n}");
    }
    println!("{}", notice::UPLOAD_SUCCEEDED);
    for file in &report.stored {
        println!("  {}  {}", file.id, file.file_name);
    }
    Ok(())
}

async fn cmd_kb_list(config: &AppConfig, auth: &AdminAuth) -> Result<()> {
    let (admin, session) = admin_login(config, auth).await?;
    let files = admin
        .list(&session)
        .await
        .map_err(|e| eyre!("{}\n{e}", notice::LIST_FAILED))?;

    if files.is_empty() {
        println!("{}", notice::NO_FILES_STORED);
        return Ok(());
    }
    for file in &files {
        println!("{}  {}", file.id, file.file_name);
    }
    Ok(())
}

async fn cmd_kb_show(config: &AppConfig, auth: &AdminAuth, id: &str) -> Result<()> {
    let (admin, session) = admin_login(config, auth).await?;
    let doc = admin.show(&session, id).await?;

    println!("# {} ({})", doc.file_name, doc.uploaded_at.to_rfc3339());
    println!();
    println!("{}", doc.content);
    Ok(())
}

async fn cmd_kb_delete(config: &AppConfig, auth: &AdminAuth, id: &str, yes: bool) -> Result<()> {
    let (admin, session) = admin_login(config, auth).await?;
    let doc = admin.show(&session, id).await?;

    if !yes && !confirm(&notice::confirm_delete(&doc.file_name))? {
        println!("cancelled");
        return Ok(());
    }

    admin
        .delete(&session, id)
        .await
        .map_err(|e| eyre!("{}\n{e}", notice::delete_failed(&doc.file_name)))?;
    println!("{}", notice::deleted(&doc.file_name));
    Ok(())
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn cmd_context(config: &AppConfig) -> Result<()> {
    let storage = open_storage(config).await?;
    match build_context(&storage).await? {
        Some(blob) => println!("{blob}"),
        None => eprintln!("knowledge base is empty"),
    }
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            save_config_to(&AppConfig::default(), path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_set_admin_password(config_path: Option<&Path>, password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(eyre!("admin password must not be empty"));
    }

    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    // Read the file itself so a `--db` override is not persisted.
    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        AppConfig::default()
    };
    config.admin.password_sha256 = Some(password_digest(password));
    save_config_to(&config, &path)?;

    println!("Admin password updated in: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_multiple_words() {
        let cli = Cli::parse_from(["kbchat", "ask", "What", "are", "the", "hours?"]);
        match cli.command {
            Command::Ask { question, json } => {
                assert_eq!(question.join(" "), "What are the hours?");
                assert!(!json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn parses_kb_delete_with_password_flag() {
        let cli = Cli::parse_from([
            "kbchat", "kb", "delete", "doc-1", "--password", "pw", "--yes",
        ]);
        match cli.command {
            Command::Kb {
                action: KbAction::Delete { auth, id, yes },
            } => {
                assert_eq!(auth.password, "pw");
                assert_eq!(id, "doc-1");
                assert!(yes);
            }
            _ => panic!("expected kb delete"),
        }
    }

    #[test]
    fn blank_question_is_rejected() {
        assert!(question_text(&["   ".to_string()]).is_err());
        assert!(question_text(&[]).is_err());
        assert_eq!(
            question_text(&[" What".to_string(), "time? ".to_string()]).unwrap(),
            "What time?"
        );
    }

    #[tokio::test]
    async fn missing_explicit_config_fails_except_for_init() {
        let dir = std::env::temp_dir().join(format!("kbchat_cli_cfg_{}", std::process::id()));
        let path = dir.join("absent.toml");
        let _ = std::fs::remove_file(&path);
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["kbchat", "--config", &path_arg, "context"]);
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("config file not found"));

        let cli = Cli::parse_from(["kbchat", "--config", &path_arg, "config", "init"]);
        run(cli).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn set_admin_password_writes_digest_only() {
        let dir = std::env::temp_dir().join(format!("kbchat_cli_pw_{}", std::process::id()));
        let path = dir.join("kbchat.toml");

        cmd_config_set_admin_password(Some(&path), "hunter2").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(&password_digest("hunter2")));
        assert!(!written.contains("hunter2"));

        let config = load_config_from(&path).unwrap();
        assert!(AdminGate::from_config(&config.admin).login("hunter2").is_ok());
    }
}
