//! Application configuration for kbchat.
//!
//! User config lives at `~/.kbchat/kbchat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KbChatError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "kbchat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".kbchat";

// ---------------------------------------------------------------------------
// Config structs (matching kbchat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge store location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Generative model endpoint settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Assistant persona.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Admin gate.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. A leading `~/` is expanded.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.kbchat/knowledge.db".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for answers.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature. Kept low to reduce hallucination variance.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling bound.
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling bound.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[assistant]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Persona name used in the system instruction and the widget header.
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Seeded bot message at the start of every chat session.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            greeting: default_greeting(),
        }
    }
}

fn default_assistant_name() -> String {
    "생활백서봇".into()
}
fn default_greeting() -> String {
    "안녕하세요. 궁금한 점은 뭐든 말씀해주세요.".into()
}

/// `[admin]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Hex SHA-256 digest of the admin password. Administration is disabled
    /// while this is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha256: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.kbchat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| KbChatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.kbchat/kbchat.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KbChatError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| KbChatError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load config for an app run: an explicit `config_path` must exist, otherwise
/// the default location is used. `db` replaces `[storage] db_path`.
pub fn load_config_with(config_path: Option<&Path>, db: Option<&Path>) -> Result<AppConfig> {
    let mut config = match config_path {
        Some(path) if !path.exists() => {
            return Err(KbChatError::config(format!(
                "config file not found: {} (run `kbchat config init` to create it)",
                path.display()
            )));
        }
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(db) = db {
        config.storage.db_path = db.to_string_lossy().into_owned();
    }
    Ok(config)
}

/// Write `config` to `path`, creating the parent directory if needed.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| KbChatError::io(parent, e))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| KbChatError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| KbChatError::io(path, e))?;
    tracing::info!(?path, "wrote config file");
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config_to(&AppConfig::default(), &path)?;
    Ok(path)
}

/// Resolve the configured database path, expanding a leading `~/`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    expand_home(&config.storage.db_path)
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| KbChatError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Read the Gemini API key from the env var named in config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.gemini.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(KbChatError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://aistudio.google.com/apikey"
        ))),
    }
}

/// Check that the Gemini API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}
