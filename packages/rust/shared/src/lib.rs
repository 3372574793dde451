//! Shared types, error model, and configuration for kbchat.
//!
//! This crate is the foundation depended on by all other kbchat crates.
//! It provides:
//! - [`KbChatError`]: the unified error type
//! - Domain types ([`Message`], [`KnowledgeDocument`], [`KnowledgeFile`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AdminConfig, AppConfig, AssistantConfig, GeminiConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, load_config_with,
    resolve_api_key, resolve_db_path, save_config_to, validate_api_key,
};
pub use error::{KbChatError, Result};
pub use types::{KnowledgeDocument, KnowledgeFile, Message, MessageId, Sender};
