//! Knowledge administration behind a password gate.
//!
//! [`AdminGate::login`] checks the password against the SHA-256 digest in
//! `[admin] password_sha256` and hands out an [`AdminSession`]. Every
//! [`KnowledgeAdmin`] operation takes that session by reference.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use kbchat_shared::{AdminConfig, KbChatError, KnowledgeDocument, KnowledgeFile, Result};
use kbchat_storage::Storage;

/// File extensions accepted as markdown, compared case-insensitively.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// User-facing status strings for the admin view.
pub mod notice {
    pub const WRONG_PASSWORD: &str = "비밀번호가 올바르지 않습니다.";
    pub const NO_FILES_SELECTED: &str = "먼저 파일을 선택해주세요.";
    pub const UPLOAD_SUCCEEDED: &str = "지식 베이스가 성공적으로 업데이트되었습니다!";
    pub const UPLOAD_FAILED: &str = "업로드에 실패했습니다. 다시 시도해주세요.";
    pub const LIST_FAILED: &str = "기존 파일을 불러오지 못했습니다.";
    pub const NO_FILES_STORED: &str = "업로드된 파일이 없습니다.";

    pub fn uploading(count: usize) -> String {
        format!("파일 {count}개를 업로드 중입니다...")
    }

    pub fn rejected(names: &[String]) -> String {
        format!(
            "마크다운(.md)이 아닌 파일은 제외되었습니다: {}",
            names.join(", ")
        )
    }

    pub fn confirm_delete(file_name: &str) -> String {
        format!("'{file_name}' 파일을 정말 삭제하시겠습니까?")
    }

    pub fn deleted(file_name: &str) -> String {
        format!("'{file_name}' 파일이 삭제되었습니다.")
    }

    pub fn delete_failed(file_name: &str) -> String {
        format!("'{file_name}' 파일 삭제에 실패했습니다.")
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of `password`, the form stored in config.
pub fn password_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Proof of a successful admin login. Only [`AdminGate::login`] creates one.
#[derive(Debug, Clone)]
pub struct AdminSession {
    _private: (),
}

/// Checks admin passwords against the configured digest.
#[derive(Debug, Clone)]
pub struct AdminGate {
    digest: Option<String>,
}

impl AdminGate {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            digest: config
                .password_sha256
                .as_deref()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    /// Whether an admin password has been configured at all.
    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    pub fn login(&self, password: &str) -> Result<AdminSession> {
        let Some(expected) = &self.digest else {
            return Err(KbChatError::config(
                "admin password is not configured; run `kbchat config set-admin-password`",
            ));
        };

        let candidate = password_digest(password);
        if bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())) {
            info!("admin login succeeded");
            Ok(AdminSession { _private: () })
        } else {
            warn!("admin login rejected");
            Err(KbChatError::Unauthorized(notice::WRONG_PASSWORD.into()))
        }
    }
}

// ---------------------------------------------------------------------------
// File selection
// ---------------------------------------------------------------------------

/// A batch of candidate files split by type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    pub accepted: Vec<PathBuf>,
    /// Display names of files that were excluded.
    pub rejected: Vec<String>,
    /// Warning to show when anything was excluded.
    pub notice: Option<String>,
}

/// Whether `path` has a markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|md| ext.eq_ignore_ascii_case(md))
        })
}

/// Split `paths` into markdown files and everything else.
pub fn select_markdown(paths: &[PathBuf]) -> FileSelection {
    let (accepted, rejected): (Vec<PathBuf>, Vec<PathBuf>) =
        paths.iter().cloned().partition(|p| is_markdown(p));

    let rejected: Vec<String> = rejected.iter().map(|p| display_name(p)).collect();
    let notice = (!rejected.is_empty()).then(|| notice::rejected(&rejected));

    FileSelection {
        accepted,
        rejected,
        notice,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Knowledge administration
// ---------------------------------------------------------------------------

/// Outcome of an upload batch.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub stored: Vec<KnowledgeFile>,
    pub rejected: Vec<String>,
    pub notice: Option<String>,
}

/// Upload, list, and delete knowledge documents.
#[derive(Clone)]
pub struct KnowledgeAdmin {
    storage: Arc<Storage>,
}

impl KnowledgeAdmin {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Store every markdown file in `paths` as its own document.
    ///
    /// All accepted files are read before anything is inserted, so an
    /// unreadable file leaves the store untouched.
    #[instrument(skip_all, fields(files = paths.len()))]
    pub async fn upload(&self, _session: &AdminSession, paths: &[PathBuf]) -> Result<UploadReport> {
        let selection = select_markdown(paths);
        if let Some(n) = &selection.notice {
            warn!(rejected = ?selection.rejected, "{n}");
        }
        if selection.accepted.is_empty() {
            return Err(KbChatError::validation(notice::NO_FILES_SELECTED));
        }

        let mut loaded = Vec::with_capacity(selection.accepted.len());
        for path in &selection.accepted {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| KbChatError::io(path, e))?;
            loaded.push((display_name(path), content));
        }

        let uploaded_at = Utc::now();
        let mut stored = Vec::with_capacity(loaded.len());
        for (file_name, content) in loaded {
            let id = self
                .storage
                .insert_document(&file_name, &content, uploaded_at)
                .await?;
            stored.push(KnowledgeFile { id, file_name });
        }

        info!(stored = stored.len(), rejected = selection.rejected.len(), "upload complete");
        Ok(UploadReport {
            stored,
            rejected: selection.rejected,
            notice: selection.notice,
        })
    }

    /// All stored files ordered by name.
    pub async fn list(&self, _session: &AdminSession) -> Result<Vec<KnowledgeFile>> {
        self.storage.list_files().await
    }

    /// One document with its content.
    pub async fn show(&self, _session: &AdminSession, id: &str) -> Result<KnowledgeDocument> {
        self.storage
            .get_document(id)
            .await?
            .ok_or_else(|| KbChatError::document_not_found(id))
    }

    #[instrument(skip(self, _session))]
    pub async fn delete(&self, _session: &AdminSession, id: &str) -> Result<()> {
        self.storage.delete_document(id).await?;
        info!("document deleted");
        Ok(())
    }
}
