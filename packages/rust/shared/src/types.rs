//! Core domain types for kbchat: chat messages and knowledge documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MessageId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for chat message identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate a new time-sortable message identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One turn of the visible transcript. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
}

impl Message {
    /// A message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// A message produced by the assistant.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::Bot,
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge documents
// ---------------------------------------------------------------------------

/// An admin-uploaded markdown document, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Opaque document identifier (UUID v7 string).
    pub id: String,
    /// Original file name; not required to be unique.
    pub file_name: String,
    /// Raw markdown content.
    pub content: String,
    /// When the document was uploaded.
    pub uploaded_at: DateTime<Utc>,
}

/// Listing projection of a [`KnowledgeDocument`] without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub id: String,
    pub file_name: String,
}

impl From<&KnowledgeDocument> for KnowledgeFile {
    fn from(doc: &KnowledgeDocument) -> Self {
        Self {
            id: doc.id.clone(),
            file_name: doc.file_name.clone(),
        }
    }
}
