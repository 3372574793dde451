//! Panel views.
//!
//! The open panel shows one view at a time; `F2` switches between them.
//! Screens never do I/O themselves: key handling returns an [`Action`] and
//! the app runs it as a background task.

mod admin;
mod chat;

use std::fmt;
use std::path::PathBuf;

use kbchat_core::PendingQuestion;
use kbchat_shared::KnowledgeFile;

pub(crate) use admin::AdminScreen;
pub(crate) use chat::ChatScreen;

/// View identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    Chat,
    Admin,
}

impl View {
    pub(crate) fn toggled(self) -> Self {
        match self {
            Self::Chat => Self::Admin,
            Self::Admin => Self::Chat,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "채팅"),
            Self::Admin => write!(f, "관리자 페이지"),
        }
    }
}

/// Work requested by a screen.
#[derive(Debug)]
pub(crate) enum Action {
    Ask(PendingQuestion),
    Login(String),
    Upload(Vec<PathBuf>),
    Delete(KnowledgeFile),
    RefreshFiles,
}
