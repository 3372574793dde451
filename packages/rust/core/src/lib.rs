//! Domain logic for kbchat.
//!
//! Ties the knowledge store and the generative model together:
//! - [`context`] renders stored documents into the knowledge blob
//! - [`answer`] turns a question into a grounded reply
//! - [`conversation`] keeps the per-session transcript in order
//! - [`admin`] gates and performs knowledge uploads and deletions

pub mod admin;
pub mod answer;
pub mod citation;
pub mod context;
pub mod conversation;
pub mod prompt;

pub use admin::{
    AdminGate, AdminSession, FileSelection, KnowledgeAdmin, UploadReport, password_digest,
    select_markdown,
};
pub use answer::{AnswerService, AnswerSettings};
pub use citation::{Citation, parse_citations};
pub use context::{build_context, render_context};
pub use conversation::{Conversation, PendingQuestion, Resolution};
