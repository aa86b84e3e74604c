//! Provenance-tracked rewriting of raw JSON source documents.
//!
//! Upstream feeds are loosely typed and occasionally wrong. Rather than fix
//! them silently, every rewrite is expressed as a [`Patcher`] that inspects a
//! [`Lens`] (a location in the tree plus its ancestor chain) and records the
//! edits it wants as standard patch operations, each tagged with a
//! human-readable reason. The recorded operations are the *only* way a patch
//! set mutates a document, so the resulting [`PatchLog`] always replays to
//! exactly the patched tree.
//!
//! ```text
//! raw document ──► PatchSet #1 ──► PatchSet #2 ──► … ──► patched document
//!                     │                │
//!                     └──── PatchLog ◄─┘   (path, op, reason) records
//! ```

pub mod diff;
pub mod lens;
pub mod operation;
pub mod patcher;
pub mod pointer;

pub use diff::diff;
pub use lens::{Frame, Lens};
pub use operation::{apply, apply_all, PatchLog, PatchOperation, PatchRecord};
pub use patcher::{at_pointer, for_each_object, PatchSet, PatchSets, Patcher};
pub use pointer::JsonPointer;

/// Errors raised while navigating or rewriting a document.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("invalid JSON pointer {pointer:?}: {message}")]
    InvalidPointer { pointer: String, message: String },

    #[error("cannot apply {op} at {path}: {message}")]
    Inapplicable {
        op: &'static str,
        path: String,
        message: String,
    },

    /// Raised by patch rules themselves when a document is in a shape they
    /// refuse to touch.
    #[error("{0}")]
    Rule(String),

    #[error(
        "patch set {patch_set:?} rule {patcher:?} failed at {pointer}: {message} (after: [{}])",
        reason_chain.join("; ")
    )]
    Patcher {
        patch_set: String,
        patcher: String,
        pointer: String,
        reason_chain: Vec<String>,
        message: String,
    },
}

impl PatchError {
    pub fn rule(message: impl Into<String>) -> Self {
        PatchError::Rule(message.into())
    }

    /// Reasons of the patches that had already been applied when this error
    /// was raised, oldest first.
    pub fn reason_chain(&self) -> &[String] {
        match self {
            PatchError::Patcher { reason_chain, .. } => reason_chain,
            _ => &[],
        }
    }
}
