//! Wrangler Core Library
//!
//! Thread relocation and consolidation for channel-based chat history.
//! This library provides the engine behind moving, copying, attaching and
//! merging threads: enumerating a thread's posts, deciding which actions are
//! legal, and replaying or re-parenting posts against a host message store
//! without losing authorship or conversation order.

pub mod config;
pub mod relocation;
pub mod store;
pub mod types;
pub mod version;
pub mod wrangler;

pub use config::WranglerConfig;
pub use relocation::attribution::format_timestamp;
pub use relocation::{
    Action, ActionContext, MergeResult, RelocatedPost, RelocationKind, RelocationResult,
    Rejection, RichSelection, StagingKind, StagingSlot, StagingStore,
};
pub use store::{MemoryStore, PostStore, StoreError};
pub use types::*;
pub use version::{version_string, BuildInfo, VERSION};
pub use wrangler::Wrangler;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Post {post} cannot be relocated: {message_type} posts are never moved")]
    NotRelocatable {
        post: PostId,
        message_type: MessageType,
    },

    #[error("Action no longer valid: {0}")]
    InvalidOrdering(Rejection),

    #[error(
        "Relocation stopped at post {failed} after {} post(s) were created: {reason}",
        .created.len()
    )]
    PartialFailure {
        created: Vec<RelocatedPost>,
        failed: PostId,
        reason: String,
    },

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Thread has {count} posts, more than the configured maximum of {max}")]
    ThreadTooLarge {
        count: usize,
        max: usize,
    },

    #[error("{0} is disabled")]
    Disabled(&'static str),

    #[error("Storage operation failed: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller may reasonably try the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::InvalidOrdering(_) | Error::PartialFailure { .. } | Error::Conflict(_)
        )
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Error::InvalidOrdering(rejection)
    }
}
