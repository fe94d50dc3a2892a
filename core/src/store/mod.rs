//! Host message store interface
//!
//! The engine never owns post data. Everything it reads or writes goes
//! through [`PostStore`], which the host platform implements. [`MemoryStore`]
//! is an in-process implementation used by the CLI and the tests.

pub mod clock;
pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

use crate::types::*;
use async_trait::async_trait;

pub use clock::StoreClock;
pub use memory::MemoryStore;

/// Failures reported by a store implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Operation not permitted: {0}")]
    Forbidden(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Keyset pagination cursor for the replies of one thread
///
/// Replies are returned in `(created_at, id)` order; `after` is the key of
/// the last reply already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyCursor {
    pub root_id: PostId,
    pub after: Option<(u64, PostId)>,
    pub page_size: usize,
}

impl ReplyCursor {
    pub fn new(root_id: PostId, page_size: usize) -> Self {
        Self {
            root_id,
            after: None,
            page_size,
        }
    }

    /// Cursor continuing after `last`
    pub fn advanced_past(&self, last: &Post) -> Self {
        Self {
            after: Some(last.order_key()),
            ..*self
        }
    }
}

/// One page of replies
#[derive(Debug, Clone, Default)]
pub struct ReplyPage {
    pub posts: Vec<Post>,

    /// Cursor for the following page; `None` once the thread is exhausted
    pub next: Option<ReplyCursor>,
}

/// Operations consumed from the host message store
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Read one post by id
    async fn get_post(&self, id: PostId) -> Result<Post, StoreError>;

    /// Read one page of replies to a thread root (root excluded)
    async fn get_replies(&self, cursor: ReplyCursor) -> Result<ReplyPage, StoreError>;

    /// Create a post; the store assigns `id` and `created_at`
    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    /// Rewrite a post's thread membership and channel
    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post, StoreError>;

    /// Delete a post
    async fn delete_post(&self, id: PostId) -> Result<(), StoreError>;

    async fn get_channel(&self, id: ChannelId) -> Result<Channel, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;
}

/// Map a store failure on a read of `what` into an engine error
pub(crate) fn read_error(what: impl std::fmt::Display, err: StoreError) -> crate::Error {
    match err {
        StoreError::NotFound(_) => crate::Error::NotFound(what.to_string()),
        other => crate::Error::Store(format!("Failed to read {}: {}", what, other)),
    }
}
