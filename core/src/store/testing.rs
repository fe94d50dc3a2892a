//! Store wrappers for exercising races in unit tests

use super::{MemoryStore, PostStore, ReplyCursor, ReplyPage, StoreError};
use crate::types::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Delegates to a [`MemoryStore`], and right after the first read of
/// `watched` rewrites that post with `patch`, the way a concurrent merge
/// would between an executor's first look and its lock
pub(crate) struct ReparentOnRead<'a> {
    inner: &'a MemoryStore,
    watched: PostId,
    patch: PostPatch,
    fired: AtomicBool,
}

impl<'a> ReparentOnRead<'a> {
    pub(crate) fn new(inner: &'a MemoryStore, watched: PostId, patch: PostPatch) -> Self {
        Self {
            inner,
            watched,
            patch,
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PostStore for ReparentOnRead<'_> {
    async fn get_post(&self, id: PostId) -> Result<Post, StoreError> {
        let post = self.inner.get_post(id).await?;
        if id == self.watched && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.update_post(id, self.patch).await?;
        }
        Ok(post)
    }

    async fn get_replies(&self, cursor: ReplyCursor) -> Result<ReplyPage, StoreError> {
        self.inner.get_replies(cursor).await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        self.inner.create_post(post).await
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post, StoreError> {
        self.inner.update_post(id, patch).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        self.inner.delete_post(id).await
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Channel, StoreError> {
        self.inner.get_channel(id).await
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.inner.get_user(id).await
    }
}
