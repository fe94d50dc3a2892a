//! Attach and merge
//!
//! Both operations re-parent existing posts under another thread root by
//! rewriting their root and channel. Content is never duplicated and
//! timestamps are untouched, so the posts keep their place in time.

use super::collector::PostSetCollector;
use super::locks::RootLocks;
use super::validator::{self, Rejection};
use crate::store::{PostStore, StoreError};
use crate::types::*;
use crate::{Error, Result};

/// Outcome of a successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Surviving (older) thread root
    pub target_root: PostId,
    pub target_channel: ChannelId,

    /// Former root of the absorbed thread
    pub merged_root: PostId,

    /// Re-parented posts in the order they were rewritten
    pub reparented: Vec<PostId>,
}

pub struct MergeAttachExecutor<'a> {
    store: &'a dyn PostStore,
    locks: &'a RootLocks,
    page_size: usize,
}

impl<'a> MergeAttachExecutor<'a> {
    pub fn new(store: &'a dyn PostStore, locks: &'a RootLocks, page_size: usize) -> Self {
        Self {
            store,
            locks,
            page_size,
        }
    }

    /// Make the standalone `staged` post a reply in the thread of `target`
    pub async fn attach(&self, staged: PostId, target: PostId) -> Result<Post> {
        let collector = PostSetCollector::new(self.store, self.page_size);

        let (_, target_root) = self.resolve(&collector, target).await?;
        let guard = self.locks.lock(&[staged, target_root.id]).await;

        // Re-read under the lock; the selection may be stale
        let staged_post = self.fetch_live(staged).await?;
        let (target_post, target_root) = self.resolve(&collector, target).await?;
        guard.ensure_holds(target_root.id)?;

        not_relocatable(&staged_post)?;
        validator::check_standalone(&staged_post, collector.has_replies(staged).await?)?;
        validator::check_attach_ordering(&target_post, &target_root, &staged_post)
            .map_err(|rejection| self.reject(&target_post, rejection))?;

        let patch = PostPatch {
            root_id: Some(target_root.id),
            channel_id: target_root.channel_id,
        };
        let updated = self
            .store
            .update_post(staged, patch)
            .await
            .map_err(|e| write_error(staged, e))?;

        tracing::info!(
            post = %staged,
            root = %target_root.id,
            channel = %target_root.channel_id,
            "Attached message to thread"
        );

        Ok(updated)
    }

    /// Fold the thread rooted at `staged_root` into the (older) thread of `target`
    pub async fn merge(&self, staged_root: PostId, target: PostId) -> Result<MergeResult> {
        let collector = PostSetCollector::new(self.store, self.page_size);

        let (_, target_root) = self.resolve(&collector, target).await?;
        let guard = self.locks.lock(&[staged_root, target_root.id]).await;

        let staged = self.fetch_live(staged_root).await?;
        if !staged.is_root() {
            return Err(Error::Conflict(format!(
                "Post {} is no longer a thread root",
                staged_root
            )));
        }
        let (target_post, target_root) = self.resolve(&collector, target).await?;
        guard.ensure_holds(target_root.id)?;

        not_relocatable(&staged)?;
        validator::check_merge_ordering(&target_post, &target_root, &staged)
            .map_err(|rejection| self.reject(&target_post, rejection))?;

        let members = collector.collect_members(staged_root).await?;
        let patch = PostPatch {
            root_id: Some(target_root.id),
            channel_id: target_root.channel_id,
        };

        // Replies in thread order, then the old root once it has none left
        let (root, replies) = members
            .split_first()
            .ok_or_else(|| Error::Conflict(format!("Thread {} vanished", staged_root)))?;
        let order: Vec<&Post> = replies.iter().chain(std::iter::once(root)).collect();

        let mut done: Vec<&Post> = Vec::with_capacity(order.len());
        for post in order {
            if let Err(e) = self.store.update_post(post.id, patch).await {
                tracing::warn!(
                    post = %post.id,
                    reparented = done.len(),
                    error = %e,
                    "Merge failed; rolling back"
                );
                self.roll_back(&done).await;
                return Err(write_error(post.id, e));
            }
            done.push(post);
        }

        tracing::info!(
            merged_root = %staged_root,
            target_root = %target_root.id,
            posts = done.len(),
            "Merged thread"
        );

        Ok(MergeResult {
            target_root: target_root.id,
            target_channel: target_root.channel_id,
            merged_root: staged_root,
            reparented: done.iter().map(|p| p.id).collect(),
        })
    }

    /// Restore already re-parented posts, newest rewrite first
    async fn roll_back(&self, done: &[&Post]) {
        for post in done.iter().rev() {
            if let Err(e) = self
                .store
                .update_post(post.id, PostPatch::placement_of(post))
                .await
            {
                tracing::error!(post = %post.id, error = %e, "Failed to roll back merge");
            }
        }
    }

    /// A post and its root, reporting a missing post as a conflict
    async fn resolve(&self, collector: &PostSetCollector<'_>, id: PostId) -> Result<(Post, Post)> {
        collector.resolve_root(id).await.map_err(|e| match e {
            Error::NotFound(what) => Error::Conflict(format!("{} was deleted", what)),
            other => other,
        })
    }

    async fn fetch_live(&self, id: PostId) -> Result<Post> {
        self.store.get_post(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => Error::Conflict(format!("Post {} was deleted", id)),
            other => Error::Store(other.to_string()),
        })
    }

    fn reject(&self, target: &Post, rejection: Rejection) -> Error {
        match rejection {
            Rejection::SystemPost => Error::NotRelocatable {
                post: target.id,
                message_type: target.message_type,
            },
            other => Error::InvalidOrdering(other),
        }
    }
}

fn not_relocatable(post: &Post) -> Result<()> {
    validator::check_relocate(post).map_err(|_| Error::NotRelocatable {
        post: post.id,
        message_type: post.message_type,
    })
}

fn write_error(id: PostId, err: StoreError) -> Error {
    match err {
        StoreError::NotFound(what) => {
            Error::Conflict(format!("{} disappeared while updating {}", what, id))
        }
        other => Error::Store(format!("Failed to update {}: {}", id, other)),
    }
}
