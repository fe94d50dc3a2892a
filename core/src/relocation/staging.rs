//! Staged selections for the two-step attach and merge workflows
//!
//! Each user owns at most one slot. Staging again replaces the slot: there is
//! no queue and no explicit cancel; a new start is the cancel.
//!
//! ```text
//!   Idle --start--> Staged --finish(ok)--> Idle
//!                   Staged --start------> Staged   (old selection discarded)
//!                   Staged --finish(err)-> Staged  (kept for retry)
//! ```

use crate::store::{read_error, PostStore};
use crate::types::*;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Which workflow a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingKind {
    Attach,
    Merge,
}

impl fmt::Display for StagingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingKind::Attach => f.write_str("attach"),
            StagingKind::Merge => f.write_str("merge"),
        }
    }
}

/// A post with its author and channel, captured when it was selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichSelection {
    pub post: Post,
    pub author: User,
    pub channel: Channel,
}

impl RichSelection {
    /// Snapshot `post_id` together with its author and channel
    pub async fn capture(store: &dyn PostStore, post_id: PostId) -> Result<Self> {
        let post = store
            .get_post(post_id)
            .await
            .map_err(|e| read_error(format!("Post {}", post_id), e))?;
        Self::capture_post(store, post).await
    }

    /// Snapshot an already fetched post
    pub async fn capture_post(store: &dyn PostStore, post: Post) -> Result<Self> {
        let author = store
            .get_user(post.author_id)
            .await
            .map_err(|e| read_error(format!("User {}", post.author_id), e))?;
        let channel = store
            .get_channel(post.channel_id)
            .await
            .map_err(|e| read_error(format!("Channel {}", post.channel_id), e))?;
        Ok(Self {
            post,
            author,
            channel,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSlot {
    pub owner: UserId,
    pub selection: RichSelection,
    pub kind: StagingKind,

    /// Milliseconds since UNIX epoch
    pub staged_at: u64,
}

impl StagingSlot {
    /// Whether the slot has been idle longer than `max_idle` at `now`
    pub fn is_idle(&self, now: u64, max_idle: Duration) -> bool {
        now.saturating_sub(self.staged_at) > max_idle.as_millis() as u64
    }
}

/// Per-user single-slot store
#[derive(Default)]
pub struct StagingStore {
    slots: Mutex<HashMap<UserId, StagingSlot>>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a slot for `owner`, replacing any previous one
    ///
    /// Returns the replaced slot, if there was one.
    pub fn stage(
        &self,
        owner: UserId,
        selection: RichSelection,
        kind: StagingKind,
    ) -> Option<StagingSlot> {
        self.stage_at(owner, selection, kind, now_millis())
    }

    /// [`stage`](Self::stage) with an explicit timestamp
    pub fn stage_at(
        &self,
        owner: UserId,
        selection: RichSelection,
        kind: StagingKind,
        staged_at: u64,
    ) -> Option<StagingSlot> {
        let post = selection.post.id;
        let slot = StagingSlot {
            owner,
            selection,
            kind,
            staged_at,
        };
        let previous = self.slots.lock().insert(owner, slot);

        if let Some(prev) = &previous {
            tracing::info!(
                user = %owner,
                previous_kind = %prev.kind,
                previous_post = %prev.selection.post.id,
                kind = %kind,
                post = %post,
                "AlreadyStaged: replacing staged selection"
            );
        } else {
            tracing::debug!(user = %owner, kind = %kind, post = %post, "Staged selection");
        }

        previous
    }

    pub fn peek(&self, owner: UserId) -> Option<StagingSlot> {
        self.slots.lock().get(&owner).cloned()
    }

    pub fn clear(&self, owner: UserId) -> Option<StagingSlot> {
        self.slots.lock().remove(&owner)
    }

    /// Clear the slot only if it still holds `post` staged for `kind`
    ///
    /// A finish that raced with a new start must not discard the newer
    /// selection.
    pub fn clear_if(&self, owner: UserId, kind: StagingKind, post: PostId) -> bool {
        let mut slots = self.slots.lock();
        match slots.get(&owner) {
            Some(slot) if slot.kind == kind && slot.selection.post.id == post => {
                slots.remove(&owner);
                true
            }
            _ => false,
        }
    }

    /// Drop every slot idle for longer than `max_idle` at `now`
    pub fn evict_idle(&self, now: u64, max_idle: Duration) -> Vec<StagingSlot> {
        let mut slots = self.slots.lock();
        let stale: Vec<UserId> = slots
            .iter()
            .filter(|(_, slot)| slot.is_idle(now, max_idle))
            .map(|(owner, _)| *owner)
            .collect();

        let evicted: Vec<StagingSlot> = stale
            .into_iter()
            .filter_map(|owner| slots.remove(&owner))
            .collect();

        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "Evicted idle staged selections");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
