//! Thread relocation and consolidation
//!
//! - [`collector`]: enumerate the ordered posts of a thread from any member
//! - [`validator`]: decide whether an action is legal right now
//! - [`staging`]: per-user staged selection for two-step attach/merge
//! - [`relocate`]: move and copy threads between channels
//! - [`merge`]: attach a message to a thread, merge two threads
//! - [`locks`]: per-thread-root serialization of relocations

pub mod attribution;
pub mod collector;
pub mod locks;
pub mod merge;
pub mod relocate;
pub mod staging;
pub mod validator;


pub use collector::PostSetCollector;
pub use locks::RootLocks;
pub use merge::{MergeAttachExecutor, MergeResult};
pub use relocate::RelocationExecutor;
pub use staging::{RichSelection, StagingKind, StagingSlot, StagingStore};
pub use validator::{Action, ActionContext, Rejection};

use crate::types::{ChannelId, PostId};
use std::fmt;

/// Whether a relocation keeps the source thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocationKind {
    Move,
    Copy,
}

impl RelocationKind {
    /// Past participle used in notices and logs
    pub fn verb(&self) -> &'static str {
        match self {
            RelocationKind::Move => "moved",
            RelocationKind::Copy => "copied",
        }
    }
}

impl fmt::Display for RelocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelocationKind::Move => f.write_str("move"),
            RelocationKind::Copy => f.write_str("copy"),
        }
    }
}

/// One recreated post: where it came from and what it became
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocatedPost {
    pub original: PostId,
    pub created: PostId,
}

/// Outcome of a successful move or copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationResult {
    pub kind: RelocationKind,
    pub source_root: PostId,
    pub source_channel: ChannelId,
    pub destination_channel: ChannelId,

    /// Root of the recreated thread
    pub new_root: PostId,

    /// Recreated posts in thread order
    pub posts: Vec<RelocatedPost>,

    /// Originals left in place after a move because the host refused to
    /// delete them (always empty for copy)
    pub retained_originals: Vec<PostId>,
}

impl RelocationResult {
    /// Id of the post recreated from `original`
    pub fn created_for(&self, original: PostId) -> Option<PostId> {
        self.posts
            .iter()
            .find(|p| p.original == original)
            .map(|p| p.created)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Whether every original of a move was removed from the source
    pub fn source_removed(&self) -> bool {
        self.kind == RelocationKind::Move && self.retained_originals.is_empty()
    }
}
