//! Ordering rules for relocation actions
//!
//! Every decision about whether an action is legal lives here. The same
//! functions decide which actions a menu offers and are re-run by the
//! executors against freshly fetched posts, so the two cannot drift apart.
//!
//! All functions are pure: callers fetch the posts and pass them in.

use super::staging::{StagingKind, StagingSlot};
use crate::types::{ChannelId, Post};
use std::fmt;

/// Why an action is not legal
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("system and combined-activity posts cannot be relocated")]
    SystemPost,

    #[error("no copy target channel is configured")]
    NoCopyTarget,

    #[error("the post is already in the target channel")]
    SameChannel,

    #[error("a selection is already staged for {0}")]
    AlreadyStaged(StagingKind),

    #[error("nothing is staged for {0}")]
    NothingStaged(StagingKind),

    #[error("the target is the staged thread itself")]
    SameThread,

    #[error("the target thread ({target}) must be older than the staged thread ({staged})")]
    TargetNotOlder {
        target: u64,
        staged: u64,
    },

    #[error("only a message that is neither a reply nor has replies can be attached")]
    NotStandalone,

    #[error("the target is the staged message itself")]
    SamePost,

    #[error("the target thread is in a different channel")]
    ChannelMismatch,

    #[error("the target thread ({target}) starts after the staged message ({staged})")]
    TargetRootTooNew {
        target: u64,
        staged: u64,
    },

    #[error("{0} is disabled")]
    Disabled(Action),
}

/// Menu actions, one per predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveThread,
    CopyThread,
    CopyToChannel,
    StartMerge,
    FinishMerge,
    StartAttach,
    FinishAttach,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::MoveThread,
        Action::CopyThread,
        Action::CopyToChannel,
        Action::StartMerge,
        Action::FinishMerge,
        Action::StartAttach,
        Action::FinishAttach,
    ];

    /// Menu label
    pub fn label(&self) -> &'static str {
        match self {
            Action::MoveThread => "Move Thread",
            Action::CopyThread => "Copy Thread",
            Action::CopyToChannel => "Copy to Channel",
            Action::StartMerge => "Merge to Thread",
            Action::FinishMerge => "Merge to this Thread",
            Action::StartAttach => "Attach to Thread",
            Action::FinishAttach => "Attach to this Thread",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything needed to evaluate the predicates for one candidate post
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub candidate: &'a Post,

    /// Root of the candidate's thread (the candidate itself for a root)
    pub candidate_root: &'a Post,

    /// Whether the candidate currently has replies
    pub candidate_has_replies: bool,

    /// The acting user's staged selection
    pub slot: Option<&'a StagingSlot>,

    pub copy_target: Option<ChannelId>,
    pub merge_enabled: bool,
    pub attach_enabled: bool,
}

/// Move Thread / Copy Thread
pub fn check_relocate(candidate: &Post) -> Result<(), Rejection> {
    if candidate.is_relocatable() {
        Ok(())
    } else {
        Err(Rejection::SystemPost)
    }
}

/// Copy to Channel
pub fn check_copy_to_channel(candidate: &Post, target: Option<ChannelId>) -> Result<(), Rejection> {
    check_relocate(candidate)?;
    match target {
        None => Err(Rejection::NoCopyTarget),
        Some(channel) if channel == candidate.channel_id => Err(Rejection::SameChannel),
        Some(_) => Ok(()),
    }
}

/// Merge to Thread
pub fn check_start_merge(candidate: &Post, slot: Option<&StagingSlot>) -> Result<(), Rejection> {
    check_relocate(candidate)?;
    match slot {
        Some(slot) if slot.kind == StagingKind::Merge => {
            Err(Rejection::AlreadyStaged(StagingKind::Merge))
        }
        _ => Ok(()),
    }
}

/// Merge to this Thread
pub fn check_finish_merge(
    candidate: &Post,
    candidate_root: &Post,
    slot: Option<&StagingSlot>,
) -> Result<(), Rejection> {
    let staged = staged_post(slot, StagingKind::Merge)?;
    check_merge_ordering(candidate, candidate_root, staged)
}

/// Attach to Thread
pub fn check_start_attach(
    candidate: &Post,
    candidate_has_replies: bool,
    slot: Option<&StagingSlot>,
) -> Result<(), Rejection> {
    check_relocate(candidate)?;
    check_standalone(candidate, candidate_has_replies)?;
    match slot {
        Some(slot) if slot.kind == StagingKind::Attach => {
            Err(Rejection::AlreadyStaged(StagingKind::Attach))
        }
        _ => Ok(()),
    }
}

/// Attach to this Thread
pub fn check_finish_attach(
    candidate: &Post,
    candidate_root: &Post,
    slot: Option<&StagingSlot>,
) -> Result<(), Rejection> {
    let staged = staged_post(slot, StagingKind::Attach)?;
    check_attach_ordering(candidate, candidate_root, staged)
}

/// Merge ordering between a target and the staged thread's root
///
/// The older thread survives: the target root must be strictly earlier than
/// the staged root.
pub fn check_merge_ordering(
    candidate: &Post,
    candidate_root: &Post,
    staged_root: &Post,
) -> Result<(), Rejection> {
    check_relocate(candidate)?;
    if candidate_root.id == staged_root.thread_root() {
        return Err(Rejection::SameThread);
    }
    if candidate_root.created_at >= staged_root.created_at {
        return Err(Rejection::TargetNotOlder {
            target: candidate_root.created_at,
            staged: staged_root.created_at,
        });
    }
    Ok(())
}

/// Attach ordering between a target and the staged message
///
/// A message may only join a thread whose root existed at or before it.
pub fn check_attach_ordering(
    candidate: &Post,
    candidate_root: &Post,
    staged: &Post,
) -> Result<(), Rejection> {
    check_relocate(candidate)?;
    if candidate.id == staged.id {
        return Err(Rejection::SamePost);
    }
    if candidate.channel_id != staged.channel_id {
        return Err(Rejection::ChannelMismatch);
    }
    if candidate_root.created_at > staged.created_at {
        return Err(Rejection::TargetRootTooNew {
            target: candidate_root.created_at,
            staged: staged.created_at,
        });
    }
    Ok(())
}

/// A root without replies
pub fn check_standalone(candidate: &Post, has_replies: bool) -> Result<(), Rejection> {
    if candidate.is_root() && !has_replies {
        Ok(())
    } else {
        Err(Rejection::NotStandalone)
    }
}

/// Evaluate one action in `ctx`
pub fn check_action(action: Action, ctx: &ActionContext<'_>) -> Result<(), Rejection> {
    match action {
        Action::MoveThread | Action::CopyThread => check_relocate(ctx.candidate),
        Action::CopyToChannel => check_copy_to_channel(ctx.candidate, ctx.copy_target),
        Action::StartMerge | Action::FinishMerge if !ctx.merge_enabled => {
            Err(Rejection::Disabled(action))
        }
        Action::StartAttach | Action::FinishAttach if !ctx.attach_enabled => {
            Err(Rejection::Disabled(action))
        }
        Action::StartMerge => check_start_merge(ctx.candidate, ctx.slot),
        Action::FinishMerge => check_finish_merge(ctx.candidate, ctx.candidate_root, ctx.slot),
        Action::StartAttach => {
            check_start_attach(ctx.candidate, ctx.candidate_has_replies, ctx.slot)
        }
        Action::FinishAttach => check_finish_attach(ctx.candidate, ctx.candidate_root, ctx.slot),
    }
}

pub fn is_offered(action: Action, ctx: &ActionContext<'_>) -> bool {
    check_action(action, ctx).is_ok()
}

/// Actions to offer for the candidate, in menu order
pub fn offered_actions(ctx: &ActionContext<'_>) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| is_offered(*action, ctx))
        .collect()
}

fn staged_post(slot: Option<&StagingSlot>, kind: StagingKind) -> Result<&Post, Rejection> {
    match slot {
        Some(slot) if slot.kind == kind => Ok(&slot.selection.post),
        _ => Err(Rejection::NothingStaged(kind)),
    }
}
