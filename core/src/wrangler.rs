//! Engine facade
//!
//! [`Wrangler`] ties the store, the bot identity, configuration, staged
//! selections and root locks together and exposes every operation with
//! explicit arguments. Nothing here reads ambient state: the acting user and
//! every post or channel are passed in by the caller.

use crate::config::WranglerConfig;
use crate::relocation::merge::{MergeAttachExecutor, MergeResult};
use crate::relocation::validator::{self, ActionContext};
use crate::relocation::{
    Action, PostSetCollector, Rejection, RelocationExecutor, RelocationResult, RichSelection,
    RootLocks, StagingKind, StagingSlot, StagingStore,
};
use crate::store::PostStore;
use crate::types::*;
use crate::{Error, Result};
use std::sync::Arc;

pub struct Wrangler {
    store: Arc<dyn PostStore>,
    config: WranglerConfig,

    /// Author of record for everything the engine creates
    bot: UserId,

    staging: StagingStore,
    locks: RootLocks,
}

impl Wrangler {
    pub fn new(store: Arc<dyn PostStore>, bot: UserId, config: WranglerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            bot,
            staging: StagingStore::new(),
            locks: RootLocks::new(),
        })
    }

    pub fn config(&self) -> &WranglerConfig {
        &self.config
    }

    pub fn bot(&self) -> UserId {
        self.bot
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    fn collector(&self) -> PostSetCollector<'_> {
        PostSetCollector::new(self.store.as_ref(), self.config.reply_page_size)
    }

    fn relocator(&self) -> RelocationExecutor<'_> {
        RelocationExecutor::new(self.store.as_ref(), &self.locks, &self.config, self.bot)
    }

    fn merger(&self) -> MergeAttachExecutor<'_> {
        MergeAttachExecutor::new(self.store.as_ref(), &self.locks, self.config.reply_page_size)
    }

    /// The relocatable posts of the thread containing `seed`, in order
    pub async fn collect_thread(&self, seed: PostId) -> Result<Vec<Post>> {
        self.collector().collect_thread(seed).await
    }

    /// Actions `user` may take on `post` right now
    pub async fn offered_actions(&self, user: UserId, post: PostId) -> Result<Vec<Action>> {
        let (candidate, root) = self.collector().resolve_root(post).await?;
        let has_replies = candidate.is_root() && self.collector().has_replies(candidate.id).await?;
        let slot = self.staging.peek(user);

        let ctx = ActionContext {
            candidate: &candidate,
            candidate_root: &root,
            candidate_has_replies: has_replies,
            slot: slot.as_ref(),
            copy_target: self.config.copy_target_channel,
            merge_enabled: self.config.merge_thread_enable,
            attach_enabled: self.config.attach_message_enable,
        };
        Ok(validator::offered_actions(&ctx))
    }

    pub async fn move_thread(
        &self,
        user: UserId,
        seed: PostId,
        destination: ChannelId,
    ) -> Result<RelocationResult> {
        tracing::info!(user = %user, post = %seed, channel = %destination, "Move thread requested");
        self.relocator().move_thread(seed, destination).await
    }

    pub async fn copy_thread(
        &self,
        user: UserId,
        seed: PostId,
        destination: ChannelId,
    ) -> Result<RelocationResult> {
        tracing::info!(user = %user, post = %seed, channel = %destination, "Copy thread requested");
        self.relocator().copy_thread(seed, destination).await
    }

    /// Copy the thread of `seed` to the configured copy target channel
    pub async fn copy_to_channel(&self, user: UserId, seed: PostId) -> Result<RelocationResult> {
        let (candidate, _) = self.collector().resolve_root(seed).await?;
        validator::check_copy_to_channel(&candidate, self.config.copy_target_channel)
            .map_err(|rejection| rejected(&candidate, rejection))?;
        let destination = self
            .config
            .copy_target_channel
            .ok_or(Error::InvalidOrdering(Rejection::NoCopyTarget))?;
        self.copy_thread(user, seed, destination).await
    }

    /// "Attach to Thread": stage a standalone message
    pub async fn start_attach(&self, user: UserId, post: PostId) -> Result<StagingSlot> {
        if !self.config.attach_message_enable {
            return Err(Error::Disabled("Attach to Thread"));
        }
        let selection = RichSelection::capture(self.store.as_ref(), post).await?;
        let has_replies = selection.post.is_root()
            && self.collector().has_replies(selection.post.id).await?;

        let current = self.staging.peek(user);
        tolerate_already_staged(
            &selection.post,
            validator::check_start_attach(&selection.post, has_replies, current.as_ref()),
        )?;

        self.staging.stage(user, selection, StagingKind::Attach);
        self.staged(user)
    }

    /// "Attach to this Thread": attach the staged message to `target`'s thread
    pub async fn finish_attach(&self, user: UserId, target: PostId) -> Result<Post> {
        if !self.config.attach_message_enable {
            return Err(Error::Disabled("Attach to this Thread"));
        }
        let slot = self.staged_for(user, StagingKind::Attach)?;
        let staged = slot.selection.post.id;

        let updated = self.merger().attach(staged, target).await?;
        self.staging.clear_if(user, StagingKind::Attach, staged);
        Ok(updated)
    }

    /// "Merge to Thread": stage the thread containing `post`
    pub async fn start_merge(&self, user: UserId, post: PostId) -> Result<StagingSlot> {
        if !self.config.merge_thread_enable {
            return Err(Error::Disabled("Merge to Thread"));
        }
        let (candidate, root) = self.collector().resolve_root(post).await?;

        let current = self.staging.peek(user);
        tolerate_already_staged(
            &candidate,
            validator::check_start_merge(&candidate, current.as_ref()),
        )?;
        validator::check_relocate(&root).map_err(|rejection| rejected(&root, rejection))?;

        // The thread is staged by its root
        let selection = RichSelection::capture_post(self.store.as_ref(), root).await?;
        self.staging.stage(user, selection, StagingKind::Merge);
        self.staged(user)
    }

    /// "Merge to this Thread": fold the staged thread into `target`'s thread
    pub async fn finish_merge(&self, user: UserId, target: PostId) -> Result<MergeResult> {
        if !self.config.merge_thread_enable {
            return Err(Error::Disabled("Merge to this Thread"));
        }
        let slot = self.staged_for(user, StagingKind::Merge)?;
        let staged = slot.selection.post.id;

        let result = self.merger().merge(staged, target).await?;
        self.staging.clear_if(user, StagingKind::Merge, staged);
        Ok(result)
    }

    pub fn peek_staged(&self, user: UserId) -> Option<StagingSlot> {
        self.staging.peek(user)
    }

    pub fn clear_staged(&self, user: UserId) -> Option<StagingSlot> {
        self.staging.clear(user)
    }

    /// Apply the configured idle-expiry policy; a no-op when none is set
    pub fn expire_staged(&self, now: u64) -> Vec<StagingSlot> {
        match self.config.staging_max_idle() {
            Some(max_idle) => self.staging.evict_idle(now, max_idle),
            None => Vec::new(),
        }
    }

    fn staged(&self, user: UserId) -> Result<StagingSlot> {
        self.staging
            .peek(user)
            .ok_or_else(|| Error::Conflict(format!("Staged selection of {} was replaced", user)))
    }

    fn staged_for(&self, user: UserId, kind: StagingKind) -> Result<StagingSlot> {
        match self.staging.peek(user) {
            Some(slot) if slot.kind == kind => Ok(slot),
            _ => Err(Error::InvalidOrdering(Rejection::NothingStaged(kind))),
        }
    }
}

/// Starting over an existing selection replaces it; only log that
fn tolerate_already_staged(
    candidate: &Post,
    check: std::result::Result<(), Rejection>,
) -> Result<()> {
    match check {
        Ok(()) => Ok(()),
        Err(Rejection::AlreadyStaged(kind)) => {
            tracing::info!(post = %candidate.id, kind = %kind, "AlreadyStaged: new selection wins");
            Ok(())
        }
        Err(rejection) => Err(rejected(candidate, rejection)),
    }
}

fn rejected(post: &Post, rejection: Rejection) -> Error {
    match rejection {
        Rejection::SystemPost => Error::NotRelocatable {
            post: post.id,
            message_type: post.message_type,
        },
        other => Error::InvalidOrdering(other),
    }
}
