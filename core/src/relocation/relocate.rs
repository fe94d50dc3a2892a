//! Move and copy
//!
//! A thread is relocated by replaying its posts, one at a time and in thread
//! order, into the destination channel as the bot. The store assigns fresh
//! timestamps on each create, so sequential replay reproduces the original
//! order. The source thread is only touched (for a move) once every post has
//! been recreated.

use super::attribution::{attributed_message, destination_notice, source_notice};
use super::collector::PostSetCollector;
use super::locks::RootLocks;
use super::validator::{self, Rejection};
use super::{RelocatedPost, RelocationKind, RelocationResult};
use crate::config::WranglerConfig;
use crate::store::{read_error, PostStore, StoreError};
use crate::types::*;
use crate::{Error, Result};
use std::collections::HashMap;

pub struct RelocationExecutor<'a> {
    store: &'a dyn PostStore,
    locks: &'a RootLocks,
    config: &'a WranglerConfig,

    /// Author of record for recreated posts and notices
    bot: UserId,
}

impl<'a> RelocationExecutor<'a> {
    pub fn new(
        store: &'a dyn PostStore,
        locks: &'a RootLocks,
        config: &'a WranglerConfig,
        bot: UserId,
    ) -> Self {
        Self {
            store,
            locks,
            config,
            bot,
        }
    }

    /// Recreate the thread of `seed` in `destination` and remove the original
    pub async fn move_thread(
        &self,
        seed: PostId,
        destination: ChannelId,
    ) -> Result<RelocationResult> {
        self.relocate(RelocationKind::Move, seed, destination).await
    }

    /// Recreate the thread of `seed` in `destination`, leaving the original
    pub async fn copy_thread(
        &self,
        seed: PostId,
        destination: ChannelId,
    ) -> Result<RelocationResult> {
        self.relocate(RelocationKind::Copy, seed, destination).await
    }

    async fn relocate(
        &self,
        kind: RelocationKind,
        seed: PostId,
        destination: ChannelId,
    ) -> Result<RelocationResult> {
        let collector = PostSetCollector::new(self.store, self.config.reply_page_size);

        let destination_channel = self
            .store
            .get_channel(destination)
            .await
            .map_err(|e| read_error(format!("Channel {}", destination), e))?;

        let (seed_post, root) = collector.resolve_root(seed).await?;
        validator::check_relocate(&seed_post).map_err(|_| Error::NotRelocatable {
            post: seed_post.id,
            message_type: seed_post.message_type,
        })?;

        let guard = self.locks.lock(&[root.id]).await;

        // Everything below works on data read under the lock
        let (_, current_root) = collector.resolve_root(root.id).await?;
        guard.ensure_holds(current_root.id)?;
        let members = collector.collect_members(root.id).await?;
        let root = members
            .first()
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Thread {}", root.id)))?;
        if !root.is_relocatable() {
            return Err(Error::NotRelocatable {
                post: root.id,
                message_type: root.message_type,
            });
        }
        if kind == RelocationKind::Move && root.channel_id == destination {
            return Err(Error::InvalidOrdering(Rejection::SameChannel));
        }

        let posts: Vec<&Post> = members.iter().filter(|p| p.is_relocatable()).collect();
        if let Some(max) = self.config.thread_size_limit() {
            if posts.len() > max {
                return Err(Error::ThreadTooLarge {
                    count: posts.len(),
                    max,
                });
            }
        }

        let source_channel = self
            .store
            .get_channel(root.channel_id)
            .await
            .map_err(|e| read_error(format!("Channel {}", root.channel_id), e))?;

        tracing::info!(
            kind = %kind,
            root = %root.id,
            posts = posts.len(),
            from = %source_channel.name,
            to = %destination_channel.name,
            "Relocating thread"
        );

        let created = self.recreate(&posts, destination).await?;
        let new_root = created
            .first()
            .map(|p| p.created)
            .ok_or_else(|| Error::NotFound(format!("Thread {}", root.id)))?;

        let retained_originals = match kind {
            RelocationKind::Copy => Vec::new(),
            RelocationKind::Move if self.config.delete_moved_originals => {
                self.remove_originals(&members).await
            }
            RelocationKind::Move => members.iter().map(|p| p.id).collect(),
        };

        self.notify(kind, created.len(), &source_channel, &destination_channel, new_root)
            .await;

        tracing::info!(
            kind = %kind,
            root = %root.id,
            new_root = %new_root,
            posts = created.len(),
            retained = retained_originals.len(),
            "Thread relocated"
        );

        Ok(RelocationResult {
            kind,
            source_root: root.id,
            source_channel: source_channel.id,
            destination_channel: destination,
            new_root,
            posts: created,
            retained_originals,
        })
    }

    /// Replay `posts` in order; the first becomes the new root
    async fn recreate(
        &self,
        posts: &[&Post],
        destination: ChannelId,
    ) -> Result<Vec<RelocatedPost>> {
        let mut authors: HashMap<UserId, Option<User>> = HashMap::new();
        let mut created: Vec<RelocatedPost> = Vec::with_capacity(posts.len());
        let mut new_root: Option<PostId> = None;

        for post in posts {
            if !authors.contains_key(&post.author_id) {
                let author = match self.store.get_user(post.author_id).await {
                    Ok(user) => Some(user),
                    Err(StoreError::NotFound(_)) => None,
                    Err(e) => return Err(self.abort(created, post.id, e.to_string())),
                };
                authors.insert(post.author_id, author);
            }
            let author = authors.get(&post.author_id).and_then(Option::as_ref);

            let request = NewPost {
                channel_id: destination,
                root_id: new_root,
                author_id: self.bot,
                message: attributed_message(author, post),
                message_type: MessageType::Ordinary,
                ordering_hint: Some(post.created_at),
            };

            match self.store.create_post(request).await {
                Ok(new_post) => {
                    new_root.get_or_insert(new_post.id);
                    created.push(RelocatedPost {
                        original: post.id,
                        created: new_post.id,
                    });
                }
                Err(e) => return Err(self.abort(created, post.id, e.to_string())),
            }
        }

        Ok(created)
    }

    fn abort(&self, created: Vec<RelocatedPost>, failed: PostId, reason: String) -> Error {
        tracing::warn!(
            failed = %failed,
            created = created.len(),
            reason = %reason,
            "Relocation aborted; source thread left untouched"
        );
        Error::PartialFailure {
            created,
            failed,
            reason,
        }
    }

    /// Delete the source thread, replies first and root last
    ///
    /// Returns the posts left in place.
    async fn remove_originals(&self, members: &[Post]) -> Vec<PostId> {
        for (index, post) in members.iter().enumerate().rev() {
            match self.store.delete_post(post.id).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    let retained: Vec<PostId> = members[..=index].iter().map(|p| p.id).collect();
                    tracing::warn!(
                        post = %post.id,
                        retained = retained.len(),
                        error = %e,
                        "Originals left in place after move"
                    );
                    return retained;
                }
            }
        }
        Vec::new()
    }

    async fn notify(
        &self,
        kind: RelocationKind,
        count: usize,
        source: &Channel,
        destination: &Channel,
        new_root: PostId,
    ) {
        if self.config.notify_source_channel {
            let message = source_notice(kind, count, destination);
            let notice = NewPost::ordinary(source.id, self.bot, message);
            if let Err(e) = self.store.create_post(notice).await {
                tracing::warn!(channel = %source.id, error = %e, "Failed to post source notice");
            }
        }

        if self.config.notify_destination_thread {
            let message = destination_notice(kind, source);
            let notice = NewPost::ordinary(destination.id, self.bot, message).in_thread(new_root);
            if let Err(e) = self.store.create_post(notice).await {
                tracing::warn!(root = %new_root, error = %e, "Failed to post destination notice");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::ReparentOnRead;
    use crate::store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        locks: RootLocks,
        config: WranglerConfig,
        bot: UserId,
        alice: UserId,
        source: ChannelId,
        destination: ChannelId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            let bot = UserId::new();
            let alice = UserId::new();
            store.insert_user(User {
                id: bot,
                username: "wrangler".to_string(),
                is_bot: true,
            });
            store.insert_user(User {
                id: alice,
                username: "alice".to_string(),
                is_bot: false,
            });

            let source = ChannelId::new();
            let destination = ChannelId::new();
            for (id, name) in [(source, "source"), (destination, "destination")] {
                store.insert_channel(Channel {
                    id,
                    name: name.to_string(),
                    display_name: String::new(),
                    kind: ChannelKind::Open,
                });
            }

            let config = WranglerConfig {
                notify_source_channel: false,
                notify_destination_thread: false,
                reply_page_size: 2,
                ..WranglerConfig::default()
            };

            Self {
                store,
                locks: RootLocks::new(),
                config,
                bot,
                alice,
                source,
                destination,
            }
        }

        fn executor(&self) -> RelocationExecutor<'_> {
            RelocationExecutor::new(&self.store, &self.locks, &self.config, self.bot)
        }

        fn thread(&self, replies: usize) -> Vec<PostId> {
            let root = Post {
                id: PostId::new(),
                root_id: None,
                channel_id: self.source,
                author_id: self.alice,
                created_at: 1_000,
                message_type: MessageType::Ordinary,
                message: "root".to_string(),
            };
            let root_id = root.id;
            self.store.insert_post(root).unwrap();
            let mut ids = vec![root_id];
            for i in 0..replies {
                let reply = Post {
                    id: PostId::new(),
                    root_id: Some(root_id),
                    channel_id: self.source,
                    author_id: self.alice,
                    created_at: 1_001 + i as u64,
                    message_type: MessageType::Ordinary,
                    message: format!("reply {}", i),
                };
                ids.push(reply.id);
                self.store.insert_post(reply).unwrap();
            }
            ids
        }
    }

    #[tokio::test]
    async fn test_copy_keeps_source_and_attributes() {
        let f = Fixture::new();
        let ids = f.thread(2);

        let result = f.executor().copy_thread(ids[1], f.destination).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.retained_originals.is_empty());
        assert!(!result.source_removed());
        for id in &ids {
            assert!(f.store.contains_post(*id));
        }

        let new_root = f.store.post(result.new_root).unwrap();
        assert_eq!(new_root.author_id, f.bot);
        assert!(new_root.message.starts_with("*Originally posted by @alice"));
        assert!(new_root.message.ends_with("root"));
        assert_eq!(result.created_for(ids[0]), Some(result.new_root));
    }

    #[tokio::test]
    async fn test_move_removes_source() {
        let f = Fixture::new();
        let ids = f.thread(4);

        let result = f.executor().move_thread(ids[0], f.destination).await.unwrap();
        assert!(result.source_removed());
        for id in &ids {
            assert!(!f.store.contains_post(*id));
        }
        assert_eq!(f.store.reply_count(result.new_root), 4);
    }

    #[tokio::test]
    async fn test_move_to_same_channel_rejected() {
        let f = Fixture::new();
        let ids = f.thread(1);
        let result = f.executor().move_thread(ids[0], f.source).await;
        assert!(matches!(result, Err(Error::InvalidOrdering(Rejection::SameChannel))));
    }

    #[tokio::test]
    async fn test_unknown_destination() {
        let f = Fixture::new();
        let ids = f.thread(1);
        let result = f.executor().copy_thread(ids[0], ChannelId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_thread_size_limit() {
        let mut f = Fixture::new();
        f.config.max_thread_size = 2;
        let ids = f.thread(2);
        let result = f.executor().copy_thread(ids[0], f.destination).await;
        assert!(matches!(result, Err(Error::ThreadTooLarge { count: 3, max: 2 })));
        assert_eq!(f.store.channel_posts(f.destination).len(), 0);
    }

    #[tokio::test]
    async fn test_forbidden_delete_retains_originals() {
        let f = Fixture::new();
        let ids = f.thread(2);
        f.store.set_deletion_permitted(false);

        let result = f.executor().move_thread(ids[0], f.destination).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.retained_originals.len(), 3);
        assert!(!result.source_removed());
        for id in &ids {
            assert!(f.store.contains_post(*id));
        }
    }

    #[tokio::test]
    async fn test_notices_posted_after_relocation() {
        let mut f = Fixture::new();
        f.config.notify_source_channel = true;
        f.config.notify_destination_thread = true;
        let ids = f.thread(1);

        let result = f.executor().move_thread(ids[0], f.destination).await.unwrap();

        let source_posts = f.store.channel_posts(f.source);
        assert_eq!(source_posts.len(), 1);
        assert_eq!(
            source_posts[0].message,
            "A thread with 2 messages has been moved to ~destination"
        );

        let destination_posts = f.store.channel_posts(f.destination);
        assert_eq!(destination_posts.len(), 3);
        let last = destination_posts.last().unwrap();
        assert_eq!(last.root_id, Some(result.new_root));
        assert_eq!(last.message, "This thread was moved from ~source");
    }

    #[tokio::test]
    async fn test_root_merged_away_before_lock_conflicts() {
        let f = Fixture::new();
        let older = f.thread(2);
        let late_root = Post {
            id: PostId::new(),
            root_id: None,
            channel_id: f.source,
            author_id: f.alice,
            created_at: 2_000,
            message_type: MessageType::Ordinary,
            message: "late".to_string(),
        };
        let late = late_root.id;
        f.store.insert_post(late_root).unwrap();

        // `late` joins the older thread right after the executor first reads it
        let patch = PostPatch {
            root_id: Some(older[0]),
            channel_id: f.source,
        };
        let racing = ReparentOnRead::new(&f.store, late, patch);
        let executor = RelocationExecutor::new(&racing, &f.locks, &f.config, f.bot);

        let result = executor.move_thread(late, f.destination).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(result.is_err_and(|e| e.is_retryable()));

        for id in older.iter().chain(std::iter::once(&late)) {
            assert!(f.store.contains_post(*id));
        }
        assert!(f.store.channel_posts(f.destination).is_empty());
    }
}
