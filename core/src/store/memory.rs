//! In-process message store
//!
//! Behaves like a host store as far as the engine can tell: it assigns ids
//! and monotonic timestamps, pages replies with a keyset cursor, refuses
//! writes that would break the thread shape, and can be told that the host
//! does not permit deletion.

use super::{PostStore, ReplyCursor, ReplyPage, StoreClock, StoreError};
use crate::types::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

#[derive(Default)]
struct Inner {
    posts: HashMap<PostId, Post>,

    /// Reply keys per thread root, in thread order
    replies: HashMap<PostId, BTreeSet<(u64, PostId)>>,

    channels: HashMap<ChannelId, Channel>,
    users: HashMap<UserId, User>,
    clock: StoreClock,
    deletion_forbidden: bool,
}

impl Inner {
    fn post(&self, id: PostId) -> Result<&Post, StoreError> {
        self.posts
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Post {}", id)))
    }

    fn reply_count(&self, root_id: PostId) -> usize {
        self.replies.get(&root_id).map_or(0, BTreeSet::len)
    }

    /// Check that `root_id` may take a reply living in `channel_id`
    fn check_root(&self, root_id: PostId, channel_id: ChannelId) -> Result<(), StoreError> {
        let root = self.post(root_id)?;
        if !root.is_root() {
            return Err(StoreError::Forbidden(format!(
                "Post {} is a reply and cannot be a thread root",
                root_id
            )));
        }
        if root.channel_id != channel_id {
            return Err(StoreError::Forbidden(format!(
                "Reply must live in channel {} with its root",
                root.channel_id
            )));
        }
        Ok(())
    }

    fn index(&mut self, post: &Post) {
        if let Some(root_id) = post.root_id {
            self.replies
                .entry(root_id)
                .or_default()
                .insert(post.order_key());
        }
    }

    fn unindex(&mut self, post: &Post) {
        if let Some(root_id) = post.root_id {
            if let Some(keys) = self.replies.get_mut(&root_id) {
                keys.remove(&post.order_key());
                if keys.is_empty() {
                    self.replies.remove(&root_id);
                }
            }
        }
    }
}

/// Thread-safe in-memory [`PostStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.inner.write().users.insert(user.id, user);
    }

    pub fn insert_channel(&self, channel: Channel) {
        self.inner.write().channels.insert(channel.id, channel);
    }

    /// Import a post with its own id and timestamp
    ///
    /// Roots must be imported before their replies.
    pub fn insert_post(&self, post: Post) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.posts.contains_key(&post.id) {
            return Err(StoreError::Forbidden(format!("Post {} already exists", post.id)));
        }
        if !inner.channels.contains_key(&post.channel_id) {
            return Err(StoreError::NotFound(format!("Channel {}", post.channel_id)));
        }
        if let Some(root_id) = post.root_id {
            inner.check_root(root_id, post.channel_id)?;
        }
        inner.clock.observe(post.created_at);
        inner.index(&post);
        inner.posts.insert(post.id, post);
        Ok(())
    }

    /// Host policy: whether `delete_post` is allowed
    pub fn set_deletion_permitted(&self, permitted: bool) {
        self.inner.write().deletion_forbidden = !permitted;
    }

    pub fn contains_post(&self, id: PostId) -> bool {
        self.inner.read().posts.contains_key(&id)
    }

    pub fn post_count(&self) -> usize {
        self.inner.read().posts.len()
    }

    /// Snapshot of a post, if present
    pub fn post(&self, id: PostId) -> Option<Post> {
        self.inner.read().posts.get(&id).cloned()
    }

    /// Number of replies currently under `root_id`
    pub fn reply_count(&self, root_id: PostId) -> usize {
        self.inner.read().reply_count(root_id)
    }

    /// All posts of a channel in `(created_at, id)` order
    pub fn channel_posts(&self, channel_id: ChannelId) -> Vec<Post> {
        let inner = self.inner.read();
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| p.channel_id == channel_id)
            .cloned()
            .collect();
        posts.sort_by_key(Post::order_key);
        posts
    }

    /// All posts in the store in `(created_at, id)` order
    pub fn all_posts(&self) -> Vec<Post> {
        let mut posts: Vec<Post> = self.inner.read().posts.values().cloned().collect();
        posts.sort_by_key(Post::order_key);
        posts
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.inner.read().channels.values().cloned().collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    pub fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.inner.read().users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        self.inner
            .read()
            .channels
            .values()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_post(&self, id: PostId) -> Result<Post, StoreError> {
        self.inner.read().post(id).cloned()
    }

    async fn get_replies(&self, cursor: ReplyCursor) -> Result<ReplyPage, StoreError> {
        let inner = self.inner.read();
        inner.post(cursor.root_id)?;

        let Some(keys) = inner.replies.get(&cursor.root_id) else {
            return Ok(ReplyPage::default());
        };

        let lower = match cursor.after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let page_size = cursor.page_size.max(1);
        let mut window = keys.range((lower, Bound::Unbounded));

        let mut posts = Vec::with_capacity(page_size);
        for (_, id) in window.by_ref().take(page_size) {
            posts.push(inner.post(*id)?.clone());
        }
        let has_more = window.next().is_some();

        let next = match posts.last() {
            Some(last) if has_more => Some(cursor.advanced_past(last)),
            _ => None,
        };

        Ok(ReplyPage { posts, next })
    }

    async fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        let mut inner = self.inner.write();
        if !inner.channels.contains_key(&new.channel_id) {
            return Err(StoreError::NotFound(format!("Channel {}", new.channel_id)));
        }
        if !inner.users.contains_key(&new.author_id) {
            return Err(StoreError::NotFound(format!("User {}", new.author_id)));
        }
        if let Some(root_id) = new.root_id {
            inner.check_root(root_id, new.channel_id)?;
        }

        let post = Post {
            id: PostId::new(),
            root_id: new.root_id,
            channel_id: new.channel_id,
            author_id: new.author_id,
            created_at: inner.clock.tick(new.ordering_hint),
            message_type: new.message_type,
            message: new.message,
        };
        inner.index(&post);
        inner.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post, StoreError> {
        let mut inner = self.inner.write();
        let current = inner.post(id)?.clone();

        if !inner.channels.contains_key(&patch.channel_id) {
            return Err(StoreError::NotFound(format!("Channel {}", patch.channel_id)));
        }
        match patch.root_id {
            Some(root_id) => {
                if root_id == id {
                    return Err(StoreError::Forbidden(format!(
                        "Post {} cannot reply to itself",
                        id
                    )));
                }
                if inner.reply_count(id) > 0 {
                    return Err(StoreError::Forbidden(format!(
                        "Post {} still has replies and cannot join another thread",
                        id
                    )));
                }
                inner.check_root(root_id, patch.channel_id)?;
            }
            None => {
                if inner.reply_count(id) > 0 && patch.channel_id != current.channel_id {
                    return Err(StoreError::Forbidden(format!(
                        "Thread root {} cannot change channel while it has replies",
                        id
                    )));
                }
            }
        }

        inner.unindex(&current);
        let mut updated = current;
        updated.root_id = patch.root_id;
        updated.channel_id = patch.channel_id;
        inner.index(&updated);
        inner.posts.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.deletion_forbidden {
            return Err(StoreError::Forbidden("post deletion is disabled".to_string()));
        }
        let post = inner.post(id)?.clone();
        if inner.reply_count(id) > 0 {
            return Err(StoreError::Forbidden(format!(
                "Thread root {} still has replies",
                id
            )));
        }
        inner.unindex(&post);
        inner.posts.remove(&id);
        Ok(())
    }

    async fn get_channel(&self, id: ChannelId) -> Result<Channel, StoreError> {
        self.inner
            .read()
            .channels
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Channel {}", id)))
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.inner
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("User {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (MemoryStore, ChannelId, UserId) {
        let store = MemoryStore::new();
        let channel = Channel {
            id: ChannelId::new(),
            name: "town-square".to_string(),
            display_name: "Town Square".to_string(),
            kind: ChannelKind::Open,
        };
        let user = User {
            id: UserId::new(),
            username: "alice".to_string(),
            is_bot: false,
        };
        let (channel_id, user_id) = (channel.id, user.id);
        store.insert_channel(channel);
        store.insert_user(user);
        (store, channel_id, user_id)
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_timestamps() {
        let (store, channel, user) = fixture();
        let a = store.create_post(NewPost::ordinary(channel, user, "a")).await.unwrap();
        let b = store.create_post(NewPost::ordinary(channel, user, "b")).await.unwrap();
        assert!(b.created_at > a.created_at);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_replies_are_paged_in_order() {
        let (store, channel, user) = fixture();
        let root = store.create_post(NewPost::ordinary(channel, user, "root")).await.unwrap();
        let mut expected = Vec::new();
        for i in 0..7 {
            let reply = NewPost::ordinary(channel, user, format!("reply {}", i)).in_thread(root.id);
            let reply = store.create_post(reply).await.unwrap();
            expected.push(reply.id);
        }

        let mut seen = Vec::new();
        let mut cursor = Some(ReplyCursor::new(root.id, 3));
        let mut pages = 0;
        while let Some(c) = cursor {
            let page = store.get_replies(c).await.unwrap();
            seen.extend(page.posts.iter().map(|p| p.id));
            cursor = page.next;
            pages += 1;
        }
        assert_eq!(seen, expected);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_exact_page_boundary_has_no_next() {
        let (store, channel, user) = fixture();
        let root = store.create_post(NewPost::ordinary(channel, user, "root")).await.unwrap();
        for _ in 0..3 {
            store
                .create_post(NewPost::ordinary(channel, user, "r").in_thread(root.id))
                .await
                .unwrap();
        }
        let page = store.get_replies(ReplyCursor::new(root.id, 3)).await.unwrap();
        assert_eq!(page.posts.len(), 3);
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_reply_to_reply_rejected() {
        let (store, channel, user) = fixture();
        let root = store.create_post(NewPost::ordinary(channel, user, "root")).await.unwrap();
        let reply = store
            .create_post(NewPost::ordinary(channel, user, "reply").in_thread(root.id))
            .await
            .unwrap();
        let nested = store
            .create_post(NewPost::ordinary(channel, user, "nested").in_thread(reply.id))
            .await;
        assert!(matches!(nested, Err(StoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_root_with_replies_cannot_be_reparented() {
        let (store, channel, user) = fixture();
        let a = store.create_post(NewPost::ordinary(channel, user, "a")).await.unwrap();
        store
            .create_post(NewPost::ordinary(channel, user, "a1").in_thread(a.id))
            .await
            .unwrap();
        let b = store.create_post(NewPost::ordinary(channel, user, "b")).await.unwrap();

        let result = store
            .update_post(a.id, PostPatch {
                root_id: Some(b.id),
                channel_id: channel,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_moves_reply_index() {
        let (store, channel, user) = fixture();
        let a = store.create_post(NewPost::ordinary(channel, user, "a")).await.unwrap();
        let b = store.create_post(NewPost::ordinary(channel, user, "b")).await.unwrap();
        let r = store
            .create_post(NewPost::ordinary(channel, user, "r").in_thread(a.id))
            .await
            .unwrap();

        store
            .update_post(r.id, PostPatch {
                root_id: Some(b.id),
                channel_id: channel,
            })
            .await
            .unwrap();
        assert_eq!(store.reply_count(a.id), 0);
        assert_eq!(store.reply_count(b.id), 1);
    }

    #[tokio::test]
    async fn test_deletion_policy() {
        let (store, channel, user) = fixture();
        let post = store.create_post(NewPost::ordinary(channel, user, "x")).await.unwrap();

        store.set_deletion_permitted(false);
        assert!(matches!(store.delete_post(post.id).await, Err(StoreError::Forbidden(_))));
        assert!(store.contains_post(post.id));

        store.set_deletion_permitted(true);
        store.delete_post(post.id).await.unwrap();
        assert!(!store.contains_post(post.id));
        assert!(matches!(store.get_post(post.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_root_with_replies_cannot_be_deleted() {
        let (store, channel, user) = fixture();
        let root = store.create_post(NewPost::ordinary(channel, user, "root")).await.unwrap();
        let reply = store
            .create_post(NewPost::ordinary(channel, user, "reply").in_thread(root.id))
            .await
            .unwrap();
        assert!(store.delete_post(root.id).await.is_err());
        store.delete_post(reply.id).await.unwrap();
        store.delete_post(root.id).await.unwrap();
    }

    #[test]
    fn test_import_requires_channel() {
        let store = MemoryStore::new();
        let post = Post {
            id: PostId::new(),
            root_id: None,
            channel_id: ChannelId::new(),
            author_id: UserId::new(),
            created_at: 5,
            message_type: MessageType::Ordinary,
            message: String::new(),
        };
        assert!(matches!(store.insert_post(post), Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_after_max_timestamp_import() {
        let (store, channel, user) = fixture();
        let imported = Post {
            id: PostId::new(),
            root_id: None,
            channel_id: channel,
            author_id: user,
            created_at: u64::MAX,
            message_type: MessageType::Ordinary,
            message: "from the far future".to_string(),
        };
        store.insert_post(imported).unwrap();

        let post = store.create_post(NewPost::ordinary(channel, user, "next")).await.unwrap();
        assert_eq!(post.created_at, u64::MAX);
    }
}
