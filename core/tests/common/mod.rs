//! Shared workspace setup for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wrangler_core::store::{ReplyCursor, ReplyPage};
use wrangler_core::{
    Channel, ChannelId, ChannelKind, MemoryStore, MessageType, NewPost, Post, PostId, PostPatch,
    PostStore, StoreError, User, UserId, Wrangler, WranglerConfig,
};

/// Engine logs for `RUST_LOG=wrangler_core=debug cargo test -- --nocapture`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An in-memory workspace with named users and channels
pub struct Workspace {
    pub store: Arc<MemoryStore>,
    pub bot: UserId,
    users: HashMap<&'static str, UserId>,
    channels: HashMap<&'static str, ChannelId>,
}

impl Workspace {
    pub fn new(users: &[&'static str], channels: &[&'static str]) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let bot = UserId::new();
        store.insert_user(User {
            id: bot,
            username: "wrangler".to_string(),
            is_bot: true,
        });

        let users = users
            .iter()
            .map(|name| {
                let id = UserId::new();
                store.insert_user(User {
                    id,
                    username: name.to_string(),
                    is_bot: false,
                });
                (*name, id)
            })
            .collect();

        let channels = channels
            .iter()
            .map(|name| {
                let id = ChannelId::new();
                store.insert_channel(Channel {
                    id,
                    name: name.to_string(),
                    display_name: String::new(),
                    kind: ChannelKind::Open,
                });
                (*name, id)
            })
            .collect();

        Self {
            store,
            bot,
            users,
            channels,
        }
    }

    pub fn user(&self, name: &str) -> UserId {
        self.users[name]
    }

    pub fn channel(&self, name: &str) -> ChannelId {
        self.channels[name]
    }

    /// Config without notices, with a small page size to force pagination
    pub fn quiet_config() -> WranglerConfig {
        WranglerConfig {
            notify_source_channel: false,
            notify_destination_thread: false,
            reply_page_size: 3,
            ..WranglerConfig::default()
        }
    }

    pub fn wrangler(&self, config: WranglerConfig) -> Wrangler {
        Wrangler::new(self.store.clone(), self.bot, config).expect("valid config")
    }

    /// Import a post with a fixed timestamp
    pub fn import(
        &self,
        channel: &str,
        author: &str,
        root: Option<PostId>,
        created_at: u64,
        message: &str,
    ) -> PostId {
        self.import_typed(channel, author, root, created_at, message, MessageType::Ordinary)
    }

    pub fn import_typed(
        &self,
        channel: &str,
        author: &str,
        root: Option<PostId>,
        created_at: u64,
        message: &str,
        message_type: MessageType,
    ) -> PostId {
        let post = Post {
            id: PostId::new(),
            root_id: root,
            channel_id: self.channel(channel),
            author_id: self.user(author),
            created_at,
            message_type,
            message: message.to_string(),
        };
        let id = post.id;
        self.store.insert_post(post).expect("import post");
        id
    }

    /// A root followed by `replies` replies, one second apart
    pub fn thread(&self, channel: &str, author: &str, start: u64, replies: usize) -> Vec<PostId> {
        let root = self.import(channel, author, None, start, "message 0");
        let mut ids = vec![root];
        for i in 1..=replies {
            let message = format!("message {}", i);
            ids.push(self.import(channel, author, Some(root), start + i as u64 * 1_000, &message));
        }
        ids
    }

    /// Bodies of the posts of one thread in `channel`, in stored order
    pub fn thread_bodies(&self, channel: &str, root: PostId) -> Vec<String> {
        self.store
            .channel_posts(self.channel(channel))
            .into_iter()
            .filter(|p| p.thread_root() == root)
            .map(|p| p.message)
            .collect()
    }
}

/// Strip the attribution header from a recreated body
pub fn original_body(message: &str) -> &str {
    message.split_once("\n\n").map(|(_, body)| body).unwrap_or("")
}

/// A store that refuses to create posts after a quota is used up
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    creates_allowed: usize,
    creates: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>, creates_allowed: usize) -> Self {
        Self {
            inner,
            creates_allowed,
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PostStore for FailingStore {
    async fn get_post(&self, id: PostId) -> Result<Post, StoreError> {
        self.inner.get_post(id).await
    }

    async fn get_replies(&self, cursor: ReplyCursor) -> Result<ReplyPage, StoreError> {
        self.inner.get_replies(cursor).await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        if self.creates.fetch_add(1, Ordering::SeqCst) >= self.creates_allowed {
            return Err(StoreError::Unavailable("write quota exhausted".to_string()));
        }
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
