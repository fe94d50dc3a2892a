//! Fixture loading - users, channels and posts for the in-memory store

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use wrangler_core::{
    now_millis, Channel, ChannelId, ChannelKind, MemoryStore, MessageType, Post, PostId, User,
    UserId,
};

const DEMO_FIXTURE: &str = r#"{
  "users": [
    { "username": "alice" },
    { "username": "bob" },
    { "username": "carol" }
  ],
  "channels": [
    { "name": "town-square", "display_name": "Town Square" },
    { "name": "support", "display_name": "Support" },
    { "name": "off-topic", "display_name": "Off-Topic" }
  ],
  "posts": [
    { "key": "deploy", "channel": "town-square", "author": "alice", "message": "Deploy is failing on the staging cluster" },
    { "reply_to": "deploy", "channel": "town-square", "author": "bob", "message": "Looks like the migration timed out" },
    { "reply_to": "deploy", "channel": "town-square", "author": "carol", "type": "system", "message": "carol joined the channel" },
    { "reply_to": "deploy", "channel": "town-square", "author": "alice", "message": "Retrying with a longer timeout" },
    { "key": "lunch", "channel": "town-square", "author": "carol", "message": "Anyone up for lunch?" },
    { "key": "deploy-again", "channel": "town-square", "author": "bob", "message": "Staging deploy broke again" },
    { "reply_to": "deploy-again", "channel": "town-square", "author": "alice", "message": "Same migration?" },
    { "channel": "town-square", "author": "alice", "message": "Also the cache warmup is slow" },
    { "key": "printer", "channel": "support", "author": "bob", "message": "Printer on floor 3 is jammed" }
  ]
}"#;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    /// Username of the bot that authors relocated posts
    #[serde(default = "default_bot")]
    bot: String,

    #[serde(default)]
    users: Vec<UserEntry>,

    #[serde(default)]
    channels: Vec<ChannelEntry>,

    /// Roots must appear before their replies
    #[serde(default)]
    posts: Vec<PostEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    username: String,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct ChannelEntry {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    kind: ChannelKind,
}

#[derive(Debug, Deserialize)]
struct PostEntry {
    /// Local name other entries use in `reply_to`
    #[serde(default)]
    key: Option<String>,
    channel: String,
    author: String,
    #[serde(default)]
    reply_to: Option<String>,

    /// Milliseconds since UNIX epoch; spaced a minute apart when omitted
    #[serde(default)]
    created_at: Option<u64>,

    #[serde(default, rename = "type")]
    message_type: MessageType,
    #[serde(default)]
    message: String,
}

fn default_bot() -> String {
    "wrangler".to_string()
}

/// A populated store plus the identities the REPL needs
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub bot: UserId,
}

impl Fixture {
    /// Load a fixture from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;
        Self::from_json(&data)
            .with_context(|| format!("Failed to load fixture: {}", path.display()))
    }

    /// The built-in demonstration workspace
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_FIXTURE).context("Failed to load built-in fixture")
    }

    fn from_json(data: &str) -> Result<Self> {
        let file: FixtureFile = serde_json::from_str(data).context("Failed to parse fixture")?;
        Self::build(file)
    }

    fn build(file: FixtureFile) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());

        let mut users: HashMap<String, UserId> = HashMap::new();
        for entry in file.users {
            let id = UserId::new();
            users.insert(entry.username.clone(), id);
            store.insert_user(User {
                id,
                username: entry.username,
                is_bot: entry.is_bot,
            });
        }

        let bot = match users.get(&file.bot) {
            Some(id) => *id,
            None => {
                let id = UserId::new();
                store.insert_user(User {
                    id,
                    username: file.bot.clone(),
                    is_bot: true,
                });
                id
            }
        };

        let mut channels: HashMap<String, ChannelId> = HashMap::new();
        for entry in file.channels {
            let id = ChannelId::new();
            channels.insert(entry.name.clone(), id);
            store.insert_channel(Channel {
                id,
                name: entry.name,
                display_name: entry.display_name,
                kind: entry.kind,
            });
        }

        let count = file.posts.len() as u64;
        let base = now_millis().saturating_sub(count * 60_000);
        let mut keys: HashMap<String, PostId> = HashMap::new();

        for (index, entry) in file.posts.into_iter().enumerate() {
            let channel_id = *channels
                .get(&entry.channel)
                .with_context(|| format!("Unknown channel in fixture: {}", entry.channel))?;
            let author_id = *users
                .get(&entry.author)
                .with_context(|| format!("Unknown user in fixture: {}", entry.author))?;
            let root_id = match &entry.reply_to {
                Some(key) => match keys.get(key) {
                    Some(id) => Some(*id),
                    None => bail!("Post replies to unknown key '{}'", key),
                },
                None => None,
            };

            let post = Post {
                id: PostId::new(),
                root_id,
                channel_id,
                author_id,
                created_at: entry
                    .created_at
                    .unwrap_or(base + index as u64 * 60_000),
                message_type: entry.message_type,
                message: entry.message,
            };
            if let Some(key) = entry.key {
                keys.insert(key, post.id);
            }
            store
                .insert_post(post)
                .map_err(|e| anyhow::anyhow!("Failed to import post #{}: {}", index + 1, e))?;
        }

        Ok(Self { store, bot })
    }
}
