//! Core types and identifiers used throughout the system

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier (humans and the bot alike)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Post identifier
///
/// Ordered so that two posts sharing a timestamp still sort deterministically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// First eight hex characters, enough for log lines and the REPL
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of post as reported by the store
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A message written by a user (or bot)
    #[default]
    Ordinary,
    /// A single system event (join/leave, header change, ...)
    System,
    /// A synthetic summary of several system events
    CombinedActivity,
}

impl MessageType {
    /// Whether posts of this type may ever be moved, copied, attached or merged
    pub fn is_relocatable(&self) -> bool {
        matches!(self, MessageType::Ordinary)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Ordinary => "ordinary",
            MessageType::System => "system",
            MessageType::CombinedActivity => "combined-activity",
        };
        f.write_str(name)
    }
}

/// A post as held by the message store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Post {
    /// Unique identifier
    pub id: PostId,

    /// Thread root this post replies to; `None` for a root
    #[serde(default)]
    pub root_id: Option<PostId>,

    /// Channel the post lives in
    pub channel_id: ChannelId,

    /// Author of record
    pub author_id: UserId,

    /// Creation time in milliseconds since UNIX epoch, assigned by the store
    pub created_at: u64,

    #[serde(default)]
    pub message_type: MessageType,

    /// Body text
    #[serde(default)]
    pub message: String,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn is_relocatable(&self) -> bool {
        self.message_type.is_relocatable()
    }

    /// The id of the thread this post belongs to
    pub fn thread_root(&self) -> PostId {
        self.root_id.unwrap_or(self.id)
    }

    /// Total thread order: by creation time, ties broken by id
    pub fn order_key(&self) -> (u64, PostId) {
        (self.created_at, self.id)
    }
}

/// Channel visibility as reported by the store
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Open,
    Private,
    Direct,
    Group,
}

/// A channel as held by the message store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Channel {
    pub id: ChannelId,

    /// URL-safe handle (`town-square`)
    pub name: String,

    /// Human-facing name; falls back to `name` when empty
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub kind: ChannelKind,
}

impl Channel {
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// A user account as held by the store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub is_bot: bool,
}

/// Request to create a post
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NewPost {
    pub channel_id: ChannelId,
    pub root_id: Option<PostId>,
    pub author_id: UserId,
    pub message: String,
    pub message_type: MessageType,

    /// Preferred `created_at`; the store may ignore it if honouring it would
    /// move its clock backwards
    pub ordering_hint: Option<u64>,
}

impl NewPost {
    /// An ordinary post in `channel_id`
    pub fn ordinary(channel_id: ChannelId, author_id: UserId, message: impl Into<String>) -> Self {
        Self {
            channel_id,
            root_id: None,
            author_id,
            message: message.into(),
            message_type: MessageType::Ordinary,
            ordering_hint: None,
        }
    }

    pub fn in_thread(mut self, root_id: PostId) -> Self {
        self.root_id = Some(root_id);
        self
    }

    pub fn with_ordering_hint(mut self, hint: u64) -> Self {
        self.ordering_hint = Some(hint);
        self
    }
}

/// Field rewrite applied by `update_post`
///
/// Only thread membership and channel can be rewritten; body, author and
/// timestamp are immutable from the engine's point of view.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PostPatch {
    pub root_id: Option<PostId>,
    pub channel_id: ChannelId,
}

impl PostPatch {
    /// Patch that restores `post` to its current placement
    pub fn placement_of(post: &Post) -> Self {
        Self {
            root_id: post.root_id,
            channel_id: post.channel_id,
        }
    }
}

/// Current time in milliseconds since UNIX epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(created_at: u64) -> Post {
        Post {
            id: PostId::new(),
            root_id: None,
            channel_id: ChannelId::new(),
            author_id: UserId::new(),
            created_at,
            message_type: MessageType::Ordinary,
            message: String::new(),
        }
    }

    #[test]
    fn test_thread_root_of_root_is_self() {
        let root = post(10);
        assert_eq!(root.thread_root(), root.id);
        assert!(root.is_root());
    }

    #[test]
    fn test_order_key_breaks_ties_by_id() {
        let a = post(10);
        let b = post(10);
        let expected = a.id.cmp(&b.id);
        assert_eq!(a.order_key().cmp(&b.order_key()), expected);
    }

    #[test]
    fn test_only_ordinary_posts_are_relocatable() {
        assert!(MessageType::Ordinary.is_relocatable());
        assert!(!MessageType::System.is_relocatable());
        assert!(!MessageType::CombinedActivity.is_relocatable());
    }

    #[test]
    fn test_message_type_deserializes_snake_case() {
        let t: MessageType = serde_json::from_str("\"combined_activity\"").unwrap();
        assert_eq!(t, MessageType::CombinedActivity);
    }

    #[test]
    fn test_channel_label_falls_back_to_name() {
        let mut channel = Channel {
            id: ChannelId::new(),
            name: "town-square".to_string(),
            display_name: String::new(),
            kind: ChannelKind::Open,
        };
        assert_eq!(channel.label(), "town-square");
        channel.display_name = "Town Square".to_string();
        assert_eq!(channel.label(), "Town Square");
    }
}
