//! Attribution headers and bot notices
//!
//! Recreated posts are authored by the bot, so the true author and original
//! time travel in the body instead.

use super::RelocationKind;
use crate::types::{Channel, Post, User, UserId};
use chrono::{DateTime, Utc};

/// `2024-03-01 14:05 UTC`, or the raw value if it is out of range
pub fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Name shown for an author that may no longer exist
pub fn author_label(author: Option<&User>, author_id: UserId) -> String {
    match author {
        Some(user) => format!("@{}", user.username),
        None => format!("unknown user ({})", author_id),
    }
}

pub fn attribution_header(author: Option<&User>, post: &Post) -> String {
    format!(
        "*Originally posted by {} on {}*",
        author_label(author, post.author_id),
        format_timestamp(post.created_at)
    )
}

/// Body of the recreated post: header, blank line, original text
pub fn attributed_message(author: Option<&User>, post: &Post) -> String {
    let header = attribution_header(author, post);
    if post.message.is_empty() {
        header
    } else {
        format!("{}\n\n{}", header, post.message)
    }
}

/// Summary left in the source channel
pub fn source_notice(kind: RelocationKind, count: usize, destination: &Channel) -> String {
    let noun = if count == 1 { "message" } else { "messages" };
    format!(
        "A thread with {} {} has been {} to ~{}",
        count,
        noun,
        kind.verb(),
        destination.name
    )
}

/// Notice appended to the recreated thread
pub fn destination_notice(kind: RelocationKind, source: &Channel) -> String {
    format!("This thread was {} from ~{}", kind.verb(), source.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn post(message: &str) -> Post {
        Post {
            id: PostId::new(),
            root_id: None,
            channel_id: ChannelId::new(),
            author_id: UserId::new(),
            created_at: 1_709_301_900_000,
            message_type: MessageType::Ordinary,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_attributed_message() {
        let p = post("hello world");
        let author = User {
            id: p.author_id,
            username: "alice".to_string(),
            is_bot: false,
        };
        assert_eq!(
            attributed_message(Some(&author), &p),
            "*Originally posted by @alice on 2024-03-01 14:05 UTC*\n\nhello world"
        );
    }

    #[test]
    fn test_missing_author_and_empty_body() {
        let p = post("");
        let message = attributed_message(None, &p);
        assert!(message.starts_with("*Originally posted by unknown user ("));
        assert!(!message.contains("\n\n"));
    }

    #[test]
    fn test_out_of_range_timestamp() {
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn test_notices() {
        let channel = Channel {
            id: ChannelId::new(),
            name: "support".to_string(),
            display_name: "Support".to_string(),
            kind: ChannelKind::Open,
        };
        assert_eq!(
            source_notice(RelocationKind::Move, 3, &channel),
            "A thread with 3 messages has been moved to ~support"
        );
        assert_eq!(
            source_notice(RelocationKind::Copy, 1, &channel),
            "A thread with 1 message has been copied to ~support"
        );
        assert_eq!(
            destination_notice(RelocationKind::Move, &channel),
            "This thread was moved from ~support"
        );
    }
}
