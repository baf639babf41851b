//! NIP-22: Comment
//!
//! Comments are kind 1111 events that can reply to any other event or
//! external resource. The tag convention carries two scopes:
//!
//! - Uppercase tags (`E`, `A`, `K`, `P`) point at the **root** of the thread.
//! - Lowercase tags (`e`, `a`, `k`, `p`) point at the **parent** item, which
//!   for a top-level comment is the root itself.
//!
//! ```json
//! ["E", "<root-event-id>", "<relay-url>", "<root-pubkey>"]
//! ["K", "30023"]
//! ["e", "<parent-event-id>", "<relay-url>", "<parent-pubkey>"]
//! ["k", "1111"]
//! ```

use crate::nip01::Event;

/// Kind for comment events
pub const COMMENT_KIND: u16 = 1111;

/// Check if an event is a comment.
pub fn is_comment(event: &Event) -> bool {
    event.kind == COMMENT_KIND
}

/// Root event id from the uppercase `E` tag.
pub fn get_root_event_id(event: &Event) -> Option<String> {
    event.tag_value("E").map(str::to_string)
}

/// Root address (`<kind>:<pubkey>:<d-tag>`) from the uppercase `A` tag.
pub fn get_root_address(event: &Event) -> Option<String> {
    event.tag_value("A").map(str::to_string)
}

/// Root kind from the uppercase `K` tag.
pub fn get_root_kind(event: &Event) -> Option<u16> {
    event.tag_value("K").and_then(|v| v.parse().ok())
}

/// Root author pubkey from the uppercase `P` tag.
pub fn get_root_pubkey(event: &Event) -> Option<String> {
    event.tag_value("P").map(str::to_string)
}

/// Parent event id from the lowercase `e` tag.
pub fn get_parent_event_id(event: &Event) -> Option<String> {
    event.tag_value("e").map(str::to_string)
}

/// Parent address from the lowercase `a` tag.
pub fn get_parent_address(event: &Event) -> Option<String> {
    event.tag_value("a").map(str::to_string)
}

/// Parent kind from the lowercase `k` tag.
pub fn get_parent_kind(event: &Event) -> Option<u16> {
    event.tag_value("k").and_then(|v| v.parse().ok())
}

/// Parent author pubkey from the lowercase `p` tag.
pub fn get_parent_pubkey(event: &Event) -> Option<String> {
    event.tag_value("p").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_event() -> Event {
        Event {
            id: "c".repeat(64),
            pubkey: "a".repeat(64),
            created_at: 1_700_000_000,
            kind: COMMENT_KIND,
            tags: vec![
                vec!["E".to_string(), "root-id".to_string(), String::new(), "root-pk".to_string()],
                vec!["K".to_string(), "30023".to_string()],
                vec!["P".to_string(), "root-pk".to_string()],
                vec!["e".to_string(), "parent-id".to_string()],
                vec!["k".to_string(), "1111".to_string()],
                vec!["p".to_string(), "parent-pk".to_string()],
            ],
            content: "nice article".to_string(),
            sig: "f".repeat(128),
        }
    }

    #[test]
    fn root_and_parent_scopes_are_distinguished_by_case() {
        let event = comment_event();
        assert!(is_comment(&event));
        assert_eq!(get_root_event_id(&event).as_deref(), Some("root-id"));
        assert_eq!(get_root_kind(&event), Some(30023));
        assert_eq!(get_root_pubkey(&event).as_deref(), Some("root-pk"));
        assert_eq!(get_parent_event_id(&event).as_deref(), Some("parent-id"));
        assert_eq!(get_parent_kind(&event), Some(1111));
        assert_eq!(get_parent_pubkey(&event).as_deref(), Some("parent-pk"));
    }

    #[test]
    fn missing_tags_return_none() {
        let mut event = comment_event();
        event.tags = vec![vec!["E".to_string(), "root-id".to_string()]];
        assert_eq!(get_root_event_id(&event).as_deref(), Some("root-id"));
        assert_eq!(get_parent_event_id(&event), None);
        assert_eq!(get_root_address(&event), None);
        assert_eq!(get_parent_kind(&event), None);
    }

    #[test]
    fn address_roots_for_article_comments() {
        let mut event = comment_event();
        event.tags = vec![
            vec!["A".to_string(), "30023:author:my-post".to_string()],
            vec!["a".to_string(), "30023:author:my-post".to_string()],
        ];
        assert_eq!(
            get_root_address(&event).as_deref(),
            Some("30023:author:my-post")
        );
        assert_eq!(
            get_parent_address(&event).as_deref(),
            Some("30023:author:my-post")
        );
    }

    #[test]
    fn non_numeric_kind_tag_is_ignored() {
        let mut event = comment_event();
        event.tags = vec![vec!["K".to_string(), "article".to_string()]];
        assert_eq!(get_root_kind(&event), None);
    }
}
