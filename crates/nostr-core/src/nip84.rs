//! NIP-84: Highlights
//!
//! A highlight (kind 9802) captures a passage a user found valuable. The
//! highlighted text is the event content; tags point back at where it came
//! from:
//!
//! ```json
//! ["e", "<source event id>"]
//! ["a", "<source event address>"]
//! ["r", "<source url>"]
//! ["context", "<surrounding text>"]
//! ["p", "<attributed author>", "<relay>", "<role>"]
//! ```

use crate::nip01::Event;

/// Kind for highlight events
pub const HIGHLIGHT_KIND: u16 = 9802;

/// Check if a kind is a highlight.
pub fn is_highlight_kind(kind: u16) -> bool {
    kind == HIGHLIGHT_KIND
}

/// Source event id from the `e` tag, when highlighting another event.
pub fn get_source_event_id(event: &Event) -> Option<String> {
    event.tag_value("e").map(str::to_string)
}

/// Source address from the `a` tag, when highlighting an addressable event
/// such as a long-form article.
pub fn get_source_address(event: &Event) -> Option<String> {
    event.tag_value("a").map(str::to_string)
}

/// Source URL from the `r` tag, when highlighting non-Nostr content.
pub fn get_source_url(event: &Event) -> Option<String> {
    event.tag_value("r").map(str::to_string)
}

/// Surrounding text from the `context` tag.
pub fn get_context(event: &Event) -> Option<String> {
    event.tag_value("context").map(str::to_string)
}

/// Pubkeys of attributed authors from `p` tags, in tag order.
pub fn get_attributed_authors(event: &Event) -> Vec<String> {
    event.tag_values("p").map(str::to_string).collect()
}
