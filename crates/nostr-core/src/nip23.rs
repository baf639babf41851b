//! NIP-23: Long-form Content
//!
//! Long-form articles are addressable events of kind 30023 (drafts use
//! 30024). The markdown body lives in `content`; article metadata lives in
//! tags:
//!
//! ```json
//! ["d", "<slug>"]
//! ["title", "<title>"]
//! ["summary", "<abstract>"]
//! ["image", "<header image url>"]
//! ["published_at", "<unix seconds of first publication>"]
//! ["t", "<topic>"]
//! ```
//!
//! The `d` tag is the identifier parameter: together with kind and pubkey it
//! forms the article's address `30023:<pubkey>:<slug>`, which stays stable
//! across edits even though every edit is a new event with a new id.

use crate::nip01::Event;
use thiserror::Error;

/// Kind for published long-form articles
pub const ARTICLE_KIND: u16 = 30023;

/// Kind for long-form drafts
pub const DRAFT_ARTICLE_KIND: u16 = 30024;

/// Errors that can occur reading article metadata.
#[derive(Debug, Error)]
pub enum Nip23Error {
    #[error("event kind {0} is not long-form content")]
    WrongKind(u16),

    #[error("missing required d tag")]
    MissingSlug,
}

/// Check if a kind is long-form content (published or draft).
pub fn is_article_kind(kind: u16) -> bool {
    kind == ARTICLE_KIND || kind == DRAFT_ARTICLE_KIND
}

/// Article metadata extracted from a kind 30023 event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Identifier from the `d` tag; the stable part of the article address
    pub slug: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    /// Unix seconds of first publication, per the `published_at` tag
    pub published_at: Option<u64>,
    /// Topics from `t` tags, in tag order
    pub topics: Vec<String>,
    /// Markdown body
    pub content: String,
}

impl Article {
    /// Extract article metadata from an event.
    ///
    /// Fails when the kind is not long-form content or the `d` tag is
    /// missing (an article without a slug has no address and cannot be
    /// referenced or replaced).
    pub fn from_event(event: &Event) -> Result<Self, Nip23Error> {
        if !is_article_kind(event.kind) {
            return Err(Nip23Error::WrongKind(event.kind));
        }
        let slug = event
            .tag_value("d")
            .map(str::to_string)
            .ok_or(Nip23Error::MissingSlug)?;

        Ok(Article {
            slug,
            title: event.tag_value("title").map(str::to_string),
            summary: event.tag_value("summary").map(str::to_string),
            image: event.tag_value("image").map(str::to_string),
            published_at: event.tag_value("published_at").and_then(|v| v.parse().ok()),
            topics: event.tag_values("t").map(str::to_string).collect(),
            content: event.content.clone(),
        })
    }

    /// The article's address: `<kind>:<pubkey>:<slug>`.
    pub fn address(&self, kind: u16, pubkey: &str) -> String {
        format!("{}:{}:{}", kind, pubkey, self.slug)
    }
}
