//! Domain records and kind-specific mapping.
//!
//! The stringly-typed tag arrays on the wire become typed records here, at
//! the projection boundary, and nowhere later. Each supported kind has a
//! pure mapping from (tags, content) to a typed record; every kind this
//! pipeline has no mapping for passes through as a [`GenericRecord`] with
//! its tags intact, so unknown event shapes survive round trips untouched.

use crate::error::ProjectError;
use nostr_core::{
    ARTICLE_KIND, Article, COMMENT_KIND, Event, FILE_METADATA_KIND, FileMetadata, HIGHLIGHT_KIND,
    get_parent_address, get_parent_event_id, get_parent_kind, get_parent_pubkey, get_root_address,
    get_root_event_id, get_root_kind, get_root_pubkey,
};

/// A long-form article (kind 30023).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub slug: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub published_at: Option<u64>,
    pub topics: Vec<String>,
    pub content: String,
}

/// A comment (kind 1111) with its root and parent references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub content: String,
    pub root_event_id: Option<String>,
    pub root_address: Option<String>,
    pub root_kind: Option<u16>,
    pub root_pubkey: Option<String>,
    pub parent_event_id: Option<String>,
    pub parent_address: Option<String>,
    pub parent_kind: Option<u16>,
    pub parent_pubkey: Option<String>,
}

/// A highlight (kind 9802).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRecord {
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
    /// The highlighted text
    pub content: String,
    pub context: Option<String>,
    pub source_event_id: Option<String>,
    pub source_address: Option<String>,
    pub source_url: Option<String>,
    pub attributed_authors: Vec<String>,
}

/// File metadata (kind 1063).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub event_id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub url: String,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub size: Option<u64>,
    /// `<width>x<height>`, kept in wire form
    pub dimensions: Option<String>,
    pub blurhash: Option<String>,
    pub alt: Option<String>,
    pub caption: String,
}

/// Any kind without a dedicated mapping, tags passed through opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericRecord {
    pub event_id: String,
    pub pubkey: String,
    pub kind: u16,
    pub created_at: u64,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// A projected domain record, keyed by event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRecord {
    Article(ArticleRecord),
    Comment(CommentRecord),
    Highlight(HighlightRecord),
    Media(MediaRecord),
    Generic(GenericRecord),
}

impl DomainRecord {
    /// Map an event into its domain record. Pure: no lookups, no I/O.
    ///
    /// Fails with [`ProjectError::InvalidEvent`] when a kind-specific
    /// required field is missing (an article without a slug, file metadata
    /// without a url).
    pub fn from_event(event: &Event) -> Result<DomainRecord, ProjectError> {
        match event.kind {
            ARTICLE_KIND => {
                let article = Article::from_event(event)
                    .map_err(|e| ProjectError::InvalidEvent(e.to_string()))?;
                Ok(DomainRecord::Article(ArticleRecord {
                    event_id: event.id.clone(),
                    pubkey: event.pubkey.clone(),
                    created_at: event.created_at,
                    slug: article.slug,
                    title: article.title,
                    summary: article.summary,
                    image: article.image,
                    published_at: article.published_at,
                    topics: article.topics,
                    content: article.content,
                }))
            }
            COMMENT_KIND => Ok(DomainRecord::Comment(CommentRecord {
                event_id: event.id.clone(),
                pubkey: event.pubkey.clone(),
                created_at: event.created_at,
                content: event.content.clone(),
                root_event_id: get_root_event_id(event),
                root_address: get_root_address(event),
                root_kind: get_root_kind(event),
                root_pubkey: get_root_pubkey(event),
                parent_event_id: get_parent_event_id(event),
                parent_address: get_parent_address(event),
                parent_kind: get_parent_kind(event),
                parent_pubkey: get_parent_pubkey(event),
            })),
            HIGHLIGHT_KIND => Ok(DomainRecord::Highlight(HighlightRecord {
                event_id: event.id.clone(),
                pubkey: event.pubkey.clone(),
                created_at: event.created_at,
                content: event.content.clone(),
                context: nostr_core::get_context(event),
                source_event_id: nostr_core::get_source_event_id(event),
                source_address: nostr_core::get_source_address(event),
                source_url: nostr_core::get_source_url(event),
                attributed_authors: nostr_core::get_attributed_authors(event),
            })),
            FILE_METADATA_KIND => {
                let meta = FileMetadata::from_event(event)
                    .map_err(|e| ProjectError::InvalidEvent(e.to_string()))?;
                Ok(DomainRecord::Media(MediaRecord {
                    event_id: event.id.clone(),
                    pubkey: event.pubkey.clone(),
                    created_at: event.created_at,
                    url: meta.url,
                    mime_type: meta.mime_type,
                    sha256: meta.sha256,
                    size: meta.size,
                    dimensions: meta.dimensions.map(|d| d.to_string()),
                    blurhash: meta.blurhash,
                    alt: meta.alt,
                    caption: meta.caption,
                }))
            }
            _ => Ok(DomainRecord::Generic(GenericRecord {
                event_id: event.id.clone(),
                pubkey: event.pubkey.clone(),
                kind: event.kind,
                created_at: event.created_at,
                tags: event.tags.clone(),
                content: event.content.clone(),
            })),
        }
    }

    /// The event id this record is keyed by.
    pub fn event_id(&self) -> &str {
        match self {
            DomainRecord::Article(r) => &r.event_id,
            DomainRecord::Comment(r) => &r.event_id,
            DomainRecord::Highlight(r) => &r.event_id,
            DomainRecord::Media(r) => &r.event_id,
            DomainRecord::Generic(r) => &r.event_id,
        }
    }

    /// Short name of the record type, for logs and summaries.
    pub fn type_name(&self) -> &'static str {
        match self {
            DomainRecord::Article(_) => "article",
            DomainRecord::Comment(_) => "comment",
            DomainRecord::Highlight(_) => "highlight",
            DomainRecord::Media(_) => "media",
            DomainRecord::Generic(_) => "generic",
        }
    }
}
