//! NIP-94: File Metadata
//!
//! Kind 1063 events describe a file hosted elsewhere. The tags carry
//! everything a client needs to fetch and verify it:
//!
//! ```json
//! ["url", "<download url>"]
//! ["m", "<mime type>"]
//! ["x", "<sha256 of the file>"]
//! ["size", "<bytes>"]
//! ["dim", "<width>x<height>"]
//! ["blurhash", "<blurhash>"]
//! ["thumb", "<thumbnail url>"]
//! ["alt", "<accessibility description>"]
//! ```

use crate::nip01::Event;
use thiserror::Error;

/// Kind for file metadata events
pub const FILE_METADATA_KIND: u16 = 1063;

/// Errors that can occur reading file metadata.
#[derive(Debug, Error)]
pub enum Nip94Error {
    #[error("event kind {0} is not file metadata")]
    WrongKind(u16),

    #[error("missing required url tag")]
    MissingUrl,

    #[error("invalid dim tag: {0}")]
    InvalidDimensions(String),
}

/// Check if a kind is file metadata.
pub fn is_file_metadata_kind(kind: u16) -> bool {
    kind == FILE_METADATA_KIND
}

/// Image or video dimensions from a `dim` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Parse the `<width>x<height>` tag format.
    pub fn parse(value: &str) -> Result<Self, Nip94Error> {
        let (w, h) = value
            .split_once('x')
            .ok_or_else(|| Nip94Error::InvalidDimensions(value.to_string()))?;
        let width = w
            .parse()
            .map_err(|_| Nip94Error::InvalidDimensions(value.to_string()))?;
        let height = h
            .parse()
            .map_err(|_| Nip94Error::InvalidDimensions(value.to_string()))?;
        Ok(Dimensions { width, height })
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// File metadata extracted from a kind 1063 event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub url: String,
    pub mime_type: Option<String>,
    /// sha256 of the file contents, lowercase hex
    pub sha256: Option<String>,
    pub size: Option<u64>,
    pub dimensions: Option<Dimensions>,
    pub blurhash: Option<String>,
    pub thumb: Option<String>,
    pub alt: Option<String>,
    /// Caption or description from the event content
    pub caption: String,
}

impl FileMetadata {
    /// Extract file metadata from an event.
    ///
    /// The `url` tag is required; everything else is optional. A malformed
    /// `dim` tag is treated as absent rather than failing the whole event.
    pub fn from_event(event: &Event) -> Result<Self, Nip94Error> {
        if !is_file_metadata_kind(event.kind) {
            return Err(Nip94Error::WrongKind(event.kind));
        }
        let url = event
            .tag_value("url")
            .map(str::to_string)
            .ok_or(Nip94Error::MissingUrl)?;

        Ok(FileMetadata {
            url,
            mime_type: event.tag_value("m").map(str::to_string),
            sha256: event.tag_value("x").map(str::to_string),
            size: event.tag_value("size").and_then(|v| v.parse().ok()),
            dimensions: event.tag_value("dim").and_then(|v| Dimensions::parse(v).ok()),
            blurhash: event.tag_value("blurhash").map(str::to_string),
            thumb: event.tag_value("thumb").map(str::to_string),
            alt: event.tag_value("alt").map(str::to_string),
            caption: event.content.clone(),
        })
    }
}
