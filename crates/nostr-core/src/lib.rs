//! Nostr protocol primitives for the hydration pipeline.
//!
//! This crate provides:
//! - NIP-01: Basic protocol (events, id hashing, signing, verification)
//! - NIP-22: Comment (root/parent tag conventions)
//! - NIP-23: Long-form Content (articles)
//! - NIP-57: Lightning Zaps (zap receipt parsing)
//! - NIP-84: Highlights
//! - NIP-94: File Metadata
//!
//! Everything here is pure and side-effect free: events come in over the
//! wire, get hashed and verified, and the per-NIP modules read structured
//! metadata out of their tags. Nothing in this crate touches the network or
//! the store.

mod nip01;
mod nip22;
mod nip23;
mod nip57;
mod nip84;
mod nip94;

// NIP-01: Basic protocol
pub use nip01::{
    Event, EventTemplate, KIND_METADATA, KIND_SHORT_TEXT_NOTE, KindClassification, Nip01Error,
    UnsignedEvent, classify_kind, finalize_event, generate_secret_key, get_event_hash,
    get_public_key_hex, is_addressable_kind, is_ephemeral_kind, is_regular_kind,
    is_replaceable_kind, serialize_event, validate_event, verify_event,
};

// NIP-22: Comment
pub use nip22::{
    COMMENT_KIND, get_parent_address, get_parent_event_id, get_parent_kind, get_parent_pubkey,
    get_root_address, get_root_event_id, get_root_kind, get_root_pubkey, is_comment,
};

// NIP-23: Long-form Content
pub use nip23::{ARTICLE_KIND, Article, DRAFT_ARTICLE_KIND, Nip23Error, is_article_kind};

// NIP-57: Lightning Zaps
pub use nip57::{
    ZAP_RECEIPT_KIND, ZAP_REQUEST_KIND, get_amount_msat, get_bolt11, get_recipient, get_sender,
    get_zapped_address, get_zapped_event_id, is_zap_receipt, parse_zap_request,
};

// NIP-84: Highlights
pub use nip84::{
    HIGHLIGHT_KIND, get_attributed_authors, get_context, get_source_address, get_source_event_id,
    get_source_url, is_highlight_kind,
};

// NIP-94: File Metadata
pub use nip94::{Dimensions, FILE_METADATA_KIND, FileMetadata, Nip94Error, is_file_metadata_kind};
