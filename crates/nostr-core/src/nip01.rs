//! NIP-01: Basic protocol flow description.
//!
//! The event is the unit of data interchange: immutable once signed,
//! content-addressed by the sha256 of its canonical serialization, and
//! authenticated by a Schnorr signature over that id. Events from relays are
//! untrusted until [`verify_event`] passes; anything that fails verification
//! must never reach persistence.

use bitcoin::hashes::{Hash, sha256};
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::{Keypair, Message, SecretKey, XOnlyPublicKey, schnorr};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during NIP-01 operations.
#[derive(Debug, Error)]
pub enum Nip01Error {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("verification error: {0}")]
    Verification(String),
}

/// A signed Nostr event as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 32-byte lowercase hex sha256 of the serialized event data
    pub id: String,
    /// 32-byte lowercase hex x-only public key of the author
    pub pubkey: String,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Event kind (integer between 0 and 65535)
    pub kind: u16,
    /// Array of arrays of strings; the first element of each tag is its name
    pub tags: Vec<Vec<String>>,
    /// Arbitrary string content
    pub content: String,
    /// 64-byte lowercase hex Schnorr signature over the id
    pub sig: String,
}

impl Event {
    /// First value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// All values of tags named `name`, in tag order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1))
            .map(String::as_str)
    }
}

/// The signable portion of an event (everything but id and sig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// A template for creating events; the pubkey is derived from the signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

/// Event kind classification according to NIP-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClassification {
    /// Events expected to be stored by relays
    Regular,
    /// Only the latest event per pubkey+kind is stored
    Replaceable,
    /// Not expected to be stored by relays
    Ephemeral,
    /// Only the latest event per pubkey+kind+d-tag is stored
    Addressable,
    /// Unknown classification
    Unknown,
}

pub const KIND_METADATA: u16 = 0;
pub const KIND_SHORT_TEXT_NOTE: u16 = 1;

/// Generate a random 32-byte secret key.
pub fn generate_secret_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Derive the x-only public key (hex) from a secret key.
pub fn get_public_key_hex(secret_key: &[u8; 32]) -> Result<String, Nip01Error> {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(secret_key).map_err(|e| Nip01Error::Signing(e.to_string()))?;
    let (xonly, _parity) = sk.x_only_public_key(&secp);
    Ok(hex::encode(xonly.serialize()))
}

/// Serialize an unsigned event for hashing.
///
/// Canonical format: the compact JSON array
/// `[0, pubkey, created_at, kind, tags, content]`.
pub fn serialize_event(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    if !is_hex_of_len(&event.pubkey, 64) {
        return Err(Nip01Error::InvalidEvent(
            "pubkey must be 64 lowercase hex characters".to_string(),
        ));
    }

    serde_json::to_string(&(
        0,
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    ))
    .map_err(|e| Nip01Error::Serialization(e.to_string()))
}

/// Compute the event id: hex(sha256(canonical serialization)).
///
/// Deterministic: identical input fields always yield the identical id.
pub fn get_event_hash(event: &UnsignedEvent) -> Result<String, Nip01Error> {
    let serialized = serialize_event(event)?;
    let hash = sha256::Hash::hash(serialized.as_bytes());
    Ok(hex::encode(hash.as_byte_array()))
}

/// Validate the hex shape of a signed event (id, pubkey, sig lengths).
///
/// This is a structural check only; it does not verify the hash or the
/// signature. Use [`verify_event`] for that.
pub fn validate_event(event: &Event) -> bool {
    is_hex_of_len(&event.id, 64) && is_hex_of_len(&event.pubkey, 64) && is_hex_of_len(&event.sig, 128)
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len
        && s.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Sign an event template with a secret key, producing a complete signed event.
pub fn finalize_event(
    template: &EventTemplate,
    secret_key: &[u8; 32],
) -> Result<Event, Nip01Error> {
    let secp = Secp256k1::new();

    let sk = SecretKey::from_slice(secret_key).map_err(|e| Nip01Error::Signing(e.to_string()))?;
    let (xonly_pk, _parity) = sk.x_only_public_key(&secp);
    let pubkey = hex::encode(xonly_pk.serialize());

    let unsigned = UnsignedEvent {
        pubkey: pubkey.clone(),
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags.clone(),
        content: template.content.clone(),
    };
    let id = get_event_hash(&unsigned)?;

    let id_bytes =
        hex::decode(&id).map_err(|e| Nip01Error::Signing(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| Nip01Error::Signing(format!("invalid message: {}", e)))?;

    let keypair = Keypair::from_secret_key(&secp, &sk);
    let sig = secp.sign_schnorr_no_aux_rand(&message, &keypair);

    Ok(Event {
        id,
        pubkey,
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags.clone(),
        content: template.content.clone(),
        sig: hex::encode(sig.serialize()),
    })
}

/// Verify an event's id and signature.
///
/// Recomputes the id from the event fields and compares it to the claimed
/// id, then verifies the Schnorr signature over the id against the author's
/// pubkey. Any mismatch yields `Ok(false)`; the event must then be treated
/// as untrusted and discarded.
pub fn verify_event(event: &Event) -> Result<bool, Nip01Error> {
    if !validate_event(event) {
        return Ok(false);
    }

    let unsigned = UnsignedEvent {
        pubkey: event.pubkey.clone(),
        created_at: event.created_at,
        kind: event.kind,
        tags: event.tags.clone(),
        content: event.content.clone(),
    };
    let computed_id = get_event_hash(&unsigned)?;
    if computed_id != event.id {
        return Ok(false);
    }

    let secp = Secp256k1::verification_only();

    let id_bytes = hex::decode(&event.id)
        .map_err(|e| Nip01Error::Verification(format!("invalid id hex: {}", e)))?;
    let message = Message::from_digest_slice(&id_bytes)
        .map_err(|e| Nip01Error::Verification(format!("invalid message: {}", e)))?;

    let sig_bytes = hex::decode(&event.sig)
        .map_err(|e| Nip01Error::Verification(format!("invalid sig hex: {}", e)))?;
    let sig = match schnorr::Signature::from_slice(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };

    let pubkey_bytes = hex::decode(&event.pubkey)
        .map_err(|e| Nip01Error::Verification(format!("invalid pubkey hex: {}", e)))?;
    let pubkey = match XOnlyPublicKey::from_slice(&pubkey_bytes) {
        Ok(pk) => pk,
        Err(_) => return Ok(false),
    };

    Ok(secp.verify_schnorr(&sig, &message, &pubkey).is_ok())
}

/// Classify an event kind according to NIP-01 rules.
pub fn classify_kind(kind: u16) -> KindClassification {
    let k = kind as u32;

    if (1000..10000).contains(&k) || (4..45).contains(&k) || k == 1 || k == 2 {
        return KindClassification::Regular;
    }
    if (10000..20000).contains(&k) || k == 0 || k == 3 {
        return KindClassification::Replaceable;
    }
    if (20000..30000).contains(&k) {
        return KindClassification::Ephemeral;
    }
    if (30000..40000).contains(&k) {
        return KindClassification::Addressable;
    }
    KindClassification::Unknown
}

pub fn is_regular_kind(kind: u16) -> bool {
    matches!(classify_kind(kind), KindClassification::Regular)
}

pub fn is_replaceable_kind(kind: u16) -> bool {
    matches!(classify_kind(kind), KindClassification::Replaceable)
}

pub fn is_ephemeral_kind(kind: u16) -> bool {
    matches!(classify_kind(kind), KindClassification::Ephemeral)
}

pub fn is_addressable_kind(kind: u16) -> bool {
    matches!(classify_kind(kind), KindClassification::Addressable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str =
        "d217c1ff2f8a65c3e3a1740db3b9f58b8c848bb45e26d00ed4714e4a0f4ceecf";

    fn test_private_key() -> [u8; 32] {
        let bytes = hex::decode(TEST_PRIVATE_KEY).unwrap();
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        key
    }

    fn signed_note(content: &str) -> Event {
        let template = EventTemplate {
            kind: KIND_SHORT_TEXT_NOTE,
            tags: vec![vec!["t".to_string(), "news".to_string()]],
            content: content.to_string(),
            created_at: 1_700_000_000,
        };
        finalize_event(&template, &test_private_key()).unwrap()
    }

    #[test]
    fn serialize_event_matches_canonical_form() {
        let public_key = get_public_key_hex(&test_private_key()).unwrap();
        let unsigned = UnsignedEvent {
            pubkey: public_key.clone(),
            created_at: 1617932115,
            kind: 1,
            tags: vec![],
            content: "Hello, world!".to_string(),
        };

        let serialized = serialize_event(&unsigned).unwrap();
        let expected = format!("[0,\"{}\",1617932115,1,[],\"Hello, world!\"]", public_key);
        assert_eq!(serialized, expected);
    }

    #[test]
    fn event_hash_is_deterministic() {
        let public_key = get_public_key_hex(&test_private_key()).unwrap();
        let unsigned = UnsignedEvent {
            pubkey: public_key,
            created_at: 1617932115,
            kind: 1,
            tags: vec![vec!["d".to_string(), "slug".to_string()]],
            content: "Hello".to_string(),
        };

        let first = get_event_hash(&unsigned).unwrap();
        for _ in 0..5 {
            assert_eq!(get_event_hash(&unsigned).unwrap(), first);
        }
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn finalize_then_verify_roundtrip() {
        let event = signed_note("hello");
        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        assert!(verify_event(&event).unwrap());
    }

    #[test]
    fn tampered_content_fails_verification() {
        let mut event = signed_note("original");
        event.content = "tampered".to_string();
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn tampered_tags_fail_verification() {
        let mut event = signed_note("hello");
        event.tags.push(vec!["t".to_string(), "injected".to_string()]);
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn tampered_created_at_fails_verification() {
        let mut event = signed_note("hello");
        event.created_at += 1;
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn zeroed_signature_fails_verification() {
        let mut event = signed_note("hello");
        event.sig = "0".repeat(128);
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn wrong_pubkey_fails_verification() {
        let other_key = generate_secret_key();
        let mut event = signed_note("hello");
        event.pubkey = get_public_key_hex(&other_key).unwrap();
        assert!(!verify_event(&event).unwrap());
    }

    #[test]
    fn malformed_hex_shapes_are_invalid() {
        let mut event = signed_note("hello");
        event.id = "not hex".to_string();
        assert!(!validate_event(&event));
        assert!(!verify_event(&event).unwrap());

        let mut event = signed_note("hello");
        event.pubkey = event.pubkey.to_uppercase();
        assert!(!validate_event(&event));
    }

    #[test]
    fn tag_value_returns_first_match() {
        let mut event = signed_note("hello");
        event.tags = vec![
            vec!["t".to_string(), "first".to_string()],
            vec!["t".to_string(), "second".to_string()],
            vec!["d".to_string()],
        ];
        assert_eq!(event.tag_value("t"), Some("first"));
        assert_eq!(event.tag_value("d"), None);
        assert_eq!(event.tag_value("missing"), None);
        let all: Vec<&str> = event.tag_values("t").collect();
        assert_eq!(all, vec!["first", "second"]);
    }

    #[test]
    fn json_roundtrip_preserves_verification() {
        let event = signed_note("roundtrip");
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
        assert!(verify_event(&back).unwrap());
    }

    #[test]
    fn kind_classification_ranges() {
        assert_eq!(classify_kind(1), KindClassification::Regular);
        assert_eq!(classify_kind(1063), KindClassification::Regular);
        assert_eq!(classify_kind(9735), KindClassification::Regular);
        assert_eq!(classify_kind(0), KindClassification::Replaceable);
        assert_eq!(classify_kind(20000), KindClassification::Ephemeral);
        assert_eq!(classify_kind(30023), KindClassification::Addressable);
        assert_eq!(classify_kind(50000), KindClassification::Unknown);
    }
}
