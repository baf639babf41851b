//! NIP-57: Lightning Zaps
//!
//! A zap receipt (kind 9735) is published by a recipient's lightning wallet
//! service when an invoice created for a zap request (kind 9734) is paid.
//! The receipt's tags carry the payment evidence:
//!
//! ```json
//! ["p", "<zap recipient pubkey>"]
//! ["P", "<zap sender pubkey>"]
//! ["e", "<zapped event id>"]
//! ["a", "<zapped event address>"]
//! ["bolt11", "<invoice>"]
//! ["description", "<zap request event JSON>"]
//! ```
//!
//! The hydration pipeline projects receipts as generic index rows; the
//! getters here exist for the downstream invoice-reconciliation process that
//! consumes that stream.

use crate::nip01::Event;

/// Kind for zap requests
pub const ZAP_REQUEST_KIND: u16 = 9734;

/// Kind for zap receipts
pub const ZAP_RECEIPT_KIND: u16 = 9735;

/// Check if an event is a zap receipt.
pub fn is_zap_receipt(event: &Event) -> bool {
    event.kind == ZAP_RECEIPT_KIND
}

/// Zap recipient pubkey from the `p` tag.
pub fn get_recipient(event: &Event) -> Option<String> {
    event.tag_value("p").map(str::to_string)
}

/// Zap sender pubkey from the optional uppercase `P` tag.
pub fn get_sender(event: &Event) -> Option<String> {
    event.tag_value("P").map(str::to_string)
}

/// Zapped event id from the `e` tag, if the zap targeted an event.
pub fn get_zapped_event_id(event: &Event) -> Option<String> {
    event.tag_value("e").map(str::to_string)
}

/// Zapped event address from the `a` tag, if the zap targeted an
/// addressable event.
pub fn get_zapped_address(event: &Event) -> Option<String> {
    event.tag_value("a").map(str::to_string)
}

/// The paid bolt11 invoice from the `bolt11` tag.
pub fn get_bolt11(event: &Event) -> Option<String> {
    event.tag_value("bolt11").map(str::to_string)
}

/// Parse the embedded zap request from the receipt's `description` tag.
///
/// The description must contain the JSON of the original kind 9734 zap
/// request. Returns `None` when the tag is missing, unparseable, or not a
/// zap request.
pub fn parse_zap_request(receipt: &Event) -> Option<Event> {
    let description = receipt.tag_value("description")?;
    let request: Event = serde_json::from_str(description).ok()?;
    (request.kind == ZAP_REQUEST_KIND).then_some(request)
}

/// The zapped amount in millisatoshis, from the embedded zap request's
/// `amount` tag.
pub fn get_amount_msat(receipt: &Event) -> Option<u64> {
    let request = parse_zap_request(receipt)?;
    request.tag_value("amount").and_then(|v| v.parse().ok())
}
