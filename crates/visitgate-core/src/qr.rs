//! QR token lookup.
//!
//! A QR token is an identity assertion, not a probabilistic match: the token
//! either names exactly one visitor or it names none.

use crate::types::VisitorRecord;

/// Find the single visitor holding `token`.
///
/// Returns `None` for an empty token, an unknown token, or a token held by
/// more than one record (the store is expected to keep tokens unique).
pub fn verify_by_qr<'a>(token: &str, candidates: &'a [VisitorRecord]) -> Option<&'a VisitorRecord> {
    if token.is_empty() {
        return None;
    }

    let mut holders = candidates
        .iter()
        .filter(|v| v.qr_token.as_deref() == Some(token));

    let first = holders.next()?;
    if holders.next().is_some() {
        tracing::warn!(token, "QR token held by more than one visitor; refusing to pick one");
        return None;
    }
    Some(first)
}
