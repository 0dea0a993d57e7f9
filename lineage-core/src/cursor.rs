//! Cursor Pagination Codec
//!
//! Opaque, reversible position tokens for keyset-style listing. A cursor
//! is the base64 encoding of the underlying record id. The transform is a
//! plain text encoding, not a cryptographic one: it exists so callers page
//! through ordered results without depending on internal key formats, and
//! callers must treat the token as opaque.

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode a record id as an opaque cursor.
///
/// Round-trips any id string, including the empty string and ids with
/// punctuation or non-ASCII characters.
pub fn encode_cursor(id: &str) -> String {
    STANDARD.encode(id.as_bytes())
}

/// Decode a cursor back to the record id it encodes.
///
/// Malformed cursors (invalid base64, non-UTF-8 payload) are an input
/// error; unlike page sizes they cannot be clamped into validity.
pub fn decode_cursor(cursor: &str) -> CoreResult<String> {
    let bytes = STANDARD
        .decode(cursor.as_bytes())
        .map_err(|e| CoreError::InvalidCursor {
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| CoreError::InvalidCursor {
        reason: e.to_string(),
    })
}
