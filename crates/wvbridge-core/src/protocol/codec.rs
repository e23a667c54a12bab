//! Envelope codec.
//!
//! - Envelope <-> JSON text (single object for host -> guest pushes, array
//!   for guest -> host batches)
//! - JSON text <-> body of a single-quoted script string literal, so a pushed
//!   envelope can be embedded in an injected expression

use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::protocol::envelope::Envelope;

pub fn encode(env: &Envelope) -> Result<String> {
    serde_json::to_string(env)
        .map_err(|e| BridgeError::Internal(format!("json encode failed: {e}")))
}

pub fn encode_batch(envs: &[Envelope]) -> Result<String> {
    serde_json::to_string(envs)
        .map_err(|e| BridgeError::Internal(format!("json encode failed: {e}")))
}

pub fn decode(s: &str) -> Result<Envelope> {
    serde_json::from_str(s)
        .map_err(|e| BridgeError::MalformedEnvelope(format!("invalid envelope json: {e}")))
}

/// Decode a guest -> host batch, preserving order. Fails if any element
/// is malformed; see `decode_batch_each` to keep the good ones.
pub fn decode_batch(s: &str) -> Result<Vec<Envelope>> {
    decode_batch_each(s)?.into_iter().collect()
}

/// Decode a batch element by element.
///
/// Only a batch that is not a JSON array fails as a whole. Each element
/// decodes on its own, so one bad element names its index and leaves its
/// neighbours intact.
pub fn decode_batch_each(s: &str) -> Result<Vec<Result<Envelope>>> {
    let items: Vec<Value> = serde_json::from_str(s)
        .map_err(|e| BridgeError::MalformedEnvelope(format!("invalid batch json: {e}")))?;
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value(v).map_err(|e| {
                BridgeError::MalformedEnvelope(format!("invalid envelope at index {i}: {e}"))
            })
        })
        .collect())
}

/// Encode an envelope for embedding in a single-quoted script literal.
pub fn encode_for_guest(env: &Envelope) -> Result<String> {
    encode(env).map(|json| escape_script_literal(&json))
}

/// Escape text for a single-quoted script string literal.
///
/// Backslash, `"`, `'`, `\n`, `\r`, `\f`, U+2028 and U+2029 become their
/// escape forms. Single pass, so output matches replacing them in that order
/// with backslash first.
pub fn escape_script_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{000C}' => out.push_str("\\f"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_script_literal`], with the escape rules a script
/// engine applies to a string literal body.
pub fn unescape_script_literal(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err(BridgeError::MalformedEnvelope(
                "dangling escape in script literal".into(),
            ));
        };
        match esc {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\u{000C}'),
            't' => out.push('\t'),
            'b' => out.push('\u{0008}'),
            'v' => out.push('\u{000B}'),
            '0' => out.push('\0'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        BridgeError::MalformedEnvelope(format!("bad \\u escape: {hex}"))
                    })?;
                out.push(code);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}
