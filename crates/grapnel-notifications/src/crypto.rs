//! Webhook payload signing.
//!
//! The signed bytes are the canonical JSON encoding of the envelope: object
//! keys sorted at every level, no insignificant whitespace. The same bytes are
//! sent as the request body, so receivers can verify against the raw body.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::NotificationError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Grapnel-Signature";

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

// ---------------------------------------------------------------------------
// Canonical encoding
// ---------------------------------------------------------------------------

/// Encode `value` as compact JSON with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// HMAC-SHA256 signing
// ---------------------------------------------------------------------------

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String, NotificationError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| NotificationError::Signing(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Full header value: `sha256=<hex>`.
pub fn signature_header_value(secret: &str, body: &[u8]) -> Result<String, NotificationError> {
    Ok(format!("{SIGNATURE_PREFIX}{}", compute_signature(secret, body)?))
}

/// Verify a `sha256=<hex>` header value using constant-time comparison.
pub fn verify_signature(header_value: &str, secret: &str, body: &[u8]) -> bool {
    let Some(expected_hex) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    match compute_signature(secret, body) {
        Ok(computed) => constant_time_eq(expected_hex.as_bytes(), computed.as_bytes()),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
