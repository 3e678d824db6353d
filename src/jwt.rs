//! Structural JWT checks. Nothing here verifies a signature.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;

/// Minimum length of each dot-separated segment.
const MIN_SEGMENT_LEN: usize = 10;

/// Lenient base64url decoder: padding optional, trailing bits ignored.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn is_base64url_segment(part: &str) -> bool {
    part.len() >= MIN_SEGMENT_LEN
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Three dot-separated base64url segments of at least 10 characters each.
pub fn is_likely_jwt(token: &str) -> bool {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return false;
    }
    let parts: Vec<&str> = trimmed.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| is_base64url_segment(p))
}

/// Decode the middle segment of a JWT-shaped token as JSON.
pub fn decode_payload(token: &str) -> Option<Value> {
    let token = token.trim();
    if !is_likely_jwt(token) {
        return None;
    }
    let payload = token.split('.').nth(1)?;
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Customer id embedded in the token payload (`custId`, then `accountNo`).
///
/// Only accepted when the value is made entirely of digits.
pub fn customer_id_from_token(token: &str) -> Option<String> {
    let payload = decode_payload(token)?;
    let derived = ["custId", "accountNo"]
        .iter()
        .filter_map(|k| payload.get(*k))
        .find(|v| crate::record::is_truthy(v))?;
    let id = match derived {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}
