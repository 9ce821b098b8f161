use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::SubscriptionError;

/// Decode a VAPID public key from its transport encoding.
///
/// Accepts the URL-safe or standard base64 alphabet, with or without padding.
pub fn decode_application_server_key(encoded: &str) -> Result<Vec<u8>, SubscriptionError> {
    let normalized: String = encoded
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return Err(SubscriptionError::InvalidKey("key is empty".to_string()));
    }

    URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|e| SubscriptionError::InvalidKey(e.to_string()))
}
