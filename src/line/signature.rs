//! Webhook signature verification.
//!
//! LINE signs each webhook body with HMAC-SHA256 keyed by the channel
//! secret and sends the Base64 digest in the `x-line-signature` header.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the Base64 signature for a webhook body. `None` only when
/// the MAC rejects the key, which HMAC never does.
#[must_use]
pub fn sign(channel_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verifies a webhook signature against the channel secret.
///
/// The comparison runs in constant time via the MAC itself.
#[must_use]
pub fn verify(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
