//! Webhook body signing: `X-Pulse-Signature: hex(HMAC-SHA256(secret, body))`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Pulse-Signature";

/// Hex-encoded HMAC-SHA256 digest of `body` keyed by `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let a = sign("shared-secret", b"{\"alert_id\":\"1\"}");
        let b = sign("shared-secret", b"{\"alert_id\":\"1\"}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = sign("secret-a", b"body");
        let b = sign("secret-b", b"body");
        assert_ne!(a, b);
    }
}
