//! HMAC-SHA256 signatures used by the gateway.
//!
//! Checkout callbacks sign `"{order_id}|{payment_id}"` with the API key
//! secret; webhooks sign the raw request body with the webhook secret. Both
//! are hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
#[must_use]
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature in constant time.
#[must_use]
pub fn verify(secret: &[u8], message: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// The message a checkout callback signs.
#[must_use]
pub fn payment_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"rzp_test_secret";

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_signature_round_trip() {
        let message = payment_message("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f");
        let signature = sign(SECRET, message.as_bytes());
        assert!(verify(SECRET, message.as_bytes(), &signature));
        assert!(verify(SECRET, message.as_bytes(), &signature.to_uppercase()));
    }

    #[test]
    fn test_tampered_payment_is_rejected() {
        let signature = sign(SECRET, payment_message("order_a", "pay_b").as_bytes());
        assert!(!verify(
            SECRET,
            payment_message("order_a", "pay_c").as_bytes(),
            &signature
        ));
        assert!(!verify(
            b"other",
            payment_message("order_a", "pay_b").as_bytes(),
            &signature
        ));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(!verify(SECRET, b"body", "not-hex"));
        assert!(!verify(SECRET, b"body", ""));
        assert!(!verify(SECRET, b"body", "abcd"));
    }
}
