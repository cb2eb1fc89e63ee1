//! Checkout signature verification.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 keyed by
//! the account's key secret and hands the hex digest to the browser. A
//! client that cannot produce the same digest did not complete checkout.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::SignatureError;

/// Compute the hex signature for an order/payment pair.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the key cannot seed the MAC.
pub fn compute_signature(
    key_secret: &SecretString,
    order_id: &str,
    payment_id: &str,
) -> Result<String, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key_secret.expose_secret().as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature supplied by the client.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` unless `signature` equals the computed
/// digest exactly.
pub fn verify_signature(
    key_secret: &SecretString,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let expected = compute_signature(key_secret, order_id, payment_id)?;

    if !constant_time_compare(&expected, signature) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test_key_secret".to_string())
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_signature_matches_reference_hmac() {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"test_key_secret").unwrap();
        mac.update(b"order_ABC|pay_XYZ");
        let reference = hex::encode(mac.finalize().into_bytes());

        let signature = compute_signature(&secret(), "order_ABC", "pay_XYZ").unwrap();
        assert_eq!(signature, reference);
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_valid_signature_verifies() {
        let signature = compute_signature(&secret(), "order_ABC", "pay_XYZ").unwrap();
        assert!(verify_signature(&secret(), "order_ABC", "pay_XYZ", &signature).is_ok());
    }

    #[test]
    fn test_verification_is_deterministic() {
        let signature = compute_signature(&secret(), "order_ABC", "pay_XYZ").unwrap();
        for _ in 0..10 {
            assert!(verify_signature(&secret(), "order_ABC", "pay_XYZ", &signature).is_ok());
            assert_eq!(
                verify_signature(&secret(), "order_ABC", "pay_XYZ", "deadbeef"),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn test_tampered_inputs_are_rejected() {
        let signature = compute_signature(&secret(), "order_ABC", "pay_XYZ").unwrap();

        // Swapped ids
        assert_eq!(
            verify_signature(&secret(), "pay_XYZ", "order_ABC", &signature),
            Err(SignatureError::Mismatch)
        );
        // Different payment
        assert_eq!(
            verify_signature(&secret(), "order_ABC", "pay_OTHER", &signature),
            Err(SignatureError::Mismatch)
        );
        // Different key
        let other = SecretString::from("another_secret".to_string());
        assert_eq!(
            verify_signature(&other, "order_ABC", "pay_XYZ", &signature),
            Err(SignatureError::Mismatch)
        );
        // Case matters
        assert_eq!(
            verify_signature(&secret(), "order_ABC", "pay_XYZ", &signature.to_uppercase()),
            Err(SignatureError::Mismatch)
        );
        // Empty
        assert_eq!(
            verify_signature(&secret(), "order_ABC", "pay_XYZ", ""),
            Err(SignatureError::Mismatch)
        );
    }
}
