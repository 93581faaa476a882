//! HMAC-SHA256 signature verification (spec.md §4.E step 2), grounded on the teacher's
//! constant-time secret comparison pattern.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes `hex(HMAC-SHA256(secret, body))` and compares it against `header_value`, which is
/// expected in the `sha256=<hex>` form. Uses a constant-time comparison so a partial-prefix
/// timing difference cannot leak the secret.
pub fn verify(body: &[u8], header_value: &str, secret: &str) -> bool {
    let Some(given_hex) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected_hex = hex::encode(expected);

    // Compare as bytes, not strings, so differing case in the header never short-circuits
    // length checks before the constant-time comparison runs.
    if expected_hex.len() != given_hex.len() {
        return false;
    }
    expected_hex.as_bytes().ct_eq(given_hex.as_bytes()).into()
}
