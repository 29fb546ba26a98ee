//! Key fixtures and token helpers shared by unit tests.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub(crate) const RSA_PRIVATE_PEM: &str = include_str!("../tests/fixtures/rsa_private.pem");
pub(crate) const RSA_PUBLIC_PEM: &str = include_str!("../tests/fixtures/rsa_public.pem");
pub(crate) const EC384_PRIVATE_PEM: &str = include_str!("../tests/fixtures/ec384_private.pem");
pub(crate) const EC384_PUBLIC_PEM: &str = include_str!("../tests/fixtures/ec384_public.pem");

/// Order of the P-384 group, big-endian hex.
const P384_ORDER: &str = "ffffffffffffffffffffffffffffffffffffffffffffffffc7634d81f4372ddf581a0db248b0a77aecec196accc52973";

/// Rewrites an ES384 token's signature `(r, s)` as `(r, n - s)`.
///
/// The result is a different string carrying the same header and payload,
/// and it still verifies under the same public key.
pub(crate) fn negate_es384_signature(token: &str) -> String {
    let (signed, signature) = token.rsplit_once('.').unwrap();
    let mut sig = URL_SAFE_NO_PAD.decode(signature).unwrap();
    assert_eq!(sig.len(), 96, "ES384 signatures are r || s, 48 bytes each");

    let order = hex::decode(P384_ORDER).unwrap();
    let s = &mut sig[48..];
    let mut borrow = 0i16;
    for i in (0..48).rev() {
        let mut digit = i16::from(order[i]) - i16::from(s[i]) - borrow;
        borrow = 0;
        if digit < 0 {
            digit += 256;
            borrow = 1;
        }
        s[i] = digit as u8;
    }
    assert_eq!(borrow, 0);

    format!("{}.{}", signed, URL_SAFE_NO_PAD.encode(&sig))
}
