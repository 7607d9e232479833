//! Derives fixed 16-byte AES keys from the larger key material this crate's
//! pairing layer produces, so they can feed [`weave_crypto::eax`] and
//! [`weave_macaroon::validate`] (both fixed to 16-byte keys).
//!
//! `original_source/src/crypto_spake.c` passes the raw 56-byte SPAKE2 shared
//! point straight into its (variable-length-keyed) HMAC-based primitives; this
//! reimplementation instead reduces it once, the same way
//! `weave_dispatch::session` reduces a macaroon tag into a session key — see
//! DESIGN.md for this Open Question resolution.

use weave_crypto::providers::Sha256;

/// Truncates `SHA-256(material)` to 16 bytes.
pub fn derive_aes_key<S: Sha256>(material: &[u8]) -> [u8; 16] {
    let digest = S::digest(material);
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_crypto::providers::host::HostSha256;

    #[test]
    fn same_material_derives_the_same_key() {
        let a = derive_aes_key::<HostSha256>(b"shared secret");
        let b = derive_aes_key::<HostSha256>(b"shared secret");
        assert_eq!(a, b);
    }

    #[test]
    fn different_material_derives_different_keys() {
        let a = derive_aes_key::<HostSha256>(b"shared secret one");
        let b = derive_aes_key::<HostSha256>(b"shared secret two");
        assert_ne!(a, b);
    }
}
