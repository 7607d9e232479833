//! HKDF-SHA256, restricted to a 32-byte salt and a single 32-byte output
//! block, matching `original_source/src/crypto_hkdf.c` exactly (it only
//! ever needs one block of keying material, so it skips RFC 5869's general
//! multi-block expand loop).

use crate::hmac::hmac_sha256;
use crate::providers::Sha256;

const DIGEST_LEN: usize = 32;

/// Derives a 32-byte key from `key_material`, domain-separated by
/// `context_data`, using `salt` as the HMAC key for the extract step.
pub fn hkdf_sha256<S: Sha256>(
    key_material: &[u8],
    context_data: &[u8],
    salt: &[u8; DIGEST_LEN],
) -> [u8; DIGEST_LEN] {
    let mut prk = [0u8; DIGEST_LEN];
    hmac_sha256::<S>(salt, &[key_material], &mut prk);

    let mut output = [0u8; DIGEST_LEN];
    hmac_sha256::<S>(&prk, &[context_data, &[0x01]], &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::host::HostSha256;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [1u8; 32];
        let a = hkdf_sha256::<HostSha256>(b"secret", b"session-key", &salt);
        let b = hkdf_sha256::<HostSha256>(b"secret", b"session-key", &salt);
        assert_eq!(a, b);
    }

    #[test]
    fn context_changes_output() {
        let salt = [1u8; 32];
        let a = hkdf_sha256::<HostSha256>(b"secret", b"encrypt", &salt);
        let b = hkdf_sha256::<HostSha256>(b"secret", b"authenticate", &salt);
        assert_ne!(a, b);
    }

    #[test]
    fn salt_changes_output() {
        let a = hkdf_sha256::<HostSha256>(b"secret", b"context", &[1u8; 32]);
        let b = hkdf_sha256::<HostSha256>(b"secret", b"context", &[2u8; 32]);
        assert_ne!(a, b);
    }
}
