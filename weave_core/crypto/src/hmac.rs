//! HMAC-SHA256, built on the [`Sha256`] provider rather than a fixed SHA-256
//! implementation, following `original_source/src/crypto_hmac.c`.

use crate::providers::Sha256;

const BLOCK_SIZE: usize = 64;
const DIGEST_LEN: usize = 32;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5C;

/// Computes `HMAC-SHA256(key, message)`, truncated to `output.len()` bytes
/// (`output.len() <= 32`). Multiple `messages` are hashed in sequence, as in
/// `uw_crypto_hmac_`'s scatter-gather message list — used so HKDF's expand
/// step can feed `context || counter` without concatenating into one buffer.
pub fn hmac_sha256<S: Sha256>(key: &[u8], messages: &[&[u8]], output: &mut [u8]) {
    assert!(!output.is_empty() && output.len() <= DIGEST_LEN);

    let mut key_block = [0u8; BLOCK_SIZE];
    if key.len() <= BLOCK_SIZE {
        key_block[..key.len()].copy_from_slice(key);
    } else {
        key_block[..DIGEST_LEN].copy_from_slice(&S::digest(key));
    }

    let mut ipad_block = key_block;
    for b in ipad_block.iter_mut() {
        *b ^= IPAD;
    }
    let mut inner = S::init();
    S::update(&mut inner, &ipad_block);
    for msg in messages {
        if !msg.is_empty() {
            S::update(&mut inner, msg);
        }
    }
    let inner_digest = S::finalize(inner);

    let mut opad_block = key_block;
    for b in opad_block.iter_mut() {
        *b ^= OPAD;
    }
    let mut outer = S::init();
    S::update(&mut outer, &opad_block);
    S::update(&mut outer, &inner_digest);
    let digest = S::finalize(outer);

    output.copy_from_slice(&digest[..output.len()]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::host::HostSha256;

    // RFC 4231 test case 1.
    #[test]
    fn rfc4231_case_1() {
        let key = [0x0bu8; 20];
        let data = b"Hi There";
        let mut out = [0u8; 32];
        hmac_sha256::<HostSha256>(&key, &[data], &mut out);
        let expected = [
            0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b,
            0xf1, 0x2b, 0x88, 0x1d, 0xc2, 0x00, 0xc9, 0x83, 0x3d, 0xa7, 0x26, 0xe9, 0x37, 0x6c,
            0x2e, 0x32, 0xcf, 0xf7,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn multiple_messages_match_concatenation() {
        let key = b"a-test-key";
        let mut a = [0u8; 32];
        hmac_sha256::<HostSha256>(key, &[b"hello, ", b"world"], &mut a);
        let mut b = [0u8; 32];
        hmac_sha256::<HostSha256>(key, &[b"hello, world"], &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn truncated_output_is_a_prefix() {
        let key = b"key";
        let mut full = [0u8; 32];
        hmac_sha256::<HostSha256>(key, &[b"msg"], &mut full);
        let mut short = [0u8; 16];
        hmac_sha256::<HostSha256>(key, &[b"msg"], &mut short);
        assert_eq!(&full[..16], &short[..]);
    }
}
