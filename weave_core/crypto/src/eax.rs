//! EAX authenticated encryption (Bellare/Rogaway/Wagner) over AES-128,
//! built from [`BlockCipher128`] and the CMAC of this crate. Ported from
//! `original_source/src/crypto_eax.c`'s three-CMAC construction (tweak 0 for
//! the nonce, tweak 1 for associated data, tweak 2 for ciphertext) rather
//! than pulling in a generic AEAD crate, since the channel's per-direction
//! counter nonces and truncated tags don't map onto a fixed-nonce-size AEAD
//! trait cleanly.

use crate::cmac::CmacState;
use crate::providers::BlockCipher128;
use crate::utils::constant_time_eq;
use weave_common::buffer::Buffer;
use weave_common::status::{Result, Status};

const BLOCK_SIZE: usize = 16;

fn increment_msb(buf: &mut [u8; BLOCK_SIZE]) {
    for byte in buf.iter_mut().rev() {
        if *byte < 0xFF {
            *byte += 1;
            return;
        }
        *byte = 0;
    }
}

fn xor_blocks(dst: &mut [u8], a: &[u8]) {
    for (d, a) in dst.iter_mut().zip(a.iter()) {
        *d ^= *a;
    }
}

/// CMAC of `data` under `key`, prefixed by a one-block tweak whose last byte
/// is `tweak` (the rest zero) — the "OMAC with tweak" trick EAX uses to
/// domain-separate its three CMAC calls under a single key.
fn tweaked_cmac<C: BlockCipher128>(
    cipher: &C,
    key: &[u8; BLOCK_SIZE],
    tweak: u8,
    data: &[u8],
) -> [u8; BLOCK_SIZE] {
    let mut prefix = [0u8; BLOCK_SIZE];
    prefix[BLOCK_SIZE - 1] = tweak;
    let mut state = CmacState::new(cipher, key);
    state.update(&prefix);
    state.update(data);
    state.finalize()
}

/// Applies the CTR keystream to `data` in place, advancing `ctr_block` by
/// one per 16-byte chunk processed (partial final chunk included).
fn apply_ctr<C: BlockCipher128>(cipher: &C, key: &[u8; BLOCK_SIZE], ctr_block: &mut [u8; BLOCK_SIZE], data: &mut [u8]) {
    let mut offset = 0;
    while offset < data.len() {
        let mut key_block = *ctr_block;
        cipher.encrypt_block(key, &mut key_block);
        increment_msb(ctr_block);

        let end = (offset + BLOCK_SIZE).min(data.len());
        xor_blocks(&mut data[offset..end], &key_block[..end - offset]);
        offset = end;
    }
}

/// Encrypts `buffer` in place and appends a `tag_length`-byte tag
/// (`tag_length <= 16`). Matches `uw_eax_encrypt_`'s contract: `nonce` must
/// be non-empty, and every call uses a fresh nonce under `key`.
pub fn encrypt<C: BlockCipher128>(
    cipher: &C,
    key: &[u8; BLOCK_SIZE],
    nonce: &[u8],
    ad: &[u8],
    tag_length: usize,
    buffer: &mut Buffer,
) -> Result<()> {
    if nonce.is_empty() || tag_length == 0 || tag_length > BLOCK_SIZE {
        return Err(Status::InvalidInput);
    }

    let ctr = tweaked_cmac(cipher, key, 0, nonce);
    let mut ad_nonce_mac = tweaked_cmac(cipher, key, 1, ad);
    xor_blocks(&mut ad_nonce_mac, &ctr);

    let plaintext_len = buffer.len();
    let mut ctr_block = ctr;
    apply_ctr(cipher, key, &mut ctr_block, &mut buffer.as_mut_vec()[..plaintext_len]);

    let mut tag = tweaked_cmac(cipher, key, 2, &buffer.as_bytes()[..plaintext_len]);
    xor_blocks(&mut tag, &ad_nonce_mac);

    buffer.append(&tag[..tag_length]).map_err(|_| Status::TooLong)
}

/// Verifies the trailing `tag_length`-byte tag and decrypts the remainder
/// of `buffer` in place, truncating away the tag on success. On a tag
/// mismatch the buffer is left untouched and `Status::VerificationFailed`
/// is returned.
pub fn decrypt<C: BlockCipher128>(
    cipher: &C,
    key: &[u8; BLOCK_SIZE],
    nonce: &[u8],
    ad: &[u8],
    tag_length: usize,
    buffer: &mut Buffer,
) -> Result<()> {
    if nonce.is_empty() || tag_length == 0 || tag_length > BLOCK_SIZE {
        return Err(Status::InvalidInput);
    }
    if buffer.len() < tag_length {
        return Err(Status::InvalidInput);
    }

    let ctr = tweaked_cmac(cipher, key, 0, nonce);
    let mut ad_nonce_mac = tweaked_cmac(cipher, key, 1, ad);
    xor_blocks(&mut ad_nonce_mac, &ctr);

    let ciphertext_len = buffer.len() - tag_length;
    let mut expected_tag = tweaked_cmac(cipher, key, 2, &buffer.as_bytes()[..ciphertext_len]);
    xor_blocks(&mut expected_tag, &ad_nonce_mac);

    if !constant_time_eq(&expected_tag[..tag_length], &buffer.as_bytes()[ciphertext_len..]) {
        return Err(Status::VerificationFailed);
    }

    let mut ctr_block = ctr;
    apply_ctr(cipher, key, &mut ctr_block, &mut buffer.as_mut_vec()[..ciphertext_len]);

    buffer.set_length(ciphertext_len).map_err(|_| Status::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::host::HostBlockCipher;
    use weave_common::buffer::Buffer;

    #[test]
    fn round_trips() {
        let key = [3u8; 16];
        let nonce = [1u8; 12];
        let ad = b"associated";

        let mut buf = Buffer::with_capacity(64);
        buf.append(b"hello, eax").unwrap();
        encrypt(&HostBlockCipher, &key, &nonce, ad, 8, &mut buf).unwrap();
        assert_eq!(buf.len(), b"hello, eax".len() + 8);

        decrypt(&HostBlockCipher, &key, &nonce, ad, 8, &mut buf).unwrap();
        assert_eq!(buf.as_bytes(), b"hello, eax");
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let key = [3u8; 16];
        let nonce = [1u8; 12];
        let mut buf = Buffer::with_capacity(64);
        buf.append(b"payload").unwrap();
        encrypt(&HostBlockCipher, &key, &nonce, b"", 8, &mut buf).unwrap();
        let last = buf.len() - 1;
        buf.as_mut_vec()[last] ^= 0xFF;
        assert!(decrypt(&HostBlockCipher, &key, &nonce, b"", 8, &mut buf).is_err());
    }

    #[test]
    fn wrong_associated_data_is_rejected() {
        let key = [5u8; 16];
        let nonce = [2u8; 12];
        let mut buf = Buffer::with_capacity(64);
        buf.append(b"payload").unwrap();
        encrypt(&HostBlockCipher, &key, &nonce, b"context-a", 8, &mut buf).unwrap();
        assert!(decrypt(&HostBlockCipher, &key, &nonce, b"context-b", 8, &mut buf).is_err());
    }
}
