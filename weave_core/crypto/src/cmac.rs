//! AES-CMAC (NIST SP 800-38B / RFC 4493), built on top of [`BlockCipher128`]
//! rather than a fixed AES implementation, so the device can delegate the
//! single block operation to a hardware or secure-element provider while
//! this module supplies the mode construction itself — mirroring how
//! `original_source/src/crypto_cmac.c` sits directly on top of
//! `uwp_crypto_aes128_ecb_encrypt`.

use crate::providers::BlockCipher128;

const BLOCK_SIZE: usize = 16;
const RB: u8 = 0x87;

fn left_shift_one(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    let mut carry = 0u8;
    for i in (0..BLOCK_SIZE).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = block[i] >> 7;
    }
    out
}

fn double(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let msb_set = block[0] & 0x80 != 0;
    let mut out = left_shift_one(block);
    if msb_set {
        out[BLOCK_SIZE - 1] ^= RB;
    }
    out
}

fn xor_in_place(dst: &mut [u8; BLOCK_SIZE], src: &[u8; BLOCK_SIZE]) {
    for i in 0..BLOCK_SIZE {
        dst[i] ^= src[i];
    }
}

/// Incremental CMAC state. `key` is borrowed for the state's lifetime, as
/// in the original (`UwCmacState::key` is a raw pointer into caller storage).
pub struct CmacState<'a, C: BlockCipher128> {
    cipher: &'a C,
    key: [u8; BLOCK_SIZE],
    block: [u8; BLOCK_SIZE],
    k1: [u8; BLOCK_SIZE],
    k2: [u8; BLOCK_SIZE],
    partial: [u8; BLOCK_SIZE],
    partial_len: usize,
}

impl<'a, C: BlockCipher128> CmacState<'a, C> {
    pub fn new(cipher: &'a C, key: &[u8; BLOCK_SIZE]) -> Self {
        let mut k0 = [0u8; BLOCK_SIZE];
        cipher.encrypt_block(key, &mut k0);
        let k1 = double(&k0);
        let k2 = double(&k1);
        CmacState {
            cipher,
            key: *key,
            block: [0u8; BLOCK_SIZE],
            k1,
            k2,
            partial: [0u8; BLOCK_SIZE],
            partial_len: 0,
        }
    }

    pub fn reset(&mut self) {
        self.block = [0u8; BLOCK_SIZE];
        self.partial_len = 0;
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while self.partial_len + data.len() > BLOCK_SIZE {
            let delta = BLOCK_SIZE - self.partial_len;
            self.partial[self.partial_len..].copy_from_slice(&data[..delta]);
            xor_in_place(&mut self.block, &self.partial);
            let mut block = self.block;
            self.cipher.encrypt_block(&self.key, &mut block);
            self.block = block;
            data = &data[delta..];
            self.partial_len = 0;
        }
        if !data.is_empty() {
            self.partial[self.partial_len..self.partial_len + data.len()].copy_from_slice(data);
            self.partial_len += data.len();
        }
    }

    pub fn finalize(mut self) -> [u8; BLOCK_SIZE] {
        let mask = if self.partial_len < BLOCK_SIZE {
            self.partial[self.partial_len] = 0x80;
            for b in self.partial.iter_mut().skip(self.partial_len + 1) {
                *b = 0;
            }
            self.k2
        } else {
            self.k1
        };
        xor_in_place(&mut self.block, &mask);
        xor_in_place(&mut self.block, &self.partial);
        let mut mac = self.block;
        self.cipher.encrypt_block(&self.key, &mut mac);
        mac
    }
}

/// One-shot convenience wrapper.
pub fn cmac<C: BlockCipher128>(cipher: &C, key: &[u8; BLOCK_SIZE], data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut state = CmacState::new(cipher, key);
    state.update(data);
    state.finalize()
}
