//! The primitive crypto providers spec §1/§6 treat as external collaborators
//! (`original_source/include/uweave/provider/crypto.h`): a single AES-128
//! block operation, incremental SHA-256, and a CSPRNG. Everything else in
//! this crate (CMAC, EAX, HMAC, HKDF, SPAKE2) is built on top of these
//! traits so the device core never hard-codes a specific crypto backend.

use weave_common::status::{Result, Status};

/// A single AES-128 ECB block operation. Implementations must support
/// encrypting in place (`plaintext` and `ciphertext` pointing at the same
/// memory), matching `uwp_crypto_aes128_ecb_encrypt`'s contract.
pub trait BlockCipher128 {
    fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]);
}

/// Incremental SHA-256, mirroring `UwpCryptoSha256State`.
pub trait Sha256 {
    type State: Default;

    fn init() -> Self::State {
        Self::State::default()
    }
    fn update(state: &mut Self::State, data: &[u8]);
    fn finalize(state: Self::State) -> [u8; 32];

    fn digest(data: &[u8]) -> [u8; 32] {
        let mut state = Self::init();
        Self::update(&mut state, data);
        Self::finalize(state)
    }
}

/// A cryptographically secure random number source.
pub trait Csprng {
    /// Fills `out` with random bytes. Returns `Status::CryptoRandomNumberFailure`
    /// if the entropy source is unavailable, matching `uwp_crypto_getrandom`'s
    /// boolean-failure contract.
    fn fill(&self, out: &mut [u8]) -> Result<()>;

    fn random_array<const N: usize>(&self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }
}

/// Reference implementations of the three provider traits backed by real
/// host-side crypto crates (`aes`, `sha2`, the OS RNG via `rand`). Used by
/// tests and by any host that has no special secure-element requirements.
pub mod host {
    use super::*;
    use aes::cipher::{BlockEncrypt, KeyInit};
    use aes::Aes128;
    use sha2::Digest;

    #[derive(Debug, Default, Clone, Copy)]
    pub struct HostBlockCipher;

    impl BlockCipher128 for HostBlockCipher {
        fn encrypt_block(&self, key: &[u8; 16], block: &mut [u8; 16]) {
            let cipher = Aes128::new_from_slice(key).expect("16-byte key");
            let mut generic = aes::cipher::generic_array::GenericArray::clone_from_slice(block);
            cipher.encrypt_block(&mut generic);
            block.copy_from_slice(generic.as_slice());
        }
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct HostSha256;

    impl Sha256 for HostSha256 {
        type State = sha2::Sha256;

        fn update(state: &mut Self::State, data: &[u8]) {
            Digest::update(state, data);
        }

        fn finalize(state: Self::State) -> [u8; 32] {
            state.finalize().into()
        }
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct HostCsprng;

    impl Csprng for HostCsprng {
        fn fill(&self, out: &mut [u8]) -> Result<()> {
            use rand::RngCore;
            rand::rngs::OsRng.try_fill_bytes(out).map_err(|_| Status::CryptoRandomNumberFailure)
        }
    }
}
