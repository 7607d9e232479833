//! Crypto primitives and modes for the device core: AES-CMAC, EAX AEAD,
//! HMAC/HKDF-SHA256, and SPAKE2 over NIST P-224, all built on the
//! [`providers`] traits so the core never hard-codes a backend.

pub mod cmac;
pub mod eax;
pub mod hkdf;
pub mod hmac;
pub mod providers;
pub mod spake2;
pub mod utils;

pub use providers::{BlockCipher128, Csprng, Sha256};
