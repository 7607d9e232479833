//! Capability-token (macaroon-style) issuance and validation.
//!
//! A macaroon is a tag-chained HMAC-CMAC authenticated token with an
//! ordered list of typed caveats (spec.md §4.4). This crate mints, extends,
//! serializes, and validates them; it never interprets their caveats
//! outside of [`validate::validate`] — minting callers append caveats in
//! whatever order their use case needs (`original_source/src/macaroon.c`'s
//! `uw_macaroon_create_from_root_key_`/`uw_macaroon_extend_`).

pub mod caveat;
pub mod context;
pub mod helpers;
pub mod mint;
pub mod validate;
pub mod wire;

pub use caveat::{Caveat, Expiration, Scope, ServiceId};
pub use context::Context;
pub use mint::Macaroon;
pub use validate::{ValidationResult, Validator};

/// Length of the integrity tag, per `UW_MACAROON_MAC_LEN`.
pub const MAC_LEN: usize = 16;
