//! Convenience constructors for the two token kinds the device core mints
//! directly: a fresh Server Authentication Token and a fresh Client
//! Authorization Token.
//!
//! Mirrors `uw_macaroon_mint_server_authentication_token_` and
//! `uw_macaroon_mint_client_authorization_token_` from
//! `original_source/src/macaroon_helpers.c`.

use weave_common::status::Result;
use weave_crypto::providers::BlockCipher128;

use crate::caveat::{Caveat, ServiceId};
use crate::mint::Macaroon;

/// Mints a fresh SAT: an `SATv1` caveat (optionally carrying `token_str`)
/// followed by a `Nonce` caveat, matching `UW_MACAROON_INIT_DELEGATION_NONCE_SIZE`
/// (8 bytes) from the original.
pub fn mint_sat<C: BlockCipher128>(
    cipher: &C,
    root_key: &[u8; 16],
    token_str: &[u8],
    nonce: [u8; 8],
) -> Result<Macaroon> {
    Macaroon::mint(
        cipher,
        root_key,
        vec![
            Caveat::ServerAuthenticationTokenV1(token_str.to_vec()),
            Caveat::Nonce(nonce.to_vec()),
        ],
    )
}

/// Mints a fresh CAT: a `CATv1` caveat, a `DelegationTimestamp` caveat, and
/// a `DelegateeService` caveat, matching
/// `uw_macaroon_mint_client_authorization_token_`.
pub fn mint_cat<C: BlockCipher128>(
    cipher: &C,
    root_key: &[u8; 16],
    token_str: &[u8],
    current_time_j2000: u32,
    service_id: ServiceId,
) -> Result<Macaroon> {
    Macaroon::mint(
        cipher,
        root_key,
        vec![
            Caveat::ClientAuthorizationTokenV1(token_str.to_vec()),
            Caveat::DelegationTimestamp(current_time_j2000),
            Caveat::DelegateeService(service_id),
        ],
    )
}
