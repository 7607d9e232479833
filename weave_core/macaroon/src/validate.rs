//! Macaroon validation: recompute the tag chain, then walk the caveats in
//! order against a [`Context`], narrowing scope and recording bindings.
//!
//! Mirrors `uw_macaroon_validate_` from `original_source/src/macaroon.c`.
//! Unknown caveat types are rejected — [`crate::caveat::Caveat::from_bytes`]
//! already does this at deserialization, so a `Macaroon` constructed via
//! [`crate::wire::decode_macaroon`] can never contain one.

use weave_common::status::{Result, Status};
use weave_crypto::cmac::cmac;
use weave_crypto::providers::BlockCipher128;
use weave_crypto::utils::constant_time_eq;

use crate::caveat::{Caveat, Expiration, Scope, ServiceId};
use crate::context::Context;
use crate::mint::Macaroon;

pub const MAX_NUM_DELEGATEES: usize = 10;

/// The kind of token a macaroon represents, set by seeing a
/// `ServerAuthenticationTokenV1`/`ClientAuthorizationTokenV1` caveat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ServerAuthenticationToken,
    ClientAuthorizationToken,
}

#[derive(Debug, Clone)]
pub struct DelegateeInfo {
    pub service_id: ServiceId,
}

/// The accumulated, narrowed view of a macaroon after its caveats have all
/// been applied. Mirrors `UwMacaroonValidationResult`.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub granted_scope: Scope,
    /// J2000 seconds; `None` means no expiration (spec.md §4.4).
    pub expiration_time: Option<u32>,
    pub app_commands_only: bool,
    pub lan_session_id: Option<Vec<u8>>,
    pub delegatees: Vec<DelegateeInfo>,
    pub token_kind: Option<TokenKind>,
    issued_at: Option<u32>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        ValidationResult {
            granted_scope: Scope::Owner,
            expiration_time: None,
            app_commands_only: false,
            lan_session_id: None,
            delegatees: Vec::new(),
            token_kind: None,
            issued_at: None,
        }
    }
}

impl ValidationResult {
    /// Expiration as Unix seconds, `None` if unbounded. J2000↔Unix
    /// conversion only ever happens at this API boundary (spec.md §9).
    pub fn expiration_unix(&self) -> Option<i64> {
        self.expiration_time
            .map(|t| weave_common::time::j2000_to_unix(t as i64))
    }
}

fn recompute_tag<C: BlockCipher128>(cipher: &C, root_key: &[u8; 16], caveats: &[Caveat]) -> [u8; 16] {
    let mut tag = *root_key;
    for caveat in caveats {
        tag = cmac(cipher, &tag, &caveat.to_bytes());
    }
    tag
}

/// Recomputes the macaroon's tag chain and interprets its caveats against
/// `context`. Fails closed: any tag mismatch, a binding caveat that
/// disagrees with `context`, or an expired timestamp yields
/// [`Status::VerificationFailed`].
pub fn validate<C: BlockCipher128>(
    macaroon: &Macaroon,
    cipher: &C,
    root_key: &[u8; 16],
    context: &Context,
) -> Result<ValidationResult> {
    let expected_tag = recompute_tag(cipher, root_key, &macaroon.caveats);
    if !constant_time_eq(&expected_tag, &macaroon.tag) {
        return Err(Status::VerificationFailed);
    }

    let mut result = ValidationResult::default();
    for caveat in &macaroon.caveats {
        match caveat {
            Caveat::Nonce(_) => {}
            Caveat::DelegationTimestamp(ts) => {
                result.issued_at = Some(*ts);
            }
            Caveat::Expiration(Expiration::Absolute(ts)) => {
                result.expiration_time = Some(*ts);
            }
            Caveat::Expiration(Expiration::Delta(delta)) => {
                let base = result.issued_at.unwrap_or(context.current_time_j2000);
                result.expiration_time = Some(base.saturating_add(*delta));
            }
            Caveat::Scope(scope) => {
                result.granted_scope = result.granted_scope.narrow(*scope);
            }
            Caveat::ServerAuthenticationTokenV1(_) => {
                result.token_kind = Some(TokenKind::ServerAuthenticationToken);
            }
            Caveat::ClientAuthorizationTokenV1(_) => {
                result.token_kind = Some(TokenKind::ClientAuthorizationToken);
            }
            Caveat::DelegateeService(service_id) => {
                if result.delegatees.len() >= MAX_NUM_DELEGATEES {
                    return Err(Status::VerificationFailed);
                }
                result.delegatees.push(DelegateeInfo {
                    service_id: *service_id,
                });
            }
            Caveat::AuthenticationChallenge(nonce) => {
                let Some(expected) = &context.auth_challenge else {
                    return Err(Status::VerificationFailed);
                };
                if !constant_time_eq(expected, nonce) {
                    return Err(Status::VerificationFailed);
                }
            }
            Caveat::AppCommandsOnly => {
                result.app_commands_only = true;
            }
            Caveat::LanSessionId(id) => {
                let Some(expected) = &context.lan_session_id else {
                    return Err(Status::VerificationFailed);
                };
                if !constant_time_eq(expected, id) {
                    return Err(Status::VerificationFailed);
                }
            }
        }
    }

    if let Some(expires) = result.expiration_time {
        if context.current_time_j2000 != 0
            && expires != 0
            && expires != u32::MAX
            && context.current_time_j2000 > expires
        {
            return Err(Status::VerificationFailed);
        }
    }

    Ok(result)
}

/// Convenience object wrapping a root key for repeated validation calls
/// (e.g. the dispatcher validating many incoming tokens against one of the
/// device's two persistent keys).
pub struct Validator<'a, C: BlockCipher128> {
    cipher: &'a C,
    root_key: [u8; 16],
}

impl<'a, C: BlockCipher128> Validator<'a, C> {
    pub fn new(cipher: &'a C, root_key: [u8; 16]) -> Self {
        Validator { cipher, root_key }
    }

    pub fn validate(&self, macaroon: &Macaroon, context: &Context) -> Result<ValidationResult> {
        validate(macaroon, self.cipher, &self.root_key, context)
    }
}
