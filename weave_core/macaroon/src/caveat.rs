//! Caveat types and their wire encoding.
//!
//! `original_source/src/macaroon_caveat.h` (not retrieved in full, but
//! referenced throughout `macaroon_helpers.c`/`macaroon.h`) types each
//! caveat by a small enum tag plus a type-specific payload. This
//! reimplementation keeps that shape: [`CaveatType`] is the tag,
//! [`Caveat`] pairs it with a typed payload, and [`Caveat::to_bytes`] gives
//! the flat byte representation that is both what gets CMAC'd into the tag
//! chain and what is stored inside the macaroon's CBOR byte-string array.

use weave_common::status::{Result, Status};

/// Scopes, ordered from most to least privileged — spec.md §4.4's Scope
/// caveat narrows toward the *least* privileged value seen along a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Scope {
    Owner = 0,
    Manager = 1,
    User = 2,
    Viewer = 3,
}

impl Scope {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Scope::Owner),
            1 => Ok(Scope::Manager),
            2 => Ok(Scope::User),
            3 => Ok(Scope::Viewer),
            _ => Err(Status::ValueInvalidInput),
        }
    }

    /// Narrower of `self` and `other` (higher ordinal = less privilege).
    pub fn narrow(self, other: Scope) -> Scope {
        self.max(other)
    }
}

/// `original_source/src/macaroon.h`'s `UwMacaroonCaveatCloudServiceId`:
/// which delegatee this token was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceId {
    NotCloudRegistered = 0,
    Weave = 1,
}

impl ServiceId {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(ServiceId::NotCloudRegistered),
            1 => Ok(ServiceId::Weave),
            _ => Err(Status::ValueInvalidInput),
        }
    }
}

/// An absolute (J2000 seconds) or relative (seconds from mint time)
/// expiration, per spec.md §4.4's Expiration caveat row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Absolute(u32),
    Delta(u32),
}

const TYPE_NONCE: u8 = 1;
const TYPE_DELEGATION_TIMESTAMP: u8 = 2;
const TYPE_EXPIRATION_ABSOLUTE: u8 = 3;
const TYPE_EXPIRATION_DELTA: u8 = 4;
const TYPE_SCOPE: u8 = 5;
const TYPE_SAT_V1: u8 = 6;
const TYPE_CAT_V1: u8 = 7;
const TYPE_DELEGATEE_SERVICE: u8 = 8;
const TYPE_AUTH_CHALLENGE: u8 = 9;
const TYPE_APP_COMMANDS_ONLY: u8 = 10;
const TYPE_LAN_SESSION_ID: u8 = 11;

/// One typed, ordered restriction appended to a macaroon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caveat {
    Nonce(Vec<u8>),
    DelegationTimestamp(u32),
    Expiration(Expiration),
    Scope(Scope),
    /// An optional opaque token string identifying this as a Server
    /// Authentication Token.
    ServerAuthenticationTokenV1(Vec<u8>),
    /// An optional opaque token string identifying this as a Client
    /// Authorization Token.
    ClientAuthorizationTokenV1(Vec<u8>),
    DelegateeService(ServiceId),
    AuthenticationChallenge([u8; 16]),
    AppCommandsOnly,
    LanSessionId(Vec<u8>),
}

impl Caveat {
    /// Flat `[type_byte, payload...]` encoding. Variable-length payloads
    /// (nonce, token strings, session id) are unambiguous here because each
    /// caveat is stored as its own length-prefixed byte string one level up
    /// (see `wire::encode_macaroon`) — no internal length prefix is needed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Caveat::Nonce(bytes) => {
                out.push(TYPE_NONCE);
                out.extend_from_slice(bytes);
            }
            Caveat::DelegationTimestamp(ts) => {
                out.push(TYPE_DELEGATION_TIMESTAMP);
                out.extend_from_slice(&ts.to_be_bytes());
            }
            Caveat::Expiration(Expiration::Absolute(ts)) => {
                out.push(TYPE_EXPIRATION_ABSOLUTE);
                out.extend_from_slice(&ts.to_be_bytes());
            }
            Caveat::Expiration(Expiration::Delta(delta)) => {
                out.push(TYPE_EXPIRATION_DELTA);
                out.extend_from_slice(&delta.to_be_bytes());
            }
            Caveat::Scope(scope) => {
                out.push(TYPE_SCOPE);
                out.push(*scope as u8);
            }
            Caveat::ServerAuthenticationTokenV1(token) => {
                out.push(TYPE_SAT_V1);
                out.extend_from_slice(token);
            }
            Caveat::ClientAuthorizationTokenV1(token) => {
                out.push(TYPE_CAT_V1);
                out.extend_from_slice(token);
            }
            Caveat::DelegateeService(id) => {
                out.push(TYPE_DELEGATEE_SERVICE);
                out.push(*id as u8);
            }
            Caveat::AuthenticationChallenge(nonce) => {
                out.push(TYPE_AUTH_CHALLENGE);
                out.extend_from_slice(nonce);
            }
            Caveat::AppCommandsOnly => {
                out.push(TYPE_APP_COMMANDS_ONLY);
            }
            Caveat::LanSessionId(id) => {
                out.push(TYPE_LAN_SESSION_ID);
                out.extend_from_slice(id);
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&ty, payload) = bytes.split_first().ok_or(Status::ValueInvalidInput)?;
        Ok(match ty {
            TYPE_NONCE => Caveat::Nonce(payload.to_vec()),
            TYPE_DELEGATION_TIMESTAMP => {
                Caveat::DelegationTimestamp(u32::from_be_bytes(
                    payload.try_into().map_err(|_| Status::ValueInvalidInput)?,
                ))
            }
            TYPE_EXPIRATION_ABSOLUTE => Caveat::Expiration(Expiration::Absolute(u32::from_be_bytes(
                payload.try_into().map_err(|_| Status::ValueInvalidInput)?,
            ))),
            TYPE_EXPIRATION_DELTA => Caveat::Expiration(Expiration::Delta(u32::from_be_bytes(
                payload.try_into().map_err(|_| Status::ValueInvalidInput)?,
            ))),
            TYPE_SCOPE => {
                let &[v] = payload else {
                    return Err(Status::ValueInvalidInput);
                };
                Caveat::Scope(Scope::from_u8(v)?)
            }
            TYPE_SAT_V1 => Caveat::ServerAuthenticationTokenV1(payload.to_vec()),
            TYPE_CAT_V1 => Caveat::ClientAuthorizationTokenV1(payload.to_vec()),
            TYPE_DELEGATEE_SERVICE => {
                let &[v] = payload else {
                    return Err(Status::ValueInvalidInput);
                };
                Caveat::DelegateeService(ServiceId::from_u8(v)?)
            }
            TYPE_AUTH_CHALLENGE => {
                Caveat::AuthenticationChallenge(payload.try_into().map_err(|_| Status::ValueInvalidInput)?)
            }
            TYPE_APP_COMMANDS_ONLY => {
                if !payload.is_empty() {
                    return Err(Status::ValueInvalidInput);
                }
                Caveat::AppCommandsOnly
            }
            TYPE_LAN_SESSION_ID => Caveat::LanSessionId(payload.to_vec()),
            _ => return Err(Status::ValueInvalidInput),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_narrows_to_least_privilege() {
        assert_eq!(Scope::Owner.narrow(Scope::Viewer), Scope::Viewer);
        assert_eq!(Scope::Manager.narrow(Scope::Owner), Scope::Manager);
    }

    #[test]
    fn every_caveat_round_trips_through_bytes() {
        let caveats = vec![
            Caveat::Nonce(vec![1, 2, 3]),
            Caveat::DelegationTimestamp(123),
            Caveat::Expiration(Expiration::Absolute(456)),
            Caveat::Expiration(Expiration::Delta(789)),
            Caveat::Scope(Scope::Manager),
            Caveat::ServerAuthenticationTokenV1(vec![]),
            Caveat::ClientAuthorizationTokenV1(b"tok".to_vec()),
            Caveat::DelegateeService(ServiceId::Weave),
            Caveat::AuthenticationChallenge([9u8; 16]),
            Caveat::AppCommandsOnly,
            Caveat::LanSessionId(vec![4, 5, 6]),
        ];
        for caveat in caveats {
            let bytes = caveat.to_bytes();
            let decoded = Caveat::from_bytes(&bytes).unwrap();
            assert_eq!(decoded, caveat);
        }
    }
}
