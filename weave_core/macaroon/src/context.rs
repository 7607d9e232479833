//! The context a macaroon is validated against: current time and the two
//! bindings (transport session id, authentication-challenge nonce) that a
//! caveat chain can pin itself to.
//!
//! Mirrors `original_source/src/macaroon_context.h`'s `UwMacaroonContext`.

/// Validation-time context. `current_time` is J2000 seconds; `0` (the
/// default, matching `uw_macaroon_context_create_`'s handling of a
/// negative/unset timestamp) means "unknown", and expiration checks treat
/// an unknown time as "not yet expired" rather than failing closed on a
/// device that hasn't been told the time yet — narrower checks (e.g.
/// `/auth`'s `TimeRequired` gate) are the caller's responsibility, not the
/// validator's.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub current_time_j2000: u32,
    pub lan_session_id: Option<Vec<u8>>,
    pub auth_challenge: Option<Vec<u8>>,
}

impl Context {
    pub fn with_time(current_time_j2000: u32) -> Self {
        Context {
            current_time_j2000,
            lan_session_id: None,
            auth_challenge: None,
        }
    }

    pub fn with_lan_session_id(mut self, id: Vec<u8>) -> Self {
        self.lan_session_id = Some(id);
        self
    }

    pub fn with_auth_challenge(mut self, challenge: Vec<u8>) -> Self {
        self.auth_challenge = Some(challenge);
        self
    }
}
