//! `/auth` (api id 5): validates a macaroon presented by the client and
//! grants the session the role it carries (spec.md §4.6).
//!
//! Grounded on `original_source/src/auth_request.c`'s `uw_auth_request_handler_`:
//! mode `Pairing` validates under `ephemeral_pairing_key` and marks the
//! session access-control-authorized; mode `Token` validates under
//! `client_authorization_key`, bound to the current channel's session id.

use weave_common::cbor::MapRef;
use weave_common::cbor::{encode_to_buffer, Decoder};
use weave_common::status::{Result, Status};
use weave_common::time::{TimeStatus, WallClock};
use weave_common::value::Value;
use weave_common::Buffer;
use weave_crypto::providers::{BlockCipher128, Sha256};
use weave_device::crypto::DeviceCrypto;
use weave_macaroon::validate::validate;
use weave_macaroon::wire::decode_macaroon;
use weave_macaroon::{Context, Scope};

use crate::keys::derive_aes_key;
use crate::session::{Phase, Session};

const KEY_MODE: i64 = 1;
const KEY_AUTH_CODE: i64 = 2;

const KEY_ROLE: i64 = 1;
const KEY_TIME: i64 = 2;
const KEY_TIME_STATUS: i64 = 3;

const MODE_ANONYMOUS: i64 = 0;
const MODE_PAIRING: i64 = 1;
const MODE_TOKEN: i64 = 2;

fn time_status_code(status: TimeStatus) -> i32 {
    match status {
        TimeStatus::Invalid => 0,
        TimeStatus::Degraded => 1,
        TimeStatus::Ok => 2,
    }
}

/// Runs `/auth`. Requires an `InSession` (encrypted) channel; anything else
/// returns [`Status::EncryptionRequired`] before params are even parsed.
pub fn handle<C: BlockCipher128, S: Sha256>(
    session: &mut Session,
    device_crypto: &DeviceCrypto,
    cipher: &C,
    wall_clock: &dyn WallClock,
    current_time_j2000: u32,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    if session.crypto().phase() != Phase::InSession {
        return Err(Status::EncryptionRequired);
    }

    let params = params.ok_or(Status::PrivetInvalidParam)?;
    let mode = params.get(KEY_MODE)?.ok_or(Status::PrivetInvalidParam)?.as_i64()?;
    let auth_code = params.get(KEY_AUTH_CODE)?.ok_or(Status::PrivetInvalidParam)?.as_bytes()?;

    let (role, expiration_time, access_control_authorized) = match mode {
        MODE_ANONYMOUS => return Err(Status::InvalidInput),
        MODE_PAIRING => {
            let raw_key = device_crypto.ephemeral_pairing_key().ok_or(Status::PairingRequired)?;
            let key = derive_aes_key::<S>(raw_key);
            let token = decode_macaroon(auth_code).map_err(|_| Status::VerificationFailed)?;
            let context = Context::with_time(current_time_j2000);
            let validation = validate(&token, cipher, &key, &context)?;
            (validation.granted_scope, validation.expiration_time, true)
        }
        MODE_TOKEN => {
            let key = *device_crypto.client_authz_key().ok_or(Status::DeviceCryptoNoKeys)?;
            let token = decode_macaroon(auth_code).map_err(|_| Status::VerificationFailed)?;
            let mut context = Context::with_time(current_time_j2000);
            if let Some(session_id) = session.crypto().session_id() {
                context = context.with_lan_session_id(session_id.to_vec());
            }
            let validation = validate(&token, cipher, &key, &context)?;
            (validation.granted_scope, validation.expiration_time, false)
        }
        _ => return Err(Status::InvalidInput),
    };

    if role != Scope::Owner && wall_clock.now_unix().is_none() {
        return Err(Status::TimeRequired);
    }

    session.start_valid(role, expiration_time);
    session.set_access_control_authorized(access_control_authorized);

    let entries = [
        (KEY_ROLE, Value::Int(role as i32)),
        (KEY_TIME, Value::Int64(wall_clock.now_unix().unwrap_or(0))),
        (KEY_TIME_STATUS, Value::Int(time_status_code(wall_clock.status()))),
    ];
    encode_to_buffer(&Value::map(&entries), 128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::time::SystemClock;
    use weave_crypto::providers::host::{HostBlockCipher, HostCsprng, HostSha256};
    use weave_device::config::Config;
    use weave_device::storage::MemoryStorage;
    use weave_macaroon::helpers::{mint_cat, mint_sat};
    use weave_macaroon::wire::encode_macaroon;
    use weave_macaroon::ServiceId;

    fn device_crypto() -> DeviceCrypto {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap()
    }

    fn request_params(mode: i64, auth_code: &[u8]) -> weave_common::Buffer {
        let entries = [(KEY_MODE, Value::Int(mode as i32)), (KEY_AUTH_CODE, Value::ByteString(auth_code))];
        encode_to_buffer(&Value::map(&entries), 256).unwrap()
    }

    fn parse<'a>(buf: &'a weave_common::Buffer) -> MapRef<'a> {
        let mut dec = Decoder::new(buf.as_bytes());
        dec.read_item().unwrap().as_map().unwrap()
    }

    /// Runs a real `TokenSha256` handshake so a session in `InSession` phase
    /// (not a synthetic one) exercises the mode gates below.
    fn in_session(device_crypto: &DeviceCrypto) -> Session {
        let root_key = *device_crypto.device_auth_key().unwrap();
        let sat = mint_sat(&HostBlockCipher, &root_key, b"token", [1u8; 8]).unwrap();
        let sat_bytes = encode_macaroon(&sat, 256).unwrap();

        let mut request = weave_common::Buffer::with_capacity(128);
        request.append(&[0x02]).unwrap();
        request.append(&[2u8; 12]).unwrap();
        request.append(sat_bytes.as_bytes()).unwrap();

        let mut session = Session::new();
        let mut confirm = weave_common::Buffer::with_capacity(128);
        assert!(session.handshake_exchange::<HostBlockCipher, HostSha256, HostCsprng>(
            device_crypto,
            &HostBlockCipher,
            &HostCsprng,
            0,
            request.view_all(),
            &mut confirm,
        ));
        session
    }

    #[test]
    fn rejects_unencrypted_channel() {
        let device_crypto = device_crypto();
        let mut session = Session::new();
        let buf = request_params(MODE_TOKEN, &[]);
        let err = handle::<HostBlockCipher, HostSha256>(&mut session, &device_crypto, &HostBlockCipher, &SystemClock::new(), 0, Some(parse(&buf))).unwrap_err();
        assert_eq!(err, Status::EncryptionRequired);
    }

    #[test]
    fn anonymous_mode_is_denied_over_an_encrypted_channel() {
        let device_crypto = device_crypto();
        let mut session = in_session(&device_crypto);
        let buf = request_params(MODE_ANONYMOUS, &[]);
        let err = handle::<HostBlockCipher, HostSha256>(&mut session, &device_crypto, &HostBlockCipher, &SystemClock::new(), 0, Some(parse(&buf))).unwrap_err();
        assert_eq!(err, Status::InvalidInput);
    }

    #[test]
    fn token_mode_grants_role_from_cat_bound_to_the_session() {
        let mut device_crypto = device_crypto();
        let mut session = in_session(&device_crypto);

        device_crypto.generate_pending_client_authz_key(&HostCsprng).unwrap();
        let pending_key = *device_crypto.pending_client_authz_key().unwrap();
        let config = Config::default();
        let mut storage = MemoryStorage::new();
        device_crypto.commit_pending_client_authz_key(&mut storage, &config).unwrap();
        assert_eq!(*device_crypto.client_authz_key().unwrap(), pending_key);

        let cat = mint_cat(&HostBlockCipher, &pending_key, b"", 0, ServiceId::NotCloudRegistered).unwrap();
        let cat_bytes = encode_macaroon(&cat, 256).unwrap();

        let buf = request_params(MODE_TOKEN, cat_bytes.as_bytes());
        let reply = handle::<HostBlockCipher, HostSha256>(
            &mut session,
            &device_crypto,
            &HostBlockCipher,
            &SystemClock::new(),
            0,
            Some(parse(&buf)),
        )
        .unwrap();

        let mut dec = Decoder::new(reply.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();
        assert_eq!(map.get(KEY_ROLE).unwrap().unwrap().as_i64().unwrap(), Scope::Owner as i64);
        assert_eq!(session.role(), Some(Scope::Owner));
    }
}
