//! `/accessControl/claim` (api id 24) and `/accessControl/confirm` (api id 25):
//! hands a client its own long-lived `client_authorization_key`, confirmed
//! in a second round trip so a lost response doesn't strand the device
//! without an owner (spec.md §4.6-4.9).
//!
//! Grounded on `original_source/src/access_control_request.c`.

use weave_common::cbor::{encode_to_buffer, Decoder, MapRef};
use weave_common::status::{Result, Status};
use weave_common::value::Value;
use weave_common::Buffer;
use weave_crypto::providers::{BlockCipher128, Csprng};
use weave_device::config::Config;
use weave_device::crypto::DeviceCrypto;
use weave_device::storage::Storage;
use weave_macaroon::helpers::mint_cat;
use weave_macaroon::wire::{decode_macaroon, encode_macaroon};
use weave_macaroon::{Context, ServiceId};

use crate::session::{Phase, Session};

const KEY_CLIENT_TOKEN: i64 = 1;

/// Runs `/accessControl/claim`. Requires an encrypted channel that has
/// already cleared `/pairing/confirm`'s access-control grant; mints a fresh
/// pending key rather than reusing `client_authz_key` so a lost reply never
/// locks a device with no committed key out of recovery.
pub fn claim<C: BlockCipher128, R: Csprng>(
    session: &Session,
    device_crypto: &mut DeviceCrypto,
    cipher: &C,
    rng: &R,
    current_time_j2000: u32,
) -> Result<Buffer> {
    if session.crypto().phase() != Phase::InSession {
        return Err(Status::EncryptionRequired);
    }
    if !session.is_access_control_authorized() {
        return Err(Status::PairingRequired);
    }

    let pending_key = device_crypto.generate_pending_client_authz_key(rng)?;
    let token = mint_cat(cipher, &pending_key, b"", current_time_j2000, ServiceId::NotCloudRegistered)?;
    let token_bytes = encode_macaroon(&token, 256)?;

    let entries = [(KEY_CLIENT_TOKEN, Value::ByteString(token_bytes.as_bytes()))];
    encode_to_buffer(&Value::map(&entries), 320)
}

/// Runs `/accessControl/confirm`. Validates the client's echoed token under
/// the pending key first (committing it on success) and falls back to the
/// already-committed `client_authz_key` so a retried confirm after a missed
/// reply still succeeds.
pub fn confirm<C: BlockCipher128>(
    session: &Session,
    device_crypto: &mut DeviceCrypto,
    storage: &mut impl Storage,
    config: &Config,
    cipher: &C,
    current_time_j2000: u32,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    if !session.is_access_control_authorized() {
        return Err(Status::PairingRequired);
    }

    let params = params.ok_or(Status::PrivetInvalidParam)?;
    let token_bytes = params.get(KEY_CLIENT_TOKEN)?.ok_or(Status::PrivetInvalidParam)?.as_bytes()?;
    let token = decode_macaroon(token_bytes).map_err(|_| Status::VerificationFailed)?;
    let context = Context::with_time(current_time_j2000);

    if let Some(pending_key) = device_crypto.pending_client_authz_key().copied() {
        weave_macaroon::validate::validate(&token, cipher, &pending_key, &context)?;
        device_crypto.commit_pending_client_authz_key(storage, config)?;
    } else {
        let committed_key = *device_crypto.client_authz_key().ok_or(Status::DeviceCryptoNoKeys)?;
        weave_macaroon::validate::validate(&token, cipher, &committed_key, &context)?;
    }

    encode_to_buffer(&Value::map(&[]), 8)
}
