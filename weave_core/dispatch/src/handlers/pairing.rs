//! `/pairing/start` (api id 2) and `/pairing/confirm` (api id 3): SPAKE2
//! password-authenticated key exchange that establishes `ephemeral_pairing_key`
//! (spec.md §4.5).
//!
//! Grounded on `original_source/src/pairing_request.c` + `src/crypto_spake.c`.
//! The device always plays the SPAKE2 "server" role, masking its commitment
//! with `N` and unmasking the client's with `M` (see
//! [`weave_crypto::spake2`]).

use weave_common::cbor::{encode_to_buffer, Decoder, MapRef};
use weave_common::status::{Result, Status};
use weave_common::time::WallClock;
use weave_common::value::Value;
use weave_common::Buffer;
use weave_crypto::providers::{BlockCipher128, Csprng, Sha256};
use weave_crypto::{eax, spake2::SpakeState};
use weave_device::config::Config;
use weave_device::crypto::DeviceCrypto;
use weave_device::settings::{Settings, EmbeddedCodeSource, PAIRING_TYPE_EMBEDDED_CODE, PAIRING_TYPE_PIN_CODE};
use weave_macaroon::helpers::{mint_cat, mint_sat};
use weave_macaroon::wire::encode_macaroon;
use weave_macaroon::ServiceId;

use crate::keys::derive_aes_key;
use crate::session::Session;

const KEY_PAIRING_TYPE: i64 = 1;
const KEY_SESSION_ID: i64 = 1;
const KEY_DEVICE_COMMITMENT: i64 = 2;

const KEY_CLIENT_COMMITMENT: i64 = 1;
const KEY_ENCRYPTED_TIMESTAMP: i64 = 2;
const KEY_ENCRYPTED_TOKENS: i64 = 1;

const TIMESTAMP_TAG_LENGTH: usize = 12;
const TOKENS_TAG_LENGTH: usize = 12;
const NONCE_TIMESTAMP: [u8; 1] = [0x00];
const NONCE_TOKENS: [u8; 1] = [0x01];

const KEY_CAT: i64 = 1;
const KEY_SAT: i64 = 2;

fn four_digit_pin<R: Csprng>(rng: &R) -> Result<[u8; 4]> {
    let raw = rng.random_array::<2>()?;
    let pin = u16::from_be_bytes(raw) % 10_000;
    let mut digits = [0u8; 4];
    let s = format!("{:04}", pin);
    digits.copy_from_slice(s.as_bytes());
    Ok(digits)
}

/// Runs `/pairing/start`: picks a pairing secret, masks the device's SPAKE2
/// commitment, and stashes the exchange in `session` for the matching
/// `/pairing/confirm`.
pub fn start<S: Sha256, R: Csprng>(
    session: &mut Session,
    settings: &Settings,
    device_crypto: &DeviceCrypto,
    enable_multipairing: bool,
    rng: &R,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    if session.crypto().phase() == crate::session::Phase::Passthrough && device_crypto.is_set_up() && !enable_multipairing {
        return Err(Status::EncryptionRequired);
    }

    let requested_type = match params.and_then(|p| p.get(KEY_PAIRING_TYPE).transpose()) {
        Some(item) => match item?.as_i64()? {
            1 => PAIRING_TYPE_PIN_CODE,
            2 => PAIRING_TYPE_EMBEDDED_CODE,
            _ => return Err(Status::InvalidArgument),
        },
        None => {
            if settings.supported_pairing_types & PAIRING_TYPE_PIN_CODE != 0 {
                PAIRING_TYPE_PIN_CODE
            } else {
                settings.supported_pairing_types
            }
        }
    };
    if settings.supported_pairing_types & requested_type == 0 {
        return Err(Status::InvalidArgument);
    }

    let secret: Vec<u8> = if requested_type == PAIRING_TYPE_PIN_CODE {
        let pin = four_digit_pin(rng)?;
        tracing::info!(pin = %String::from_utf8_lossy(&pin), "pairing PIN generated");
        pin.to_vec()
    } else {
        match &settings.embedded_code {
            EmbeddedCodeSource::Fixed(code) => code.clone().into_bytes(),
            EmbeddedCodeSource::None => return Err(Status::InvalidArgument),
        }
    };

    let spake = SpakeState::init::<S, R>(true, &secret, rng)?;
    let commitment = spake.compute_commitment::<S>();
    let session_id = u32::from_be_bytes(rng.random_array::<4>()?);
    session.begin_pairing(spake, session_id);

    let entries = [
        (KEY_SESSION_ID, Value::Int64(session_id as i64)),
        (KEY_DEVICE_COMMITMENT, Value::ByteString(&commitment)),
    ];
    encode_to_buffer(&Value::map(&entries), 128)
}

/// Runs `/pairing/confirm`: finalizes the SPAKE2 exchange, optionally adopts
/// an Owner-sourced wall-clock timestamp, and mints+returns a fresh CAT/SAT
/// pair encrypted under the resulting `ephemeral_pairing_key`.
#[allow(clippy::too_many_arguments)]
pub fn confirm<C: BlockCipher128, S: Sha256, R: Csprng>(
    session: &mut Session,
    device_crypto: &mut DeviceCrypto,
    cipher: &C,
    rng: &R,
    wall_clock: &mut dyn WallClock,
    uptime_seconds: u32,
    current_time_j2000: u32,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    let spake = session.pairing_spake().ok_or(Status::PairingRequired)?;

    let params = params.ok_or(Status::PrivetInvalidParam)?;
    let client_commitment = params
        .get(KEY_CLIENT_COMMITMENT)?
        .ok_or(Status::PrivetInvalidParam)?
        .as_bytes()?;

    let shared = spake.finalize::<S>(client_commitment)?;
    session.clear_pairing();
    device_crypto.remember_pairing_key(shared, uptime_seconds);
    let ephemeral_key = derive_aes_key::<S>(&shared);

    if let Some(item) = params.get(KEY_ENCRYPTED_TIMESTAMP)? {
        let encrypted = item.as_bytes()?;
        let mut ts_buffer = Buffer::with_capacity(encrypted.len());
        ts_buffer.append(encrypted)?;
        eax::decrypt(cipher, &ephemeral_key, &NONCE_TIMESTAMP, &[], TIMESTAMP_TAG_LENGTH, &mut ts_buffer)?;
        let mut dec = Decoder::new(ts_buffer.as_bytes());
        let unix_seconds = dec.read_item()?.as_i64()?;
        wall_clock.set_now_unix(unix_seconds, true);
    }

    let cat = mint_cat(cipher, &ephemeral_key, b"", current_time_j2000, ServiceId::NotCloudRegistered)?;
    let Some(device_auth_key) = device_crypto.device_auth_key().copied() else {
        return Err(Status::DeviceCryptoNoKeys);
    };
    let sat_nonce = rng.random_array::<8>()?;
    let sat = mint_sat(cipher, &device_auth_key, b"", sat_nonce)?;

    let cat_bytes = encode_macaroon(&cat, 256)?;
    let sat_bytes = encode_macaroon(&sat, 256)?;
    let token_entries = [
        (KEY_CAT, Value::ByteString(cat_bytes.as_bytes())),
        (KEY_SAT, Value::ByteString(sat_bytes.as_bytes())),
    ];
    let mut tokens_buffer = encode_to_buffer(&Value::map(&token_entries), 512)?;
    eax::encrypt(cipher, &ephemeral_key, &NONCE_TOKENS, &[], TOKENS_TAG_LENGTH, &mut tokens_buffer)?;

    let reply_entries = [(KEY_ENCRYPTED_TOKENS, Value::ByteString(tokens_buffer.as_bytes()))];
    encode_to_buffer(&Value::map(&reply_entries), 768)
}
