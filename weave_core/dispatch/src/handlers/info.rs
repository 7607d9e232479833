//! `/info` (api id 0): identity, capability, and time-status reporting.
//!
//! Grounded on `original_source/src/info_request.c`'s `uw_info_request_set_info_`:
//! the same fields, but built as an owned [`Value::map`] tree instead of a
//! flat C array of `UwMapValue` structs.

use weave_common::status::Result;
use weave_common::time::{TimeStatus, WallClock};
use weave_common::value::Value;
use weave_common::Buffer;
use weave_device::settings::{Settings, PAIRING_TYPE_EMBEDDED_CODE, PAIRING_TYPE_PIN_CODE};
use weave_device::crypto::DeviceCrypto;

use crate::envelope;

const KEY_VERSION: i64 = 1;
const KEY_AUTH: i64 = 2;
const KEY_MODEL_MANIFEST_ID: i64 = 3;
const KEY_DEVICE_ID: i64 = 4;
const KEY_NAME: i64 = 5;
const KEY_TIMESTAMP: i64 = 6;
const KEY_TIME_STATUS: i64 = 7;
const KEY_BUILD: i64 = 8;

const KEY_AUTH_MODE: i64 = 1;
const KEY_AUTH_PAIRING: i64 = 2;
const KEY_AUTH_CRYPTO: i64 = 3;

const AUTH_MODE_PAIRING: i32 = 1;
const AUTH_MODE_TOKEN: i32 = 2;
const PAIRING_VALUE_PIN: i32 = 1;
const PAIRING_VALUE_EMBEDDED: i32 = 2;
const CRYPTO_VALUE_SPAKE_P224: i32 = 1;

fn time_status_code(status: TimeStatus) -> i32 {
    match status {
        TimeStatus::Invalid => 0,
        TimeStatus::Degraded => 1,
        TimeStatus::Ok => 2,
    }
}

/// Builds the `/info` result map. `build_string` is whatever a host's own
/// `build.rs`/`built`-style crate produced for this firmware image.
pub fn build_reply(settings: &Settings, device_crypto: &DeviceCrypto, wall_clock: &dyn WallClock, build_string: &str) -> Result<Buffer> {
    let auth_modes = [Value::Int(AUTH_MODE_PAIRING), Value::Int(AUTH_MODE_TOKEN)];

    let mut pairing_values = Vec::with_capacity(2);
    if settings.supported_pairing_types & PAIRING_TYPE_PIN_CODE != 0 {
        pairing_values.push(Value::Int(PAIRING_VALUE_PIN));
    }
    if settings.supported_pairing_types & PAIRING_TYPE_EMBEDDED_CODE != 0 {
        pairing_values.push(Value::Int(PAIRING_VALUE_EMBEDDED));
    }
    let crypto_values = [Value::Int(CRYPTO_VALUE_SPAKE_P224)];

    let auth_entries = [
        (KEY_AUTH_MODE, Value::array(&auth_modes)),
        (KEY_AUTH_PAIRING, Value::array(&pairing_values)),
        (KEY_AUTH_CRYPTO, Value::array(&crypto_values)),
    ];

    let model_manifest_id = settings.model_manifest_id();
    let device_id = device_crypto.device_id().unwrap_or([0u8; 4]);
    let timestamp = wall_clock.now_unix().unwrap_or(0);

    let result_entries = [
        (KEY_VERSION, Value::Int(envelope::CURRENT_VERSION as i32)),
        (KEY_AUTH, Value::map(&auth_entries)),
        (KEY_MODEL_MANIFEST_ID, Value::ByteString(&model_manifest_id)),
        (KEY_DEVICE_ID, Value::ByteString(&device_id)),
        (KEY_NAME, Value::Text(settings.name())),
        (KEY_TIMESTAMP, Value::Int64(timestamp)),
        (KEY_TIME_STATUS, Value::Int(time_status_code(wall_clock.status()))),
        (KEY_BUILD, Value::Text(build_string)),
    ];

    weave_common::cbor::encode_to_buffer(&Value::map(&result_entries), 512)
}
