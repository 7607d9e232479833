//! The RPC envelope: every decrypted message on the channel is a small CBOR
//! map keyed by small integers (spec.md §6), carrying a request or a reply.
//!
//! Grounded on `original_source/src/privet_request.c`'s field layout, reused
//! on top of [`weave_common::cbor`] rather than a bespoke parser (the same
//! choice `weave_macaroon::wire` makes for macaroons).

use weave_common::cbor::{encode_to_buffer, Decoder, MapRef};
use weave_common::status::{Result, Status};
use weave_common::value::Value;
use weave_common::Buffer;

/// Request envelope version this dispatcher speaks; a request that omits
/// the field is assumed to be this version.
pub const CURRENT_VERSION: i64 = 2;

const KEY_VERSION: i64 = 0;
const KEY_API_ID: i64 = 1;
const KEY_REQUEST_ID: i64 = 2;
const KEY_ERROR: i64 = 3;
const KEY_PARAMS: i64 = 16;
const KEY_RESULT: i64 = 17;

const KEY_ERROR_CODE: i64 = 4;
const KEY_ERROR_MESSAGE: i64 = 5;
#[allow(dead_code)] // accepted on the wire, never populated by this device
const KEY_ERROR_DATA: i64 = 6;

/// A parsed request envelope, borrowing its `params` map from the decrypted
/// message buffer.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub version: i64,
    pub api_id: i64,
    /// Absent only for a fire-and-forget call that expects no reply
    /// (spec.md §6's notification form).
    pub request_id: Option<i64>,
    pub params: Option<MapRef<'a>>,
}

/// Parses one envelope from a decrypted message payload. Mirrors
/// `uw_privet_request_parse_`'s required/optional field handling:
/// `api_id` is the only field whose absence is an error.
pub fn parse_request(bytes: &[u8]) -> Result<Request<'_>> {
    let mut decoder = Decoder::new(bytes);
    let map = decoder.read_item()?.as_map().map_err(|_| Status::PrivetParseError)?;

    let version = match map.get(KEY_VERSION)? {
        Some(item) => item.as_i64()?,
        None => CURRENT_VERSION,
    };
    let api_id = map
        .get(KEY_API_ID)?
        .ok_or(Status::PrivetInvalidParam)?
        .as_i64()?;
    let request_id = match map.get(KEY_REQUEST_ID)? {
        Some(item) => Some(item.as_i64()?),
        None => None,
    };
    let params = match map.get(KEY_PARAMS)? {
        Some(item) => Some(item.as_map()?),
        None => None,
    };

    Ok(Request {
        version,
        api_id,
        request_id,
        params,
    })
}

/// Builds a success reply: `{2: request_id, 17: result}` (the `request_id`
/// entry is omitted for a notification that carried none).
pub fn build_ok_reply(request_id: Option<i64>, result: &Value, capacity: usize) -> Result<Buffer> {
    let mut entries: Vec<(i64, Value)> = Vec::with_capacity(2);
    if let Some(id) = request_id {
        entries.push((KEY_REQUEST_ID, Value::Int64(id)));
    }
    entries.push((KEY_RESULT, *result));
    encode_to_buffer(&Value::map(&entries), capacity)
}

/// Builds an error reply: `{2: request_id, 3: {4: code, 5?: message}}`.
pub fn build_error_reply(request_id: Option<i64>, code: Status, message: Option<&str>, capacity: usize) -> Result<Buffer> {
    let mut error_entries: Vec<(i64, Value)> = Vec::with_capacity(2);
    error_entries.push((KEY_ERROR_CODE, Value::Int(code.code() as i32)));
    if let Some(msg) = message {
        error_entries.push((KEY_ERROR_MESSAGE, Value::Text(msg)));
    }

    let mut entries: Vec<(i64, Value)> = Vec::with_capacity(2);
    if let Some(id) = request_id {
        entries.push((KEY_REQUEST_ID, Value::Int64(id)));
    }
    entries.push((KEY_ERROR, Value::map(&error_entries)));
    encode_to_buffer(&Value::map(&entries), capacity)
}
