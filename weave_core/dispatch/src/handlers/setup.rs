//! `/setup` (api id 9, manager+): accepts a device name and/or an
//! Owner-sourced wall-clock timestamp (spec.md §4.6-4.9).
//!
//! Grounded on `original_source/src/setup_request.c`: both fields are
//! optional and independently validated before either is committed, so a
//! bad name never leaves a valid timestamp half-applied.

use weave_common::cbor::MapRef;
use weave_common::status::{Result, Status};
use weave_common::time::WallClock;
use weave_common::value::Value;
use weave_common::Buffer;
use weave_device::config::Config;
use weave_device::settings::Settings;
use weave_device::storage::Storage;

const KEY_NAME: i64 = 1;
const KEY_TIMESTAMP: i64 = 2;

const KEY_VERSION: i64 = 1;

/// Timestamps before this are rejected outright (2001-09-09, the Unix
/// gigasecond) — a sanity floor, not a real epoch boundary.
const TIMESTAMP_SANITY_FLOOR: i64 = 1_000_000_000;

pub fn handle(
    settings: &mut Settings,
    storage: &mut impl Storage,
    config: &Config,
    wall_clock: &mut dyn WallClock,
    current_version: u8,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    let params = params.ok_or(Status::PrivetInvalidParam)?;

    let name = match params.get(KEY_NAME)? {
        Some(item) => Some(item.as_text()?),
        None => None,
    };
    let timestamp = match params.get(KEY_TIMESTAMP)? {
        Some(item) => Some(item.as_i64()?),
        None => None,
    };

    if let Some(timestamp) = timestamp {
        if timestamp < TIMESTAMP_SANITY_FLOOR {
            return Err(Status::InvalidInput);
        }
    }

    // Only commit once both parameters have passed validation.
    if let Some(timestamp) = timestamp {
        // An Owner-role `/setup` call is always a trusted time source.
        wall_clock.set_now_unix(timestamp, true);
    }
    if let Some(name) = name {
        if name != settings.name() {
            settings.set_name(name, storage, config)?;
        }
    }

    let entries = [(KEY_VERSION, Value::Int(current_version as i32))];
    weave_common::cbor::encode_to_buffer(&Value::map(&entries), 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::cbor::Decoder;
    use weave_common::time::SystemClock;
    use weave_device::storage::MemoryStorage;

    fn settings() -> Settings {
        Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device")
    }

    #[test]
    fn rejects_timestamp_below_sanity_floor() {
        let mut settings = settings();
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut clock = SystemClock::new();
        let entries = [(KEY_TIMESTAMP, Value::Int64(5))];
        let buf = weave_common::cbor::encode_to_buffer(&Value::map(&entries), 32).unwrap();
        let mut dec = Decoder::new(buf.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();

        let err = handle(&mut settings, &mut storage, &config, &mut clock, 1, Some(map)).unwrap_err();
        assert_eq!(err, Status::InvalidInput);
    }

    #[test]
    fn renames_and_sets_the_clock() {
        let mut settings = settings();
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut clock = SystemClock::new();
        let entries = [(KEY_NAME, Value::Text("New Name")), (KEY_TIMESTAMP, Value::Int64(1_700_000_000))];
        let buf = weave_common::cbor::encode_to_buffer(&Value::map(&entries), 64).unwrap();
        let mut dec = Decoder::new(buf.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();

        handle(&mut settings, &mut storage, &config, &mut clock, 1, Some(map)).unwrap();
        assert_eq!(settings.name(), "New Name");
        assert_eq!(clock.now_unix(), Some(1_700_000_000));
    }

    #[test]
    fn unchanged_name_and_timestamp_is_a_no_op() {
        let mut settings = settings();
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut clock = SystemClock::new();
        let entries = [(KEY_NAME, Value::Text("My Device"))];
        let buf = weave_common::cbor::encode_to_buffer(&Value::map(&entries), 32).unwrap();
        let mut dec = Decoder::new(buf.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();

        handle(&mut settings, &mut storage, &config, &mut clock, 1, Some(map)).unwrap();
        assert_eq!(settings.name(), "My Device");
    }
}
