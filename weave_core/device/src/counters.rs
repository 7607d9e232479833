//! Debug/statistics counters (spec.md §4.10): a small fixed set of internal
//! counters plus a vendor-defined set of application counters, coalesced to
//! storage after a short dirty interval.
//!
//! Grounded on `original_source/src/counters.c` + `include/uweave/counters.h`.
//! The original's `UwCounterSet` is a single flexible-array allocation sized
//! by `uw_counter_set_sizeof`; here the two counter arrays are plain `Vec`s
//! and the "flexible array" sizing problem doesn't exist.

use weave_common::cbor::{encode_to_buffer, Decoder};
use weave_common::status::{Result, Status};
use weave_common::value::{MapEmitter, Value};
use weave_crypto::providers::Csprng;

use crate::config::Config;
use crate::storage::{align_up, BlobName, Storage};

/// Mirrors `UwInternalCounter`. Order matters: position is the persisted id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InternalCounter {
    BleConnect = 0,
    BleDisconnect = 1,
    AuthPairing = 2,
    AuthToken = 3,
    AccessControlClaim = 4,
    AccessControlConfirm = 5,
    SetupTimeSet = 6,
    SessionHandshakeFailure = 7,
    SessionDecryptionFailure = 8,
    SessionEncryptionFailure = 9,
    PrivetDispatch = 10,
    FactoryReset = 11,
}

const INTERNAL_COUNTER_COUNT: usize = 12;

const KEY_GENERATION_ID: i64 = 1;
const KEY_GENERATION_TIMESTAMP: i64 = 2;
const KEY_TIMESTAMP_NOW: i64 = 3;
const KEY_METRICS: i64 = 4;
const KEY_VENDOR_METRICS: i64 = 5;

#[derive(Debug, Clone, Copy)]
struct Counter {
    id: u16,
    value: u32,
}

/// Tracks uWeave-internal and application-specific counters, coalescing
/// writes to storage so a counter bumped every RPC doesn't cause a flash
/// write every RPC.
#[derive(Debug)]
pub struct CounterSet {
    generation_id: u32,
    generation_time: u32,
    earliest_change_time: u32,
    uw_counters: [Counter; INTERNAL_COUNTER_COUNT],
    app_counters: Vec<Counter>,
}

impl CounterSet {
    /// Builds a counter set for the given application counter ids (spec.md
    /// allows these to be sparse/non-sequential so vendor definitions can
    /// evolve across firmware versions), then attempts to read persisted
    /// values from `storage`. On any read/deserialize failure a fresh
    /// generation id is drawn instead, matching
    /// `uw_counter_set_read_from_storage_`'s fallback.
    pub fn load<R: Csprng>(storage: &impl Storage, app_ids: &[u16], rng: &R) -> Result<Self> {
        let mut uw_counters = [Counter { id: 0, value: 0 }; INTERNAL_COUNTER_COUNT];
        for (i, counter) in uw_counters.iter_mut().enumerate() {
            counter.id = i as u16;
        }
        let app_counters = app_ids.iter().map(|&id| Counter { id, value: 0 }).collect();

        let mut this = CounterSet {
            generation_id: 0,
            generation_time: 0,
            earliest_change_time: 0,
            uw_counters,
            app_counters,
        };

        match storage.get(BlobName::Counters)? {
            Some(bytes) if !bytes.is_empty() => {
                if this.deserialize(&bytes).is_err() {
                    this.generation_id = u32::from_be_bytes(rng.random_array()?);
                }
            }
            _ => {
                this.generation_id = u32::from_be_bytes(rng.random_array()?);
            }
        }
        Ok(this)
    }

    fn mark_dirty(&mut self, uptime_seconds: u32) {
        if self.earliest_change_time == 0 {
            self.earliest_change_time = uptime_seconds;
        }
    }

    pub fn increment_internal(&mut self, counter: InternalCounter, uptime_seconds: u32) {
        self.mark_dirty(uptime_seconds);
        self.uw_counters[counter as usize].value = self.uw_counters[counter as usize].value.wrapping_add(1);
    }

    pub fn get_internal(&self, counter: InternalCounter) -> u32 {
        self.uw_counters[counter as usize].value
    }

    /// Increments the named application counter. Does nothing if `app_id`
    /// was not one of the ids passed to [`Self::load`] (the original asserts
    /// here; a malformed vendor id should not be able to crash the device).
    pub fn increment_app(&mut self, app_id: u16, uptime_seconds: u32) {
        self.mark_dirty(uptime_seconds);
        if let Some(counter) = self.app_counters.iter_mut().find(|c| c.id == app_id) {
            counter.value = counter.value.wrapping_add(1);
        }
    }

    pub fn get_app(&self, app_id: u16) -> Option<u32> {
        self.app_counters.iter().find(|c| c.id == app_id).map(|c| c.value)
    }

    /// Writes to storage only if dirty and the coalesce interval has
    /// elapsed, mirroring `uw_counter_set_try_coalesce_`.
    pub fn try_coalesce(&mut self, storage: &mut impl Storage, config: &Config, uptime_seconds: u32) -> Result<()> {
        if self.earliest_change_time == 0 {
            return Ok(());
        }
        if uptime_seconds.wrapping_sub(self.earliest_change_time) < config.counter_coalesce_interval_seconds {
            return Ok(());
        }
        self.earliest_change_time = 0;
        self.write_to_storage(storage, config)
    }

    fn write_to_storage(&mut self, storage: &mut impl Storage, config: &Config) -> Result<()> {
        let document = self.document(None);
        let buf = encode_to_buffer(&Value::CallbackMap(&document), 512)?;
        let padded_len = align_up(buf.len(), config.storage_alignment);
        let mut bytes = buf.as_bytes().to_vec();
        bytes.resize(padded_len, 0);
        storage.put(BlobName::Counters, &bytes)
    }

    /// Builds the debug/metrics document sent over `/info` and persisted to
    /// storage. `now_timestamp_seconds` is the J2000 wall-clock time if the
    /// device has one set, mirroring `uw_counter_set_encode_`'s conditional
    /// `timestampNow` field.
    pub fn document(&self, now_timestamp_seconds: Option<u32>) -> CounterDocument<'_> {
        CounterDocument {
            generation_id: self.generation_id,
            generation_time: self.generation_time,
            now: now_timestamp_seconds,
            uw: &self.uw_counters,
            app: &self.app_counters,
        }
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<()> {
        let mut dec = Decoder::new(bytes);
        let map = dec.read_item()?.as_map()?;

        let generation_id = map.get(KEY_GENERATION_ID)?.ok_or(Status::InvalidArgument)?.as_i64()?;
        let generation_time = map.get(KEY_GENERATION_TIMESTAMP)?.ok_or(Status::InvalidArgument)?.as_i64()?;
        self.generation_id = generation_id as u32;
        self.generation_time = generation_time as u32;

        if let Some(vendor) = map.get(KEY_VENDOR_METRICS)? {
            let vendor_map = vendor.as_map()?;
            for counter in self.app_counters.iter_mut() {
                if let Some(v) = vendor_map.get(counter.id as i64)? {
                    counter.value = v.as_i64()? as u32;
                }
            }
        }
        Ok(())
    }
}

/// A `CallbackMap` emitter borrowing straight from a [`CounterSet`], so
/// encoding never needs an intermediate `Vec<(i64, Value)>` allocation.
pub struct CounterDocument<'a> {
    generation_id: u32,
    generation_time: u32,
    now: Option<u32>,
    uw: &'a [Counter; INTERNAL_COUNTER_COUNT],
    app: &'a [Counter],
}

impl MapEmitter for CounterDocument<'_> {
    fn len(&self) -> usize {
        3 + usize::from(self.now.is_some()) + usize::from(!self.app.is_empty())
    }

    fn entry(&self, index: usize) -> (i64, Value<'_>) {
        let mut remaining = index;
        if remaining == 0 {
            return (KEY_GENERATION_ID, Value::Int64(self.generation_id as i64));
        }
        remaining -= 1;
        if remaining == 0 {
            return (KEY_GENERATION_TIMESTAMP, Value::Int64(self.generation_time as i64));
        }
        remaining -= 1;
        if let Some(now) = self.now {
            if remaining == 0 {
                return (KEY_TIMESTAMP_NOW, Value::Int64(now as i64));
            }
            remaining -= 1;
        }
        if remaining == 0 {
            return (KEY_METRICS, Value::CallbackMap(&UwCounters(self.uw)));
        }
        remaining -= 1;
        debug_assert_eq!(remaining, 0);
        (KEY_VENDOR_METRICS, Value::CallbackMap(&AppCounters(self.app)))
    }
}

struct UwCounters<'a>(&'a [Counter; INTERNAL_COUNTER_COUNT]);

impl MapEmitter for UwCounters<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn entry(&self, index: usize) -> (i64, Value<'_>) {
        (self.0[index].id as i64, Value::Int64(self.0[index].value as i64))
    }
}

struct AppCounters<'a>(&'a [Counter]);

impl MapEmitter for AppCounters<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn entry(&self, index: usize) -> (i64, Value<'_>) {
        (self.0[index].id as i64, Value::Int64(self.0[index].value as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use weave_crypto::providers::host::HostCsprng;

    #[test]
    fn coalesces_only_after_interval_elapses() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut counters = CounterSet::load(&storage, &[1000], &HostCsprng).unwrap();

        counters.increment_internal(InternalCounter::BleConnect, 5);
        counters.try_coalesce(&mut storage, &config, 6).unwrap();
        assert!(storage.get(BlobName::Counters).unwrap().is_none());

        counters.try_coalesce(&mut storage, &config, 16).unwrap();
        assert!(storage.get(BlobName::Counters).unwrap().is_some());
    }

    #[test]
    fn persisted_counters_reload() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut counters = CounterSet::load(&storage, &[42], &HostCsprng).unwrap();
        counters.increment_app(42, 0);
        counters.increment_app(42, 0);
        counters.try_coalesce(&mut storage, &config, 100).unwrap();

        let reloaded = CounterSet::load(&storage, &[42], &HostCsprng).unwrap();
        assert_eq!(reloaded.get_app(42), Some(2));
    }

    #[test]
    fn unknown_app_counter_is_ignored() {
        let storage = MemoryStorage::new();
        let mut counters = CounterSet::load(&storage, &[1], &HostCsprng).unwrap();
        counters.increment_app(999, 0);
        assert_eq!(counters.get_app(999), None);
        assert_eq!(counters.get_app(1), Some(0));
    }
}
