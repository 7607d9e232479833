//! A fixed-size ring buffer of structured trace events (spec.md §4.10
//! supplement), queried over `/debug/traceDump` for field diagnostics.
//!
//! Grounded on `original_source/src/trace.h` + `src/trace.c`: entries carry a
//! strictly-increasing id and a wall-clock timestamp, wrap around a
//! fixed-capacity array, and are dumped by id range capped at
//! [`TRACE_DUMP_MAX_ENTRIES`]. The original's tagged union (`UwTraceEntry.u`)
//! becomes a Rust enum with payload instead of a `type` discriminant plus a
//! separate union; the per-type "params" sub-map collapses into two
//! type-agnostic slots on the same flat map, since every payload here is at
//! most two scalar fields.

use weave_common::value::{ArrayEmitter, Value};

/// Matches `kUwTraceDumpMaxEntries`.
pub const TRACE_DUMP_MAX_ENTRIES: usize = 16;

const KEY_TYPE: i64 = 1;
const KEY_TIMESTAMP: i64 = 2;
const KEY_ID: i64 = 3;
const KEY_PARAM_A: i64 = 4;
const KEY_PARAM_B: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleEvent {
    Connect = 1,
    Disconnect = 2,
    DisconnectDrop = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Handshake = 1,
    ProcessIn = 2,
    Dispatch = 3,
    ProcessOut = 4,
    Expiration = 5,
}

/// One recorded event, mirroring `UwTraceEntry.u`'s variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    CallBegin { api_id: u16 },
    CallEnd { api_id: u16, status: u16 },
    AuthResult { mode: u8, role: u8 },
    Ble { event: BleEvent, state: u8 },
    CommandExecute { trait_id: u16, name_id: u16 },
    Session { stage: SessionStage, status: u16 },
    FactoryResetBegin,
    FactoryResetEnd,
}

impl TraceEvent {
    fn type_id(&self) -> i64 {
        match self {
            TraceEvent::CallBegin { .. } => 1,
            TraceEvent::CallEnd { .. } => 2,
            TraceEvent::AuthResult { .. } => 3,
            TraceEvent::Ble { .. } => 4,
            TraceEvent::CommandExecute { .. } => 5,
            TraceEvent::Session { .. } => 6,
            TraceEvent::FactoryResetBegin => 7,
            TraceEvent::FactoryResetEnd => 8,
        }
    }

    fn params(&self) -> Option<(i32, i32)> {
        match *self {
            TraceEvent::CallBegin { api_id } => Some((api_id as i32, 0)),
            TraceEvent::CallEnd { api_id, status } => Some((api_id as i32, status as i32)),
            TraceEvent::AuthResult { mode, role } => Some((mode as i32, role as i32)),
            TraceEvent::Ble { event, state } => Some((event as i32, state as i32)),
            TraceEvent::CommandExecute { trait_id, name_id } => Some((trait_id as i32, name_id as i32)),
            TraceEvent::Session { stage, status } => Some((stage as i32, status as i32)),
            TraceEvent::FactoryResetBegin | TraceEvent::FactoryResetEnd => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: u32,
    timestamp: u32,
    event: TraceEvent,
}

impl Entry {
    fn encode(&self) -> Vec<(i64, Value<'static>)> {
        let mut out = vec![
            (KEY_TYPE, Value::Int64(self.event.type_id())),
            (KEY_TIMESTAMP, Value::Int64(self.timestamp as i64)),
            (KEY_ID, Value::Int64(self.id as i64)),
        ];
        if let Some((a, b)) = self.event.params() {
            out.push((KEY_PARAM_A, Value::Int(a)));
            out.push((KEY_PARAM_B, Value::Int(b)));
        }
        out
    }
}

/// Ring buffer of the last `capacity` trace events.
#[derive(Debug)]
pub struct TraceLog {
    entries: Vec<Option<Entry>>,
    next_index: usize,
    next_id: u32,
}

impl TraceLog {
    pub fn new(capacity: usize) -> Self {
        TraceLog {
            entries: vec![None; capacity],
            next_index: 0,
            next_id: 0,
        }
    }

    /// Appends an event, assigning it the next id and evicting the oldest
    /// entry if the log is full. Mirrors `uw_trace_log_append_`.
    pub fn append(&mut self, event: TraceEvent, timestamp_seconds: u32) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.entries[self.next_index] = Some(Entry {
            id,
            timestamp: timestamp_seconds,
            event,
        });
        self.next_index = (self.next_index + 1) % self.entries.len();
    }

    /// Returns `(min_id, max_id)` currently held, or `None` if the log is
    /// still empty. Mirrors `uw_trace_log_get_range_`.
    pub fn range(&self) -> Option<(u32, u32)> {
        let capacity = self.entries.len();
        let last_index = (self.next_index + capacity - 1) % capacity;
        let last = self.entries[last_index]?;

        let min_id = match &self.entries[self.next_index] {
            None => self.entries[0]?.id,
            Some(next) => next.id,
        };
        Some((min_id, last.id))
    }

    /// Returns up to [`TRACE_DUMP_MAX_ENTRIES`] entries with ids in
    /// `[start_id, end_id]`, oldest first. Mirrors `find_entries_`.
    fn entries_in_range(&self, start_id: u32, end_id: u32) -> Vec<Entry> {
        let Some((min_id, max_id)) = self.range() else {
            return Vec::new();
        };
        if start_id >= end_id || start_id > max_id || end_id < min_id {
            return Vec::new();
        }

        let capacity = self.entries.len();
        let mut start_index = if self.entries[self.next_index].is_none() {
            0
        } else {
            self.next_index
        };
        let mut count = (max_id - min_id + 1) as usize;

        if end_id < max_id {
            count -= (max_id - end_id) as usize;
        }
        if start_id > min_id {
            let delta = (start_id - min_id) as usize;
            start_index = (start_index + delta) % capacity;
            count -= delta;
        }
        count = count.min(TRACE_DUMP_MAX_ENTRIES);

        (0..count)
            .filter_map(|i| self.entries[(start_index + i) % capacity])
            .collect()
    }

    /// Builds the `/debug/traceDump` document for ids `[start_id, end_id]`.
    pub fn dump(&self, start_id: u32, end_id: u32) -> TraceDump {
        TraceDump {
            encoded: self.entries_in_range(start_id, end_id).iter().map(Entry::encode).collect(),
        }
    }
}

/// A `CallbackArray` emitter over the selected range of entries, each
/// already flattened into its own owned key/value pairs.
pub struct TraceDump {
    encoded: Vec<Vec<(i64, Value<'static>)>>,
}

impl TraceDump {
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

impl ArrayEmitter for TraceDump {
    fn len(&self) -> usize {
        self.encoded.len()
    }

    fn entry(&self, index: usize) -> Value<'_> {
        Value::map(&self.encoded[index])
    }
}
