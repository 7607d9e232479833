//! Tagged value model used to describe an outbound CBOR document without
//! copying, including callback-driven map/array emitters for incremental
//! encoding (a visitor/emit contract, in preference to raw function
//! pointers plus a void context).
//!
//! `Value<'a>` only needs to support *encoding*; the decode direction uses
//! the lazy, borrow-only cursor types in [`crate::cbor::decode`] instead
//! (mirroring how the original's `value_scan.c` never builds a generic tree
//! on the way in, it scans directly for the caller's expected fields).

/// A document fragment to be CBOR-encoded.
///
/// Map keys in this system are always small integers, so [`Value::Map`] is
/// `&[(i64, Value)]` rather than a generic key type.
#[derive(Clone, Copy)]
pub enum Value<'a> {
    Int(i32),
    Int64(i64),
    ByteString(&'a [u8]),
    Text(&'a str),
    Bool(bool),
    Null,
    Undefined,
    Float32(f32),
    Float64(f64),
    Array(&'a [Value<'a>]),
    Map(&'a [(i64, Value<'a>)]),
    /// Already-encoded CBOR bytes, spliced in verbatim.
    BinaryCbor(&'a [u8]),
    /// A dynamically-sized map whose entries are produced lazily.
    CallbackMap(&'a dyn MapEmitter),
    /// A dynamically-sized array whose entries are produced lazily.
    CallbackArray(&'a dyn ArrayEmitter),
}

impl<'a> Value<'a> {
    pub fn map(entries: &'a [(i64, Value<'a>)]) -> Self {
        Value::Map(entries)
    }

    pub fn array(items: &'a [Value<'a>]) -> Self {
        Value::Array(items)
    }
}

/// Incremental producer of a map's entries, invoked index-by-index during
/// encoding so the full set of entries never needs to live in memory at
/// once (e.g. a counter set's vendor metrics).
pub trait MapEmitter {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Returns the key/value pair for `index` (`0 <= index < self.len()`).
    fn entry(&self, index: usize) -> (i64, Value<'_>);
}

/// Incremental producer of an array's elements; see [`MapEmitter`].
pub trait ArrayEmitter {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn entry(&self, index: usize) -> Value<'_>;
}

/// A `MapEmitter` backed by an already-materialized slice of pairs; useful
/// when the caller already has a `Vec` but wants the callback path anyway
/// (e.g. because the value count was only known at runtime).
pub struct SliceMapEmitter<'a>(pub &'a [(i64, Value<'a>)]);

impl<'a> MapEmitter for SliceMapEmitter<'a> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn entry(&self, index: usize) -> (i64, Value<'_>) {
        self.0[index]
    }
}
