//! A minimal CBOR codec for a restricted profile: ints, int64, byte-strings,
//! text strings, bool, null, undefined, float32/64, and finite
//! (definite-length) maps and arrays. Map keys are always small integers.
//!
//! There is no support for indefinite-length items, tags, or bignums —
//! the device core never needs to produce or accept them, and rejecting
//! them outright keeps the decoder's recursion bounded and simple.

pub mod decode;
pub mod encode;

pub use decode::{ArrayRef, Decoder, Item, MapRef};
pub use encode::{encode_to_buffer, Encoder};
