//! Shared leaf types for the uweave device core: the bounded [`Buffer`],
//! the [`Status`] error sum, time helpers, the [`Value`] document model, and
//! the CBOR codec built on top of it.

pub mod buffer;
pub mod cbor;
pub mod status;
pub mod time;
pub mod value;

pub use buffer::{Buffer, BufferView};
pub use status::{Result, Status};
pub use value::Value;
