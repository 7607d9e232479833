//! RPC dispatch: per-connection session state, the small CBOR envelope
//! every decrypted message carries, and the handlers for each `/`-prefixed
//! method (spec.md §4/§6).
//!
//! This crate sits above `weave_device` and `weave_crypto`/`weave_macaroon`:
//! it owns the protocol-level behavior (what `/auth` does with a macaroon,
//! what `/execute` does with a command slot) but not the state those
//! behaviors operate over, and not the packet framing that delivers a
//! decrypted message here in the first place (`weave_transport`).

pub mod dispatch;
pub mod envelope;
pub mod handlers;
pub mod keys;
pub mod session;

pub use dispatch::{dispatch, Context, Outcome};
pub use session::{Phase, Session};
