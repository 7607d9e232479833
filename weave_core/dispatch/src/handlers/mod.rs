//! Per-RPC handler functions, one module per `/`-prefixed method in
//! spec.md §4. Each handler takes its dependencies as explicit arguments
//! and returns the CBOR `result` map to embed in the reply envelope;
//! dispatch-wide concerns (role checks, encryption gating shared across
//! handlers, envelope framing) live in `crate::dispatch` and `crate::envelope`.

pub mod access_control;
pub mod auth;
pub mod debug;
pub mod execute;
pub mod info;
pub mod pairing;
pub mod setup;
pub mod state;
