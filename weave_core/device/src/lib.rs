//! Device-side state: identity/keys, persisted settings, command slots,
//! counters, the trace log, and the BLE advertising payload builder.
//!
//! This crate owns everything in spec.md §3/§4.9-§4.11 that is not itself
//! wire protocol (framing, handshake, crypto session) or RPC dispatch —
//! those live in `weave_transport` and `weave_dispatch`, which depend on
//! this crate for the state they operate over.

pub mod advertising;
pub mod command;
pub mod config;
pub mod counters;
pub mod crypto;
pub mod settings;
pub mod storage;
pub mod trace;
