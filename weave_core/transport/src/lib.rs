//! Packet-level framing and the outer device handshake (spec.md §4.1-§4.2).
//!
//! This crate knows nothing about RPC payloads or encryption; it reassembles
//! inbound packets into messages, splits outbound messages into packets, and
//! negotiates packet size on a fresh connection. Everything past that —
//! the encrypted session handshake, RPC dispatch — lives in
//! `weave_dispatch`, which drives a [`device_channel::DeviceChannel`] by
//! implementing its [`device_channel::Handshake`] trait.

pub mod channel;
pub mod device_channel;
pub mod message;
pub mod message_in;
pub mod message_out;
pub mod packet_header;
