//! The host-supplied radio collaborator (spec.md §1/§6): "the core consumes
//! an event queue and a can-write/write interface."
//!
//! Grounded on `original_source/include/uweave/provider/ble.h`
//! (`uwp_ble_read_event`, `uwp_ble_can_write_packet`, `uwp_ble_write_packet`):
//! the original's `Connected`/`Data`/`Disconnected` event sequence per
//! connection becomes [`RadioEvent`], and the two write-side functions
//! collapse into [`Radio::can_send`]/[`Radio::send`]. This crate drives one
//! connection at a time, so there is no connection handle to thread through.

use weave_common::status::Result;

/// One inbound occurrence a host's radio layer can report. A real BLE host
/// sees `Connected`, zero or more `Packet`s, then `Disconnected`, in that
/// order, for a given link-layer connection.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    Connected,
    Disconnected,
    Packet(Vec<u8>),
}

/// Polled, never blocking — yielding control on an empty queue or a full
/// send path is `handle_events`'s job, not this trait's.
pub trait Radio {
    fn try_recv_event(&self) -> Option<RadioEvent>;
    fn can_send(&self) -> bool;
    fn send(&self, packet: &[u8]) -> Result<()>;
}
