//! The device side of a single BLE connection: connection-request handling
//! and packet size negotiation, layered over a [`Channel`] (spec.md §4.2).
//!
//! Grounded on `original_source/src/device_channel.c`. The original wires
//! two function pointers (`handshake_config`, `reset_config`) into its
//! channel; here those become the [`Handshake`] and [`ConnectionObserver`]
//! traits, supplied as type parameters of [`DeviceChannel`].

use crate::channel::Channel;
use crate::message::MessageType;

/// Performs the encrypted session handshake carried inside a connection
/// request/confirm exchange. Implemented by `weave_dispatch`.
pub trait Handshake {
    /// Reads `request` and appends the reply bytes to `confirm`. Returns
    /// whether the handshake succeeded; on failure the connection is
    /// rejected with an empty `Error` control message.
    fn exchange(&mut self, request: weave_common::buffer::BufferView<'_>, confirm: &mut weave_common::buffer::Buffer) -> bool;
}

/// Notified when a connection is torn down, so a higher layer can drop any
/// session state tied to it.
pub trait ConnectionObserver {
    fn on_reset(&mut self);
}

#[derive(Debug)]
pub struct DeviceChannel<H, O> {
    channel: Channel,
    handshake: H,
    observer: O,
    did_connection_request: bool,
}

impl<H: Handshake, O: ConnectionObserver> DeviceChannel<H, O> {
    pub fn new(channel: Channel, handshake: H, observer: O) -> Self {
        DeviceChannel {
            channel,
            handshake,
            observer,
            did_connection_request: false,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    fn session_reset(&mut self) {
        self.did_connection_request = false;
        self.observer.on_reset();
    }

    /// Tears down the connection entirely: packet counters, buffers, and
    /// connection state. Mirrors `uw_device_channel_reset_`.
    pub fn reset(&mut self) {
        self.session_reset();
        self.channel.reset();
    }

    /// Clears the message buffers between two RPC exchanges on the same
    /// connection, preserving packet counters. Mirrors
    /// `uw_device_channel_complete_exchange_`.
    pub fn complete_exchange(&mut self) {
        self.channel.reset_messages();
    }

    pub fn is_connected(&self) -> bool {
        self.did_connection_request
    }

    /// Feeds one packet into the channel, dispatching to the control-packet
    /// handler once a full message has been reassembled. Mirrors
    /// `uw_channel_append_packet_in_` plus `handle_message_in_`.
    pub fn append_packet_in(&mut self, packet: &[u8]) -> bool {
        if !self.channel.append_packet_in(packet) {
            return false;
        }
        if self.channel.message_in().state() == crate::message::MessageState::Complete {
            return self.handle_message_in();
        }
        true
    }

    pub fn get_next_packet_out(&mut self, packet_buffer: &mut weave_common::buffer::Buffer) -> bool {
        self.channel.get_next_packet_out(packet_buffer)
    }

    fn handle_message_in(&mut self) -> bool {
        match self.channel.message_in().message_type() {
            MessageType::Data => {
                if !self.did_connection_request {
                    return false;
                }
                true
            }
            MessageType::ConnectionRequest => {
                if self.did_connection_request {
                    self.session_reset();
                }
                self.handle_connection_request()
            }
            MessageType::ConnectionConfirm | MessageType::Error | MessageType::Unknown => false,
        }
    }

    /// Parses a connection request, negotiates the packet size, runs the
    /// handshake, and builds the reply. Mirrors
    /// `handle_connection_request_`.
    fn handle_connection_request(&mut self) -> bool {
        let min_version = self.channel.message_in_mut().read_u16();
        let max_version = self.channel.message_in_mut().read_u16();
        let client_max_packet_size = self.channel.message_in_mut().read_u16();

        let (min_version, _max_version, client_max_packet_size) = match (min_version, max_version, client_max_packet_size) {
            (Ok(mi), Ok(ma), Ok(sz)) => (mi, ma, sz),
            _ => return false,
        };

        if min_version != 1 || client_max_packet_size < 20 {
            return false;
        }

        let negotiated_size = if (client_max_packet_size as usize) < self.channel.max_packet_size() {
            self.channel.set_max_packet_size(client_max_packet_size as usize);
            client_max_packet_size as usize
        } else {
            self.channel.max_packet_size()
        };

        let (message_in, message_out) = self.channel.split_in_out_mut();
        let request_view = match message_in.read_remaining() {
            Ok(view) => view,
            Err(_) => return false,
        };

        message_out.start(MessageType::ConnectionConfirm);
        if message_out.append_u16(min_version).is_err() || message_out.append_u16(negotiated_size as u16).is_err() {
            return false;
        }

        let handshake_result = self.handshake.exchange(request_view, message_out.buffer_mut());

        if handshake_result {
            message_out.ready();
        } else {
            message_out.discard();
            message_out.start(MessageType::Error);
            message_out.ready();
        }

        self.did_connection_request = handshake_result;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::buffer::{Buffer, BufferView};

    struct AcceptingHandshake;
    impl Handshake for AcceptingHandshake {
        fn exchange(&mut self, _request: BufferView<'_>, confirm: &mut Buffer) -> bool {
            confirm.append(&[0xAA, 0xBB]).is_ok()
        }
    }

    struct RejectingHandshake;
    impl Handshake for RejectingHandshake {
        fn exchange(&mut self, _request: BufferView<'_>, _confirm: &mut Buffer) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        resets: usize,
    }
    impl ConnectionObserver for CountingObserver {
        fn on_reset(&mut self) {
            self.resets += 1;
        }
    }

    fn connection_request_packet(min_version: u16, max_version: u16, max_packet_size: u16, extra: &[u8]) -> Vec<u8> {
        let header = crate::packet_header::new_control(crate::packet_header::HeaderCmd::ConnectionRequest, 0);
        let mut packet = vec![header];
        packet.extend_from_slice(&min_version.to_be_bytes());
        packet.extend_from_slice(&max_version.to_be_bytes());
        packet.extend_from_slice(&max_packet_size.to_be_bytes());
        packet.extend_from_slice(extra);
        packet
    }

    #[test]
    fn successful_connection_request_connects_and_negotiates_size() {
        let channel = Channel::new(30, 64, 64);
        let mut device = DeviceChannel::new(channel, AcceptingHandshake, CountingObserver::default());
        let packet = connection_request_packet(1, 1, 20, &[0xCC]);
        assert!(device.append_packet_in(&packet));
        assert!(device.is_connected());
        assert_eq!(device.channel().max_packet_size(), 20);
    }

    #[test]
    fn failed_handshake_rejects_connection() {
        let channel = Channel::new(30, 64, 64);
        let mut device = DeviceChannel::new(channel, RejectingHandshake, CountingObserver::default());
        let packet = connection_request_packet(1, 1, 20, &[]);
        assert!(device.append_packet_in(&packet));
        assert!(!device.is_connected());
    }

    #[test]
    fn unsupported_min_version_is_rejected() {
        let channel = Channel::new(30, 64, 64);
        let mut device = DeviceChannel::new(channel, AcceptingHandshake, CountingObserver::default());
        let packet = connection_request_packet(2, 1, 20, &[]);
        assert!(!device.append_packet_in(&packet));
        assert!(!device.is_connected());
    }

    #[test]
    fn data_before_connection_request_is_rejected() {
        let channel = Channel::new(30, 64, 64);
        let mut device = DeviceChannel::new(channel, AcceptingHandshake, CountingObserver::default());
        let header = crate::packet_header::new_data(true, true, 0);
        assert!(!device.append_packet_in(&[header, 1, 2]));
    }

    #[test]
    fn second_connection_request_resets_session_first() {
        let channel = Channel::new(30, 64, 64);
        let mut device = DeviceChannel::new(channel, AcceptingHandshake, CountingObserver::default());
        let packet = connection_request_packet(1, 1, 20, &[]);
        assert!(device.append_packet_in(&packet));
        device.channel_mut().reset_messages();
        // A second, independent connection request.
        let mut channel2 = Channel::new(30, 64, 64);
        std::mem::swap(device.channel_mut(), &mut channel2);
        let packet2 = connection_request_packet(1, 1, 20, &[]);
        assert!(device.append_packet_in(&packet2));
        assert_eq!(device.observer.resets, 1);
    }
}
