//! Packet-counter bookkeeping layered over a [`MessageIn`]/[`MessageOut`]
//! pair (spec.md §4.1).
//!
//! Grounded on `original_source/src/channel.c`. Unlike the original, this
//! does not invoke a completion callback from [`Channel::append_packet_in`];
//! callers inspect `message_in().state()` themselves, which is what lets
//! [`crate::device_channel::DeviceChannel`] own that decision instead of a
//! function pointer reaching back into it.

use weave_common::buffer::Buffer;

use crate::message_in::MessageIn;
use crate::message_out::MessageOut;
use crate::message::MessageState;
use crate::packet_header;

#[derive(Debug)]
pub struct Channel {
    max_packet_size: usize,
    packet_in_counter: u8,
    message_in: MessageIn,
    packet_out_counter: u8,
    message_out: MessageOut,
}

impl Channel {
    pub fn new(max_packet_size: usize, in_capacity: usize, out_capacity: usize) -> Self {
        Channel {
            max_packet_size,
            packet_in_counter: 0,
            message_in: MessageIn::new(in_capacity),
            packet_out_counter: 0,
            message_out: MessageOut::new(out_capacity),
        }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.max_packet_size = max_packet_size;
    }

    pub fn message_in(&self) -> &MessageIn {
        &self.message_in
    }

    pub fn message_out(&self) -> &MessageOut {
        &self.message_out
    }

    pub fn message_out_mut(&mut self) -> &mut MessageOut {
        &mut self.message_out
    }

    pub fn message_in_mut(&mut self) -> &mut MessageIn {
        &mut self.message_in
    }

    /// Borrows `message_in` and `message_out` disjointly from a single
    /// `&mut self`, which two separate accessor calls cannot do.
    pub fn split_in_out_mut(&mut self) -> (&MessageIn, &mut MessageOut) {
        (&self.message_in, &mut self.message_out)
    }

    pub fn reset_messages(&mut self) {
        self.message_in.reset();
        self.message_out.reset();
    }

    pub fn reset(&mut self) {
        self.packet_in_counter = 0;
        self.packet_out_counter = 0;
        self.reset_messages();
    }

    /// Validates the packet counter, appends the payload to `message_in`,
    /// and returns whether the packet was accepted. Mirrors
    /// `uw_channel_append_packet_in_`, minus its completion callback.
    pub fn append_packet_in(&mut self, packet: &[u8]) -> bool {
        let Some((&header, data)) = packet.split_first() else {
            return false;
        };
        if packet_header::counter(header) != self.packet_in_counter {
            return false;
        }
        self.packet_in_counter = (self.packet_in_counter + 1) % 8;
        self.message_in.append_packet(header, data) != MessageState::Error
    }

    /// Writes the next outbound packet into `packet_buffer`. Mirrors
    /// `uw_channel_get_next_packet_out_`: the counter always advances, even
    /// on failure.
    pub fn get_next_packet_out(&mut self, packet_buffer: &mut Buffer) -> bool {
        let max_packet_size = self.max_packet_size;
        let counter = self.packet_out_counter;
        let state = self.message_out.get_next_packet(packet_buffer, max_packet_size, counter);
        self.packet_out_counter = (self.packet_out_counter + 1) % 8;
        state != MessageState::Error
    }
}
