//! Outbound message splitting into packets (spec.md §4.1).
//!
//! Grounded on `original_source/src/message_out.c`. A control message must
//! fit in a single packet; [`MessageOut::get_next_packet`] enters the error
//! state if asked to split one across two.

use weave_common::buffer::Buffer;
use weave_common::status::Result;

use crate::message::{message_type_to_header_cmd, MessageState, MessageType};
use crate::packet_header;

/// An outbound message being split into packets, paired 1:1 with a
/// [`crate::message_in::MessageIn`] inside a [`crate::channel::Channel`].
#[derive(Debug)]
pub struct MessageOut {
    buffer: Buffer,
    state: MessageState,
    message_type: MessageType,
    packet_offset: usize,
}

impl MessageOut {
    pub fn new(capacity: usize) -> Self {
        MessageOut {
            buffer: Buffer::with_capacity(capacity),
            state: MessageState::Empty,
            message_type: MessageType::Unknown,
            packet_offset: 0,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
        self.state = MessageState::Empty;
        self.message_type = MessageType::Unknown;
        self.packet_offset = 0;
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn append_u8(&mut self, data: u8) -> Result<()> {
        self.buffer.append(&[data])
    }

    pub fn append_u16(&mut self, data: u16) -> Result<()> {
        self.buffer.append(&data.to_be_bytes())
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.append(bytes)
    }

    /// Marks the start of assembly for a new outbound message. The
    /// `debug_assert!`s below mirror the original's `UW_ASSERT`s, which
    /// compile away to nothing (and leave the call proceeding as if the
    /// invariant held) in an `NDEBUG` build.
    pub fn start(&mut self, message_type: MessageType) {
        debug_assert!(self.message_type == MessageType::Unknown, "message type must be unknown");
        debug_assert!(self.buffer.is_empty(), "message_out already in use");
        debug_assert!(self.packet_offset == 0, "expected packet offset of zero");
        self.message_type = message_type;
    }

    /// Marks the message ready to send, transitioning Empty to Busy.
    pub fn ready(&mut self) {
        debug_assert!(self.state == MessageState::Empty, "expected message_out to be empty");
        debug_assert!(self.message_type != MessageType::Unknown, "expected message type to be known");
        debug_assert!(self.packet_offset == 0, "expected packet offset of zero");
        self.state = MessageState::Busy;
    }

    /// Cancels an in-progress [`Self::start`].
    pub fn discard(&mut self) {
        debug_assert!(self.state == MessageState::Empty, "expected message_out to be empty");
        debug_assert!(self.message_type != MessageType::Unknown, "expected message type to be known");
        debug_assert!(self.packet_offset == 0, "expected packet offset of zero");
        self.buffer.reset();
        self.message_type = MessageType::Unknown;
    }

    /// Writes the next packet of this message into `packet_buffer`.
    /// Mirrors `uw_message_out_get_next_packet_`.
    pub fn get_next_packet(&mut self, packet_buffer: &mut Buffer, max_packet_size: usize, packet_counter: u8) -> MessageState {
        if !packet_buffer.is_empty() || self.state != MessageState::Busy || packet_buffer.capacity() < max_packet_size {
            self.state = MessageState::Error;
            return self.state;
        }

        let message_length = self.buffer.len();
        let mut packet_data_length = max_packet_size - 1;
        let message_length_remaining = message_length - self.packet_offset;
        let is_last = message_length_remaining <= packet_data_length;
        if is_last {
            packet_data_length = message_length_remaining;
        }

        let header = if self.message_type == MessageType::Data {
            packet_header::new_data(self.packet_offset == 0, is_last, packet_counter)
        } else {
            if !is_last {
                self.state = MessageState::Error;
                return self.state;
            }
            packet_header::new_control(message_type_to_header_cmd(self.message_type), packet_counter)
        };

        let payload_start = self.packet_offset;
        let payload_end = payload_start + packet_data_length;

        if packet_buffer.append(&[header]).is_err()
            || packet_buffer.append(&self.buffer.as_bytes()[payload_start..payload_end]).is_err()
        {
            self.state = MessageState::Error;
            return self.state;
        }

        self.packet_offset += packet_data_length;
        self.state = if is_last { MessageState::Complete } else { MessageState::Busy };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_data_message(payload: &[u8]) -> MessageOut {
        let mut msg = MessageOut::new(64);
        msg.start(MessageType::Data);
        msg.append_bytes(payload).unwrap();
        msg.ready();
        msg
    }

    #[test]
    fn single_packet_fits_whole_message() {
        let mut msg = ready_data_message(&[1, 2, 3]);
        let mut packet = Buffer::with_capacity(20);
        assert_eq!(msg.get_next_packet(&mut packet, 20, 0), MessageState::Complete);
        assert_eq!(packet.as_bytes()[0] & 0x0C, 0x0C); // first and last
        assert_eq!(&packet.as_bytes()[1..], &[1, 2, 3]);
    }

    #[test]
    fn message_splits_across_multiple_packets() {
        let payload = [0u8; 10];
        let mut msg = ready_data_message(&payload);
        let mut packet1 = Buffer::with_capacity(6);
        assert_eq!(msg.get_next_packet(&mut packet1, 6, 0), MessageState::Busy);
        assert_eq!(packet1.len(), 6); // 1 header + 5 payload

        let mut packet2 = Buffer::with_capacity(6);
        assert_eq!(msg.get_next_packet(&mut packet2, 6, 1), MessageState::Complete);
        assert_eq!(packet2.len(), 6);
    }

    #[test]
    fn control_message_must_fit_one_packet() {
        let mut msg = MessageOut::new(64);
        msg.start(MessageType::ConnectionConfirm);
        msg.append_bytes(&[0u8; 20]).unwrap();
        msg.ready();

        let mut packet = Buffer::with_capacity(6);
        assert_eq!(msg.get_next_packet(&mut packet, 6, 0), MessageState::Error);
    }
}
