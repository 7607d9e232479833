//! Inbound message reassembly from a stream of packets (spec.md §4.1).
//!
//! Grounded on `original_source/src/message_in.c`: a message starts Empty,
//! becomes Busy on its first packet, and reaches Complete on its last one;
//! once Complete it must be reset before another message can be appended.
//! The first/last flags only apply to data messages — every control
//! message is exactly one packet, so it is first and last at once.

use weave_common::buffer::{Buffer, BufferView};
use weave_common::status::{Result, Status};

use crate::message::{MessageState, MessageType};
use crate::packet_header;

fn message_type_of(header: u8) -> MessageType {
    if packet_header::is_data(header) {
        return MessageType::Data;
    }
    match packet_header::command_number(header) {
        0x0 => MessageType::ConnectionRequest,
        0x1 => MessageType::ConnectionConfirm,
        0x2 => MessageType::Error,
        _ => MessageType::Unknown,
    }
}

/// An inbound message being reassembled from packets, paired 1:1 with a
/// [`crate::message_out::MessageOut`] inside a [`crate::channel::Channel`].
#[derive(Debug)]
pub struct MessageIn {
    buffer: Buffer,
    state: MessageState,
    message_type: MessageType,
    read_pos: usize,
}

impl MessageIn {
    pub fn new(capacity: usize) -> Self {
        MessageIn {
            buffer: Buffer::with_capacity(capacity),
            state: MessageState::Empty,
            message_type: MessageType::Unknown,
            read_pos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
        self.state = MessageState::Empty;
        self.message_type = MessageType::Unknown;
        self.read_pos = 0;
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Appends one packet's payload (the header byte already stripped) and
    /// returns the new state. Mirrors `uw_message_in_append_packet_`.
    pub fn append_packet(&mut self, header: u8, data: &[u8]) -> MessageState {
        let message_type = message_type_of(header);
        let (first, last) = if message_type == MessageType::Data {
            (packet_header::is_first(header), packet_header::is_last(header))
        } else {
            (true, true)
        };

        if self.state == MessageState::Complete {
            self.state = MessageState::Error;
        } else if first && self.state != MessageState::Empty {
            self.state = MessageState::Error;
        } else if !first && self.state == MessageState::Empty {
            self.state = MessageState::Error;
        } else if self.buffer.append(data).is_ok() {
            self.message_type = message_type;
            self.state = if last { MessageState::Complete } else { MessageState::Busy };
        } else {
            self.state = MessageState::Error;
        }

        self.state
    }

    fn require_complete(&self) -> Result<()> {
        if self.state != MessageState::Complete {
            return Err(Status::InvalidArgument);
        }
        Ok(())
    }

    /// Reads one byte at the current read position and advances it.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require_complete()?;
        let byte = *self.buffer.as_bytes().get(self.read_pos).ok_or(Status::InvalidArgument)?;
        self.read_pos += 1;
        Ok(byte)
    }

    /// Reads a big-endian `u16` at the current read position and advances
    /// it.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.require_complete()?;
        let bytes = self.buffer.as_bytes();
        if self.read_pos + 2 > bytes.len() {
            return Err(Status::InvalidArgument);
        }
        let value = u16::from_be_bytes([bytes[self.read_pos], bytes[self.read_pos + 1]]);
        self.read_pos += 2;
        Ok(value)
    }

    /// Borrows everything from the current read position to the end of the
    /// message, aliasing this message's buffer. Mirrors
    /// `uw_message_in_read_remaining_bytes_`.
    pub fn read_remaining(&self) -> Result<BufferView<'_>> {
        self.require_complete()?;
        self.buffer.view(self.read_pos, self.buffer.len() - self.read_pos)
    }
}
