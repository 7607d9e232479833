//! Bookkeeping types shared by inbound and outbound message assembly.
//!
//! Grounded on `original_source/src/message.h`.

use crate::packet_header::HeaderCmd;

/// `UW_MESSAGE_CONN_REQUEST_MAX_DATA`.
pub const CONNECTION_REQUEST_MAX_DATA_LEN: usize = 13;
/// `UW_MESSAGE_CONN_CONFIRM_MAX_DATA`.
pub const CONNECTION_CONFIRM_MAX_DATA_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Error,
    Empty,
    Busy,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Unknown,
    ConnectionRequest,
    ConnectionConfirm,
    Error,
    Data,
}

/// Mirrors `uw_message_type_to_header_cmd_`. Only the three control types
/// build a control header; data/unknown messages never reach this path.
pub fn message_type_to_header_cmd(message_type: MessageType) -> HeaderCmd {
    match message_type {
        MessageType::ConnectionRequest => HeaderCmd::ConnectionRequest,
        MessageType::ConnectionConfirm => HeaderCmd::ConnectionConfirm,
        MessageType::Error => HeaderCmd::Error,
        MessageType::Unknown | MessageType::Data => {
            unreachable!("data/unknown messages never build a control header")
        }
    }
}
