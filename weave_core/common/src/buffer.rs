//! A length-capped byte region with an append cursor.
//!
//! `original_source/src/buffer.c` wraps caller-owned storage and a cursor;
//! this reimplementation owns a `Vec<u8>` with a fixed `capacity` instead of
//! a raw pointer pair, and expresses the "slice aliases the parent" relation
//! of `uw_buffer_slice` as a borrow (`BufferView<'_>`) rather than a second
//! mutable pointer into the same memory.

use crate::status::{Result, Status};

/// An owned, capacity-bounded buffer with an append cursor.
///
/// Used for in: reassembled inbound messages, `/execute` reply payloads,
/// pairing commitments, and any other bounded scratch region.
#[derive(Debug, Clone)]
pub struct Buffer {
    capacity: usize,
    data: Vec<u8>,
}

impl Buffer {
    /// Creates an empty buffer that can never hold more than `capacity`
    /// bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Buffer {
            capacity,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Wraps already-produced bytes as a buffer, capped at their own length
    /// (no further appends will fit unless `reserve_capacity` grows it).
    pub fn from_vec(data: Vec<u8>) -> Self {
        let capacity = data.len();
        Buffer { capacity, data }
    }

    /// Resets the cursor to the start and clears all bytes, as
    /// `uw_buffer_reset` does (memset to zero, position to start).
    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes this buffer may ever hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently in use (the cursor position).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Appends `src` at the cursor. Fails with `Status::TooLong` rather than
    /// partially writing, matching `uw_buffer_append`'s all-or-nothing
    /// behavior.
    pub fn append(&mut self, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        if self.data.len() + src.len() > self.capacity {
            return Err(Status::TooLong);
        }
        self.data.extend_from_slice(src);
        Ok(())
    }

    /// Truncates or extends the logical length directly (`uw_buffer_set_length_`).
    /// `len` must not exceed `capacity`; newly exposed bytes beyond the old
    /// length are zero-filled.
    pub fn set_length(&mut self, len: usize) -> Result<()> {
        if len > self.capacity {
            return Err(Status::TooLong);
        }
        self.data.resize(len, 0);
        Ok(())
    }

    /// Borrows a sub-region `[start, start+len)` of the currently-used bytes.
    /// The view aliases the parent and cannot outlive it — enforced here by
    /// Rust's borrow checker rather than by convention.
    pub fn view(&self, start: usize, len: usize) -> Result<BufferView<'_>> {
        if start + len > self.data.len() {
            return Err(Status::InvalidInput);
        }
        Ok(BufferView {
            bytes: &self.data[start..start + len],
        })
    }

    pub fn view_all(&self) -> BufferView<'_> {
        BufferView { bytes: &self.data }
    }
}

/// A read-only view aliasing a sub-region of a parent [`Buffer`].
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    bytes: &'a [u8],
}

impl<'a> BufferView<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl<'a> From<&'a [u8]> for BufferView<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        BufferView { bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_respects_capacity() {
        let mut buf = Buffer::with_capacity(4);
        buf.append(&[1, 2]).unwrap();
        buf.append(&[3, 4]).unwrap();
        assert_eq!(buf.as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(buf.append(&[5]), Err(Status::TooLong));
    }

    #[test]
    fn reset_clears_cursor() {
        let mut buf = Buffer::with_capacity(4);
        buf.append(&[9, 9]).unwrap();
        buf.reset();
        assert_eq!(buf.len(), 0);
        buf.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn view_aliases_in_range() {
        let mut buf = Buffer::with_capacity(8);
        buf.append(&[1, 2, 3, 4, 5]).unwrap();
        let view = buf.view(1, 3).unwrap();
        assert_eq!(view.as_bytes(), &[2, 3, 4]);
        assert!(buf.view(1, 10).is_err());
    }
}
