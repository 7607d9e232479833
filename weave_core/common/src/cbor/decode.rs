//! A lazy, zero-copy CBOR reader.
//!
//! Rather than building a generic tree (which would force copying byte- and
//! text-strings out of the wire buffer), arrays and maps are represented as
//! cursors (`ArrayRef`/`MapRef`) over their still-encoded contents. This
//! mirrors `original_source/src/value_scan.c`'s approach of scanning
//! directly for expected fields instead of materializing a document.

use crate::status::{Result, Status};

const MAJOR_UINT: u8 = 0;
const MAJOR_NEGINT: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;
const SIMPLE_F32: u8 = 26;
const SIMPLE_F64: u8 = 27;

/// One decoded CBOR item. Composite items (`Array`/`Map`) are cursors into
/// the remaining bytes, not recursively-parsed trees.
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
    Int(i64),
    /// A non-negative integer too large to fit in `i64`.
    UInt64(u64),
    Bytes(&'a [u8]),
    Text(&'a str),
    Bool(bool),
    Null,
    Undefined,
    F32(f32),
    F64(f64),
    Array(ArrayRef<'a>),
    Map(MapRef<'a>),
}

impl<'a> Item<'a> {
    pub fn as_i64(&self) -> Result<i64> {
        match *self {
            Item::Int(v) => Ok(v),
            _ => Err(Status::ValueTypeMismatch),
        }
    }

    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        match *self {
            Item::Bytes(b) => Ok(b),
            _ => Err(Status::ValueTypeMismatch),
        }
    }

    pub fn as_text(&self) -> Result<&'a str> {
        match *self {
            Item::Text(t) => Ok(t),
            _ => Err(Status::ValueTypeMismatch),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Item::Bool(b) => Ok(b),
            _ => Err(Status::ValueTypeMismatch),
        }
    }

    pub fn as_map(&self) -> Result<MapRef<'a>> {
        match *self {
            Item::Map(m) => Ok(m),
            _ => Err(Status::ValueTypeMismatch),
        }
    }

    pub fn as_array(&self) -> Result<ArrayRef<'a>> {
        match *self {
            Item::Array(a) => Ok(a),
            _ => Err(Status::ValueTypeMismatch),
        }
    }
}

/// A cursor over a definite-length CBOR map's still-encoded key/value pairs.
#[derive(Debug, Clone, Copy)]
pub struct MapRef<'a> {
    buf: &'a [u8],
    start: usize,
    len: u64,
}

impl<'a> MapRef<'a> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Scans entries in order for an integer key, returning its value if
    /// present. Entries are otherwise skipped without allocating.
    pub fn get(&self, key: i64) -> Result<Option<Item<'a>>> {
        for entry in self.iter() {
            let (k, v) = entry?;
            if k == key {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    pub fn iter(&self) -> MapIter<'a> {
        MapIter {
            buf: self.buf,
            pos: self.start,
            remaining: self.len,
        }
    }
}

pub struct MapIter<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: u64,
}

impl<'a> Iterator for MapIter<'a> {
    type Item = Result<(i64, Item<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let (key_item, pos) = match parse_item_at(self.buf, self.pos) {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        let key = match key_item.as_i64() {
            Ok(k) => k,
            Err(e) => return Some(Err(e)),
        };
        let (value_item, pos) = match parse_item_at(self.buf, pos) {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        self.pos = pos;
        Some(Ok((key, value_item)))
    }
}

/// A cursor over a definite-length CBOR array's still-encoded elements.
#[derive(Debug, Clone, Copy)]
pub struct ArrayRef<'a> {
    buf: &'a [u8],
    start: usize,
    len: u64,
}

impl<'a> ArrayRef<'a> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> ArrayIter<'a> {
        ArrayIter {
            buf: self.buf,
            pos: self.start,
            remaining: self.len,
        }
    }
}

pub struct ArrayIter<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: u64,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Result<Item<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match parse_item_at(self.buf, self.pos) {
            Ok((item, pos)) => {
                self.pos = pos;
                Some(Ok(item))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Top-level decoder: call [`Decoder::read_item`] once per document.
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, pos: 0 }
    }

    pub fn read_item(&mut self) -> Result<Item<'a>> {
        let (item, pos) = parse_item_at(self.buf, self.pos)?;
        self.pos = pos;
        Ok(item)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

fn read_argument(buf: &[u8], pos: usize, additional: u8) -> Result<(u64, usize)> {
    match additional {
        0..=23 => Ok((additional as u64, pos)),
        24 => {
            let b = *buf.get(pos).ok_or(Status::ValueInvalidInput)?;
            Ok((b as u64, pos + 1))
        }
        25 => {
            let bytes: [u8; 2] = buf
                .get(pos..pos + 2)
                .ok_or(Status::ValueInvalidInput)?
                .try_into()
                .unwrap();
            Ok((u16::from_be_bytes(bytes) as u64, pos + 2))
        }
        26 => {
            let bytes: [u8; 4] = buf
                .get(pos..pos + 4)
                .ok_or(Status::ValueInvalidInput)?
                .try_into()
                .unwrap();
            Ok((u32::from_be_bytes(bytes) as u64, pos + 4))
        }
        27 => {
            let bytes: [u8; 8] = buf
                .get(pos..pos + 8)
                .ok_or(Status::ValueInvalidInput)?
                .try_into()
                .unwrap();
            Ok((u64::from_be_bytes(bytes), pos + 8))
        }
        _ => Err(Status::ValueEncodingTypeUnsupported),
    }
}

fn parse_item_at(buf: &[u8], pos: usize) -> Result<(Item<'_>, usize)> {
    let head = *buf.get(pos).ok_or(Status::ValueInvalidInput)?;
    let major = head >> 5;
    let additional = head & 0x1f;
    let pos = pos + 1;

    match major {
        MAJOR_UINT => {
            let (value, pos) = read_argument(buf, pos, additional)?;
            let item = if value <= i64::MAX as u64 {
                Item::Int(value as i64)
            } else {
                Item::UInt64(value)
            };
            Ok((item, pos))
        }
        MAJOR_NEGINT => {
            let (value, pos) = read_argument(buf, pos, additional)?;
            // CBOR negint encodes -(value + 1).
            let magnitude = (value as i128) + 1;
            if magnitude > -(i64::MIN as i128) {
                return Err(Status::ValueInvalidInput);
            }
            Ok((Item::Int(-magnitude as i64), pos))
        }
        MAJOR_BYTES => {
            let (len, pos) = read_argument(buf, pos, additional)?;
            let len = usize::try_from(len).map_err(|_| Status::ValueInvalidInput)?;
            let bytes = buf.get(pos..pos + len).ok_or(Status::ValueInvalidInput)?;
            Ok((Item::Bytes(bytes), pos + len))
        }
        MAJOR_TEXT => {
            let (len, pos) = read_argument(buf, pos, additional)?;
            let len = usize::try_from(len).map_err(|_| Status::ValueInvalidInput)?;
            let bytes = buf.get(pos..pos + len).ok_or(Status::ValueInvalidInput)?;
            let text = std::str::from_utf8(bytes).map_err(|_| Status::ValueInvalidInput)?;
            Ok((Item::Text(text), pos + len))
        }
        MAJOR_ARRAY => {
            let (len, body_start) = read_argument(buf, pos, additional)?;
            let mut cursor = body_start;
            for _ in 0..len {
                let (_, next) = parse_item_at(buf, cursor)?;
                cursor = next;
            }
            Ok((
                Item::Array(ArrayRef {
                    buf,
                    start: body_start,
                    len,
                }),
                cursor,
            ))
        }
        MAJOR_MAP => {
            let (len, body_start) = read_argument(buf, pos, additional)?;
            let mut cursor = body_start;
            for _ in 0..len {
                let (_, next) = parse_item_at(buf, cursor)?; // key
                let (_, next) = parse_item_at(buf, next)?; // value
                cursor = next;
            }
            Ok((
                Item::Map(MapRef {
                    buf,
                    start: body_start,
                    len,
                }),
                cursor,
            ))
        }
        MAJOR_SIMPLE => match additional {
            SIMPLE_FALSE => Ok((Item::Bool(false), pos)),
            SIMPLE_TRUE => Ok((Item::Bool(true), pos)),
            SIMPLE_NULL => Ok((Item::Null, pos)),
            SIMPLE_UNDEFINED => Ok((Item::Undefined, pos)),
            SIMPLE_F32 => {
                let bytes: [u8; 4] = buf
                    .get(pos..pos + 4)
                    .ok_or(Status::ValueInvalidInput)?
                    .try_into()
                    .unwrap();
                Ok((Item::F32(f32::from_be_bytes(bytes)), pos + 4))
            }
            SIMPLE_F64 => {
                let bytes: [u8; 8] = buf
                    .get(pos..pos + 8)
                    .ok_or(Status::ValueInvalidInput)?
                    .try_into()
                    .unwrap();
                Ok((Item::F64(f64::from_be_bytes(bytes)), pos + 8))
            }
            _ => Err(Status::ValueEncodingTypeUnsupported),
        },
        _ => Err(Status::ValueEncodingTypeUnsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::encode::encode_to_buffer;
    use crate::value::Value;

    #[test]
    fn decodes_nested_map_and_array() {
        let inner = [Value::Int(1), Value::Int(2), Value::Int(3)];
        let entries = [
            (0i64, Value::Text("hello")),
            (1i64, Value::array(&inner)),
            (2i64, Value::Bool(true)),
        ];
        let buf = encode_to_buffer(&Value::map(&entries), 64).unwrap();

        let mut dec = Decoder::new(buf.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();
        assert_eq!(map.get(0).unwrap().unwrap().as_text().unwrap(), "hello");
        assert!(map.get(2).unwrap().unwrap().as_bool().unwrap());

        let array = map.get(1).unwrap().unwrap().as_array().unwrap();
        let collected: Vec<i64> = array.iter().map(|r| r.unwrap().as_i64().unwrap()).collect();
        assert_eq!(collected, vec![1, 2, 3]);

        assert!(map.get(99).unwrap().is_none());
    }

    #[test]
    fn rejects_truncated_input() {
        let mut dec = Decoder::new(&[0x82, 0x01]); // array of 2, only 1 element present
        assert!(dec.read_item().is_err());
    }
}
