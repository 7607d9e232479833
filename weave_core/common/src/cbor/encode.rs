use crate::buffer::Buffer;
use crate::status::{Result, Status};
use crate::value::Value;

/// Writes [`Value`] documents into a capacity-bounded [`Buffer`] as CBOR.
///
/// Integers always use the shortest encoding (RFC 8949 "preferred
/// serialization"), matching the original's `tinycbor`-based encoder.
pub struct Encoder<'a> {
    out: &'a mut Buffer,
}

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

impl<'a> Encoder<'a> {
    pub fn new(out: &'a mut Buffer) -> Self {
        Encoder { out }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.append(bytes).map_err(|_| Status::ValueEncodingOutOfSpace)
    }

    fn write_head(&mut self, major: u8, value: u64) -> Result<()> {
        let major = major << 5;
        if value < 24 {
            self.put(&[major | value as u8])
        } else if value <= u8::MAX as u64 {
            self.put(&[major | 24, value as u8])
        } else if value <= u16::MAX as u64 {
            self.put(&[major | 25])?;
            self.put(&(value as u16).to_be_bytes())
        } else if value <= u32::MAX as u64 {
            self.put(&[major | 26])?;
            self.put(&(value as u32).to_be_bytes())
        } else {
            self.put(&[major | 27])?;
            self.put(&value.to_be_bytes())
        }
    }

    fn write_int64(&mut self, value: i64) -> Result<()> {
        if value >= 0 {
            self.write_head(MAJOR_UINT, value as u64)
        } else {
            // CBOR negative integers encode -(n+1).
            self.write_head(MAJOR_NEGINT, (-(value + 1)) as u64)
        }
    }

    pub fn encode(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Int(v) => self.write_int64(v as i64),
            Value::Int64(v) => self.write_int64(v),
            Value::ByteString(bytes) => {
                self.write_head(MAJOR_BYTES, bytes.len() as u64)?;
                self.put(bytes)
            }
            Value::Text(text) => {
                let bytes = text.as_bytes();
                self.write_head(MAJOR_TEXT, bytes.len() as u64)?;
                self.put(bytes)
            }
            Value::Bool(b) => self.put(&[(MAJOR_SIMPLE << 5) | if b { SIMPLE_TRUE } else { SIMPLE_FALSE }]),
            Value::Null => self.put(&[(MAJOR_SIMPLE << 5) | SIMPLE_NULL]),
            Value::Undefined => self.put(&[(MAJOR_SIMPLE << 5) | SIMPLE_UNDEFINED]),
            Value::Float32(f) => {
                self.put(&[(MAJOR_SIMPLE << 5) | SIMPLE_F32])?;
                self.put(&f.to_be_bytes())
            }
            Value::Float64(f) => {
                self.put(&[(MAJOR_SIMPLE << 5) | SIMPLE_F64])?;
                self.put(&f.to_be_bytes())
            }
            Value::Array(items) => {
                self.write_head(MAJOR_ARRAY, items.len() as u64)?;
                for item in items {
                    self.encode(item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                self.write_head(MAJOR_MAP, entries.len() as u64)?;
                for (key, value) in entries {
                    self.write_int64(*key)?;
                    self.encode(value)?;
                }
                Ok(())
            }
            Value::BinaryCbor(bytes) => self.put(bytes),
            Value::CallbackMap(emitter) => {
                self.write_head(MAJOR_MAP, emitter.len() as u64)?;
                for i in 0..emitter.len() {
                    let (key, value) = emitter.entry(i);
                    self.write_int64(key)?;
                    self.encode(&value)?;
                }
                Ok(())
            }
            Value::CallbackArray(emitter) => {
                self.write_head(MAJOR_ARRAY, emitter.len() as u64)?;
                for i in 0..emitter.len() {
                    let value = emitter.entry(i);
                    self.encode(&value)?;
                }
                Ok(())
            }
        }
    }
}

/// Convenience: encodes `value` into a fresh buffer of the given capacity.
pub fn encode_to_buffer(value: &Value, capacity: usize) -> Result<Buffer> {
    let mut out = Buffer::with_capacity(capacity);
    Encoder::new(&mut out).encode(value)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::decode::{Decoder, Item};

    #[test]
    fn encodes_small_int_in_one_byte() {
        let buf = encode_to_buffer(&Value::Int(5), 16).unwrap();
        assert_eq!(buf.as_bytes(), &[0x05]);
    }

    #[test]
    fn encodes_negative_int() {
        let buf = encode_to_buffer(&Value::Int64(-1), 16).unwrap();
        assert_eq!(buf.as_bytes(), &[0x20]);
    }

    #[test]
    fn encodes_map_with_int_keys() {
        let entries = [(1i64, Value::Int(2)), (2i64, Value::Text("hi"))];
        let buf = encode_to_buffer(&Value::map(&entries), 32).unwrap();
        let mut dec = Decoder::new(buf.as_bytes());
        let item = dec.read_item().unwrap();
        match item {
            Item::Map(map) => {
                let v = map.get(1).unwrap().unwrap();
                assert!(matches!(v, Item::Int(2)));
                let v = map.get(2).unwrap().unwrap();
                assert!(matches!(v, Item::Text("hi")));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn callback_map_encodes_same_as_slice() {
        struct Doubler;
        impl crate::value::MapEmitter for Doubler {
            fn len(&self) -> usize {
                3
            }
            fn entry(&self, index: usize) -> (i64, Value<'_>) {
                (index as i64, Value::Int(index as i32 * 2))
            }
        }
        let doubler = Doubler;
        let via_callback = encode_to_buffer(&Value::CallbackMap(&doubler), 32).unwrap();
        let entries = [
            (0i64, Value::Int(0)),
            (1i64, Value::Int(2)),
            (2i64, Value::Int(4)),
        ];
        let via_slice = encode_to_buffer(&Value::map(&entries), 32).unwrap();
        assert_eq!(via_callback.as_bytes(), via_slice.as_bytes());
    }
}
