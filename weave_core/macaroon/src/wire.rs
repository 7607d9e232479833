//! CBOR representation of a macaroon: `[tag, [caveat0_bytes, caveat1_bytes, …]]`
//! (spec.md §4.4), built on [`weave_common::cbor`] rather than a bespoke
//! serializer (`original_source/src/macaroon.c`'s `uw_macaroon_serialize_`
//! hand-rolls its own length-prefixed format; this crate reuses the shared
//! CBOR codec everywhere a byte representation of a document is needed).

use weave_common::buffer::Buffer;
use weave_common::cbor::{encode_to_buffer, Decoder, Item};
use weave_common::status::{Result, Status};
use weave_common::value::Value;

use crate::caveat::Caveat;
use crate::mint::Macaroon;
use crate::MAC_LEN;

pub fn encode_macaroon(macaroon: &Macaroon, capacity: usize) -> Result<Buffer> {
    let caveat_bytes: Vec<Vec<u8>> = macaroon.caveats.iter().map(Caveat::to_bytes).collect();
    let caveat_values: Vec<Value> = caveat_bytes.iter().map(|b| Value::ByteString(b.as_slice())).collect();
    let top = [
        Value::ByteString(&macaroon.tag),
        Value::array(&caveat_values),
    ];
    encode_to_buffer(&Value::array(&top), capacity)
}

pub fn decode_macaroon(bytes: &[u8]) -> Result<Macaroon> {
    let mut dec = Decoder::new(bytes);
    let top = dec.read_item()?.as_array()?;
    if top.len() != 2 {
        return Err(Status::ValueInvalidInput);
    }
    let mut items = top.iter();
    let tag_item = items.next().ok_or(Status::ValueInvalidInput)??;
    let tag_bytes = tag_item.as_bytes()?;
    let tag: [u8; MAC_LEN] = tag_bytes.try_into().map_err(|_| Status::ValueInvalidInput)?;

    let caveats_item = items.next().ok_or(Status::ValueInvalidInput)??;
    let caveats_array = match caveats_item {
        Item::Array(a) => a,
        _ => return Err(Status::ValueInvalidInput),
    };
    let mut caveats = Vec::new();
    for entry in caveats_array.iter() {
        let entry = entry?;
        let raw = entry.as_bytes()?;
        caveats.push(Caveat::from_bytes(raw)?);
    }

    Ok(Macaroon { tag, caveats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caveat::Scope;
    use weave_crypto::providers::host::HostBlockCipher;

    #[test]
    fn round_trips_through_cbor() {
        let key = [3u8; 16];
        let caveats = vec![Caveat::Scope(Scope::User), Caveat::Nonce(vec![1, 2, 3, 4])];
        let macaroon = Macaroon::mint(&HostBlockCipher, &key, caveats).unwrap();

        let encoded = encode_macaroon(&macaroon, 256).unwrap();
        let decoded = decode_macaroon(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, macaroon);
    }
}
