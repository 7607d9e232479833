//! `/state` (api id 6, viewer+, encrypted): reports an application-defined
//! component/trait state tree plus a fingerprint the client can use to
//! detect whether anything changed since its last poll (spec.md §4.6-4.9).
//!
//! Grounded on `original_source/src/state_reply.c`: the nested
//! `{component: {state: {trait: state_map}}}` shape is left entirely to the
//! application (there named `UwComponentTraits`); this crate only wraps
//! whatever it returns with the fingerprint envelope.

use weave_common::cbor::{encode_to_buffer, MapRef};
use weave_common::status::{Result, Status};
use weave_common::value::Value;
use weave_common::Buffer;

use crate::session::{Phase, Session};

const KEY_FINGERPRINT: i64 = 1;
const KEY_COMPONENTS: i64 = 2;

/// Implemented by whatever owns the device's application components.
/// Returns the current fingerprint and an already-CBOR-encoded components
/// map (`{component_id: {state: {trait_id: state_map}}}`).
pub trait StateProvider {
    fn state(&mut self, param: Option<MapRef<'_>>) -> Result<(i64, Buffer)>;
}

pub fn handle(session: &Session, provider: &mut dyn StateProvider, params: Option<MapRef<'_>>) -> Result<Buffer> {
    if session.crypto().phase() != Phase::InSession {
        return Err(Status::EncryptionRequired);
    }

    let (fingerprint, components) = provider.state(params)?;
    let entries = [(KEY_FINGERPRINT, Value::Int64(fingerprint)), (KEY_COMPONENTS, Value::BinaryCbor(components.as_bytes()))];
    encode_to_buffer(&Value::map(&entries), components.len() + 32)
}
