//! `/debug` (api id 29): the same three built-in commands `/execute`'s
//! reserved `0xFFFF` trait exposes, reachable directly without allocating a
//! command-table slot.
//!
//! spec.md's API id table lists `debug` (29) alongside `execute` (8) but
//! describes only one set of debug commands; this reimplementation treats
//! `/debug` as a thin, slot-free entry point onto
//! [`crate::handlers::execute::debug_dispatch`] rather than a second
//! implementation of metrics/trace-query/trace-dump.

use weave_common::cbor::MapRef;
use weave_common::status::{Result, Status};
use weave_common::Buffer;
use weave_device::counters::CounterSet;
use weave_device::trace::TraceLog;

use super::execute::{command_object_reply, debug_dispatch, COMMAND_STATE_DONE};

const KEY_NAME: i64 = 1;
const KEY_PARAM: i64 = 2;

pub fn handle(counters: &CounterSet, trace_log: &TraceLog, now_timestamp_seconds: Option<u32>, params: Option<MapRef<'_>>) -> Result<Buffer> {
    let params = params.ok_or(Status::PrivetInvalidParam)?;
    let name_id = params.get(KEY_NAME)?.ok_or(Status::InvalidInput)?.as_i64()?;
    let param = match params.get(KEY_PARAM)? {
        Some(item) => Some(item.as_map()?),
        None => None,
    };

    let result = debug_dispatch(counters, trace_log, now_timestamp_seconds, name_id, param)?;
    command_object_reply(COMMAND_STATE_DONE, result.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::cbor::{encode_to_buffer, Decoder};
    use weave_common::value::Value;
    use weave_crypto::providers::host::HostCsprng;
    use weave_device::storage::MemoryStorage;

    #[test]
    fn metrics_name_returns_a_done_command_object() {
        let storage = MemoryStorage::new();
        let counters = CounterSet::load(&storage, &[], &HostCsprng).unwrap();
        let trace_log = TraceLog::new(16);

        let entries = [(KEY_NAME, Value::Int(0))];
        let buf = encode_to_buffer(&Value::map(&entries), 32).unwrap();
        let mut dec = Decoder::new(buf.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();

        let reply = handle(&counters, &trace_log, Some(0), Some(map)).unwrap();
        let mut rdec = Decoder::new(reply.as_bytes());
        let rmap = rdec.read_item().unwrap().as_map().unwrap();
        assert_eq!(rmap.get(1).unwrap().unwrap().as_i64().unwrap(), COMMAND_STATE_DONE as i64);
    }
}
