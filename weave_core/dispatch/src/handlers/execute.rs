//! `/execute` (api id 8), `/state` (api id 6), and the reserved debug trait
//! (`0xFFFF`) shared with the standalone `/debug` (api id 29) handler
//! (spec.md §4.6-4.9).
//!
//! Grounded on `original_source/src/execute_request.c` (trait/name/param
//! parsing and the command-object reply shape) and
//! `src/debug_request.c` (the three built-in debug commands). Non-debug
//! traits are delegated to an application-supplied [`CommandExecutor`] —
//! this crate has no knowledge of any concrete trait beyond the reserved
//! debug one, matching spec.md's "role enforcement is delegated to the
//! handler".

use weave_common::cbor::{encode_to_buffer, MapRef};
use weave_common::status::{Result, Status};
use weave_common::value::Value;
use weave_common::Buffer;
use weave_device::command::CommandTable;
use weave_device::counters::CounterSet;
use weave_device::trace::TraceLog;

/// Trait id reserved for the built-in debug commands; never dispatched to
/// [`CommandExecutor`].
pub const DEBUG_TRAIT_ID: u32 = 0xFFFF;

const DEBUG_NAME_METRICS: i64 = 0;
const DEBUG_NAME_TRACE_QUERY: i64 = 1;
const DEBUG_NAME_TRACE_DUMP: i64 = 2;

const KEY_TRACE_DUMP_START: i64 = 1;
const KEY_TRACE_DUMP_END: i64 = 2;
const KEY_TRACE_QUERY_FIRST: i64 = 1;
const KEY_TRACE_QUERY_LAST: i64 = 2;

const KEY_EXECUTE_TRAIT: i64 = 1;
const KEY_EXECUTE_NAME: i64 = 2;
const KEY_EXECUTE_PARAM: i64 = 3;

const KEY_COMMAND_STATE: i64 = 1;
const KEY_COMMAND_RESULT: i64 = 2;

pub(crate) const COMMAND_STATE_DONE: i32 = 0;

/// Implemented by whatever owns the device's application-level traits.
/// Given a trait/name pair and an optional CBOR param map, returns the
/// already-CBOR-encoded `result` value for a successful command, or an
/// error `Status` that becomes the command's `Error` state.
pub trait CommandExecutor {
    fn execute(&mut self, trait_id: u32, name_id: u32, param: Option<MapRef<'_>>) -> Result<Buffer>;
}

/// Shared by `/execute`'s reserved debug trait and the standalone `/debug`
/// (api id 29), which spec.md lists separately but describes identically —
/// both paths funnel into this one implementation rather than duplicating
/// the three debug commands.
pub(crate) fn debug_dispatch(counters: &CounterSet, trace_log: &TraceLog, now_timestamp_seconds: Option<u32>, name_id: i64, param: Option<MapRef<'_>>) -> Result<Buffer> {
    match name_id {
        DEBUG_NAME_METRICS => {
            let document = counters.document(now_timestamp_seconds);
            encode_to_buffer(&Value::CallbackMap(&document), 512)
        }
        DEBUG_NAME_TRACE_QUERY => {
            let (first, last) = trace_log.range().unwrap_or((0, 0));
            let entries = [(KEY_TRACE_QUERY_FIRST, Value::Int64(first as i64)), (KEY_TRACE_QUERY_LAST, Value::Int64(last as i64))];
            encode_to_buffer(&Value::map(&entries), 32)
        }
        DEBUG_NAME_TRACE_DUMP => {
            let params = param.ok_or(Status::InvalidArgument)?;
            let start = params.get(KEY_TRACE_DUMP_START)?.ok_or(Status::InvalidArgument)?.as_i64()? as u32;
            let end = params.get(KEY_TRACE_DUMP_END)?.ok_or(Status::InvalidArgument)?.as_i64()? as u32;
            let dump = trace_log.dump(start, end);
            encode_to_buffer(&Value::CallbackArray(&dump), 2048)
        }
        _ => Err(Status::InvalidArgument),
    }
}

pub(crate) fn command_object_reply(state: i32, result_cbor: &[u8]) -> Result<Buffer> {
    let entries = [(KEY_COMMAND_STATE, Value::Int(state)), (KEY_COMMAND_RESULT, Value::BinaryCbor(result_cbor))];
    encode_to_buffer(&Value::map(&entries), result_cbor.len() + 32)
}

/// Runs `/execute`. A command slot is reserved for every call, debug trait
/// included, so the slot table's eviction/history behavior applies
/// uniformly (spec.md testable property 6).
pub fn handle(
    commands: &mut CommandTable,
    counters: &CounterSet,
    trace_log: &TraceLog,
    executor: &mut dyn CommandExecutor,
    uptime_seconds: u32,
    now_timestamp_seconds: Option<u32>,
    params: Option<MapRef<'_>>,
) -> Result<Buffer> {
    let params = params.ok_or(Status::PrivetInvalidParam)?;
    let trait_id = params.get(KEY_EXECUTE_TRAIT)?.ok_or(Status::InvalidInput)?.as_i64()? as u32;
    let name_id = params.get(KEY_EXECUTE_NAME)?.ok_or(Status::InvalidInput)?.as_i64()? as u32;
    let param = match params.get(KEY_EXECUTE_PARAM)? {
        Some(item) => Some(item.as_map()?),
        None => None,
    };

    let command = commands.allocate(uptime_seconds)?;
    command.mark_deferred();
    let command_id = command.id();
    commands.set_request(command_id, trait_id, name_id);

    let outcome = if trait_id == DEBUG_TRAIT_ID {
        debug_dispatch(counters, trace_log, now_timestamp_seconds, name_id as i64, param)
    } else {
        executor.execute(trait_id, name_id, param)
    };

    let command = commands.find_mut(command_id).expect("just allocated");
    match outcome {
        Ok(result) => {
            command.mark_done(result.as_bytes())?;
            command_object_reply(COMMAND_STATE_DONE, result.as_bytes())
        }
        Err(status) => {
            let code_entries = [(1i64, Value::Int(status.code() as i32))];
            let code_buf = encode_to_buffer(&Value::map(&code_entries), 16)?;
            command.mark_error(code_buf.as_bytes())?;
            Err(status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::cbor::Decoder;
    use weave_crypto::providers::host::HostCsprng;
    use weave_device::storage::MemoryStorage;

    struct EchoExecutor;
    impl CommandExecutor for EchoExecutor {
        fn execute(&mut self, _trait_id: u32, _name_id: u32, _param: Option<MapRef<'_>>) -> Result<Buffer> {
            encode_to_buffer(&Value::Int(42), 8)
        }
    }

    struct FailingExecutor;
    impl CommandExecutor for FailingExecutor {
        fn execute(&mut self, _trait_id: u32, _name_id: u32, _param: Option<MapRef<'_>>) -> Result<Buffer> {
            Err(Status::InsufficientRole)
        }
    }

    fn counters() -> CounterSet {
        let storage = MemoryStorage::new();
        CounterSet::load(&storage, &[], &HostCsprng).unwrap()
    }

    fn request_params(trait_id: i64, name_id: i64) -> Buffer {
        let entries = [(KEY_EXECUTE_TRAIT, Value::Int(trait_id as i32)), (KEY_EXECUTE_NAME, Value::Int(name_id as i32))];
        encode_to_buffer(&Value::map(&entries), 64).unwrap()
    }

    fn parse<'a>(buf: &'a Buffer) -> MapRef<'a> {
        let mut dec = Decoder::new(buf.as_bytes());
        dec.read_item().unwrap().as_map().unwrap()
    }

    #[test]
    fn debug_metrics_returns_a_done_command_object() {
        let mut commands = CommandTable::new(4, 512);
        let counters = counters();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;

        let buf = request_params(DEBUG_TRAIT_ID as i64, DEBUG_NAME_METRICS);
        let reply = handle(&mut commands, &counters, &trace_log, &mut executor, 0, Some(0), Some(parse(&buf))).unwrap();

        let mut dec = Decoder::new(reply.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();
        assert_eq!(map.get(KEY_COMMAND_STATE).unwrap().unwrap().as_i64().unwrap(), COMMAND_STATE_DONE as i64);
    }

    #[test]
    fn non_debug_trait_is_delegated_to_the_executor() {
        let mut commands = CommandTable::new(4, 512);
        let counters = counters();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;

        let buf = request_params(7, 1);
        let reply = handle(&mut commands, &counters, &trace_log, &mut executor, 0, None, Some(parse(&buf))).unwrap();
        let mut dec = Decoder::new(reply.as_bytes());
        let map = dec.read_item().unwrap().as_map().unwrap();
        assert_eq!(map.get(KEY_COMMAND_STATE).unwrap().unwrap().as_i64().unwrap(), COMMAND_STATE_DONE as i64);
    }

    #[test]
    fn executor_failure_marks_the_slot_error_and_propagates() {
        let mut commands = CommandTable::new(4, 512);
        let counters = counters();
        let trace_log = TraceLog::new(16);
        let mut executor = FailingExecutor;

        let buf = request_params(7, 1);
        let err = handle(&mut commands, &counters, &trace_log, &mut executor, 0, None, Some(parse(&buf))).unwrap_err();
        assert_eq!(err, Status::InsufficientRole);
    }

    #[test]
    fn no_free_slot_returns_command_no_available_buffers() {
        let mut commands = CommandTable::new(1, 512);
        let counters = counters();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;

        commands.allocate(0).unwrap().mark_deferred();
        let buf = request_params(7, 1);
        let err = handle(&mut commands, &counters, &trace_log, &mut executor, 0, None, Some(parse(&buf))).unwrap_err();
        assert_eq!(err, Status::CommandNoAvailableBuffers);
    }
}
