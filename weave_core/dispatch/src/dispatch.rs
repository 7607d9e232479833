//! Top-level RPC dispatch: routes one decrypted, envelope-parsed request to
//! its handler and wraps the result back into a reply envelope (spec.md §6).
//!
//! Grounded on `original_source/src/device.c`'s `uw_device_dispatch_privet_request_`
//! switch over `api_id`. That function also does the encryption/role gating
//! inline per case; here it is factored into one table
//! ([`requirement_for`]) consulted before routing, since every case's gating
//! reduces to "needs `InSession`" and/or "needs at least role X" — except
//! `/execute`, which enforces encryption itself and leaves roles to the
//! handler (spec.md §4.9).

use weave_common::status::{Result, Status};
use weave_common::time::WallClock;
use weave_common::value::Value;
use weave_common::Buffer;
use weave_crypto::providers::{BlockCipher128, Csprng, Sha256};
use weave_device::command::CommandTable;
use weave_device::config::Config;
use weave_device::counters::CounterSet;
use weave_device::crypto::DeviceCrypto;
use weave_device::settings::Settings;
use weave_device::storage::Storage;
use weave_device::trace::TraceLog;
use weave_macaroon::Scope;

use crate::envelope::{self, Request};
use crate::handlers::execute::CommandExecutor;
use crate::handlers::state::StateProvider;
use crate::handlers::{access_control, auth, debug, execute, info, pairing, setup, state};
use crate::session::{Phase, Session};

const API_INFO: i64 = 0;
const API_PAIRING_START: i64 = 2;
const API_PAIRING_CONFIRM: i64 = 3;
const API_AUTH: i64 = 5;
const API_STATE: i64 = 6;
const API_EXECUTE: i64 = 8;
const API_SETUP: i64 = 9;
const API_ACCESS_CONTROL_CLAIM: i64 = 24;
const API_ACCESS_CONTROL_CONFIRM: i64 = 25;
const API_DEBUG: i64 = 29;

/// What a dispatched request produced. Mirrors spec.md §7's propagation
/// policy: handler-level failures become an in-band error reply, while
/// anything that leaves the channel itself in an unknown state disconnects
/// instead of replying.
pub enum Outcome {
    /// Send `buffer` back to the client as-is (already EAX-sealed by the
    /// caller if the channel is `InSession`).
    Reply(Buffer),
    /// The channel can no longer be trusted; the caller must tear down the
    /// connection without sending anything further.
    Disconnect,
    /// Nothing to send — a notification request (no `request_id`) that
    /// completed without error.
    NoReply,
}

/// Minimum role a request's `api_id` requires, enforced centrally before the
/// handler runs. `None` means the handler performs its own gating (or needs
/// none); `/execute` is deliberately absent here, matching
/// `device.c`'s "it is up to the app handler to enforce roles" comment.
fn role_requirement(api_id: i64) -> Option<Scope> {
    match api_id {
        API_STATE => Some(Scope::Viewer),
        API_SETUP => Some(Scope::Manager),
        _ => None,
    }
}

/// Whether `api_id` requires an `InSession` (encrypted) channel, checked
/// before the role requirement above. `/auth`, `/accessControl/claim`, and
/// `/state` also assert this themselves (so they read correctly in
/// isolation from their own tests); re-checking here is cheap and keeps the
/// policy visible in one place.
fn requires_encryption(api_id: i64) -> bool {
    matches!(api_id, API_AUTH | API_STATE | API_SETUP | API_ACCESS_CONTROL_CLAIM)
}

/// Everything a dispatched request may need, borrowed for the duration of
/// one `dispatch` call. Constructed fresh by the caller (the `weave` facade)
/// each time it has a decrypted message ready to route.
#[allow(clippy::too_many_arguments)]
pub struct Context<'a, C: BlockCipher128, S: Sha256, R: Csprng> {
    pub session: &'a mut Session,
    pub device_crypto: &'a mut DeviceCrypto,
    pub settings: &'a mut Settings,
    pub storage: &'a mut dyn Storage,
    pub config: &'a Config,
    pub wall_clock: &'a mut dyn WallClock,
    pub commands: &'a mut CommandTable,
    pub counters: &'a CounterSet,
    pub trace_log: &'a TraceLog,
    pub executor: &'a mut dyn CommandExecutor,
    pub state_provider: &'a mut dyn StateProvider,
    pub cipher: &'a C,
    pub rng: &'a R,
    pub enable_multipairing: bool,
    pub current_version: u8,
    pub build_string: &'a str,
    pub uptime_seconds: u32,
    pub current_time_j2000: u32,
    pub _sha256: core::marker::PhantomData<S>,
}

fn route<C: BlockCipher128, S: Sha256, R: Csprng>(ctx: &mut Context<'_, C, S, R>, request: &Request<'_>) -> Result<Buffer> {
    match request.api_id {
        API_INFO => info::build_reply(ctx.settings, ctx.device_crypto, ctx.wall_clock, ctx.build_string),
        API_PAIRING_START => pairing::start::<S, R>(
            ctx.session,
            ctx.settings,
            ctx.device_crypto,
            ctx.enable_multipairing,
            ctx.rng,
            request.params,
        ),
        API_PAIRING_CONFIRM => pairing::confirm::<C, S, R>(
            ctx.session,
            ctx.device_crypto,
            ctx.cipher,
            ctx.rng,
            ctx.wall_clock,
            ctx.uptime_seconds,
            ctx.current_time_j2000,
            request.params,
        ),
        API_AUTH => auth::handle::<C, S>(
            ctx.session,
            ctx.device_crypto,
            ctx.cipher,
            ctx.wall_clock,
            ctx.current_time_j2000,
            request.params,
        ),
        API_STATE => state::handle(ctx.session, ctx.state_provider, request.params),
        API_EXECUTE => execute::handle(
            ctx.commands,
            ctx.counters,
            ctx.trace_log,
            ctx.executor,
            ctx.uptime_seconds,
            ctx.wall_clock.now_unix().map(|v| v as u32),
            request.params,
        ),
        API_SETUP => setup::handle(
            ctx.settings,
            ctx.storage,
            ctx.config,
            ctx.wall_clock,
            ctx.current_version,
            request.params,
        ),
        API_ACCESS_CONTROL_CLAIM => access_control::claim(ctx.session, ctx.device_crypto, ctx.cipher, ctx.rng, ctx.current_time_j2000),
        API_ACCESS_CONTROL_CONFIRM => access_control::confirm(
            ctx.session,
            ctx.device_crypto,
            ctx.storage,
            ctx.config,
            ctx.cipher,
            ctx.current_time_j2000,
            request.params,
        ),
        API_DEBUG => debug::handle(ctx.counters, ctx.trace_log, ctx.wall_clock.now_unix().map(|v| v as u32), request.params),
        _ => Err(Status::PrivetNotFound),
    }
}

/// Parses and dispatches one decrypted RPC message, producing the
/// `Outcome` the caller should act on. A malformed envelope (bad CBOR,
/// missing `api_id`) is treated as unrecoverable for the message — this
/// reimplementation maps it to `Outcome::Disconnect` rather than attempting
/// an error reply to a request whose `request_id` couldn't even be read.
pub fn dispatch<C: BlockCipher128, S: Sha256, R: Csprng>(message: &[u8], ctx: &mut Context<'_, C, S, R>) -> Outcome {
    let request = match envelope::parse_request(message) {
        Ok(request) => request,
        Err(_) => return Outcome::Disconnect,
    };

    let result = dispatch_checked(ctx, &request);

    match result {
        Ok(reply_value) => match request.request_id {
            Some(_) => match envelope::build_ok_reply(request.request_id, &Value::BinaryCbor(reply_value.as_bytes()), reply_value.len() + 32) {
                Ok(envelope) => Outcome::Reply(envelope),
                Err(_) => Outcome::Disconnect,
            },
            None => Outcome::NoReply,
        },
        Err(status) => match request.request_id {
            Some(_) => match envelope::build_error_reply(request.request_id, status, None, 64) {
                Ok(envelope) => Outcome::Reply(envelope),
                Err(_) => Outcome::Disconnect,
            },
            None => Outcome::NoReply,
        },
    }
}

fn dispatch_checked<C: BlockCipher128, S: Sha256, R: Csprng>(ctx: &mut Context<'_, C, S, R>, request: &Request<'_>) -> Result<Buffer> {
    if requires_encryption(request.api_id) && ctx.session.crypto().phase() != Phase::InSession {
        return Err(Status::EncryptionRequired);
    }
    if let Some(min_role) = role_requirement(request.api_id) {
        if !ctx.session.role_at_least(min_role) {
            return Err(Status::InsufficientRole);
        }
    }
    route(ctx, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::cbor::{encode_to_buffer, Decoder, MapRef};
    use weave_crypto::providers::host::{HostBlockCipher, HostCsprng, HostSha256};
    use weave_device::storage::MemoryStorage;

    struct EchoExecutor;
    impl CommandExecutor for EchoExecutor {
        fn execute(&mut self, _trait_id: u32, _name_id: u32, _param: Option<MapRef<'_>>) -> Result<Buffer> {
            encode_to_buffer(&Value::Int(1), 8)
        }
    }

    struct EmptyState;
    impl StateProvider for EmptyState {
        fn state(&mut self, _param: Option<MapRef<'_>>) -> Result<(i64, Buffer)> {
            Ok((1, encode_to_buffer(&Value::map(&[]), 8)?))
        }
    }

    fn info_request() -> Buffer {
        let entries = [(1i64, Value::Int(API_INFO as i32)), (2i64, Value::Int(7))];
        encode_to_buffer(&Value::map(&entries), 32).unwrap()
    }

    fn state_request() -> Buffer {
        let entries = [(1i64, Value::Int(API_STATE as i32)), (2i64, Value::Int(7))];
        encode_to_buffer(&Value::map(&entries), 32).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn with_context<T>(
        session: &mut Session,
        device_crypto: &mut DeviceCrypto,
        settings: &mut Settings,
        storage: &mut MemoryStorage,
        config: &Config,
        wall_clock: &mut dyn WallClock,
        commands: &mut CommandTable,
        counters: &CounterSet,
        trace_log: &TraceLog,
        executor: &mut EchoExecutor,
        state_provider: &mut EmptyState,
        f: impl FnOnce(&mut Context<'_, HostBlockCipher, HostSha256, HostCsprng>) -> T,
    ) -> T {
        let mut ctx = Context {
            session,
            device_crypto,
            settings,
            storage,
            config,
            wall_clock,
            commands,
            counters,
            trace_log,
            executor,
            state_provider,
            cipher: &HostBlockCipher,
            rng: &HostCsprng,
            enable_multipairing: false,
            current_version: 1,
            build_string: "v1.0.0-test",
            uptime_seconds: 0,
            current_time_j2000: 0,
            _sha256: core::marker::PhantomData,
        };
        f(&mut ctx)
    }

    #[test]
    fn info_is_public_and_needs_no_session() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut device_crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        let mut settings = Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device");
        let mut session = Session::new();
        let mut clock = weave_common::time::SystemClock::new();
        let mut commands = CommandTable::new(4, 512);
        let counters = CounterSet::load(&storage, &[], &HostCsprng).unwrap();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;
        let mut state_provider = EmptyState;

        let request = info_request();
        let outcome = with_context(
            &mut session,
            &mut device_crypto,
            &mut settings,
            &mut storage,
            &config,
            &mut clock,
            &mut commands,
            &counters,
            &trace_log,
            &mut executor,
            &mut state_provider,
            |ctx| dispatch(request.as_bytes(), ctx),
        );

        match outcome {
            Outcome::Reply(buf) => {
                let mut dec = Decoder::new(buf.as_bytes());
                let map = dec.read_item().unwrap().as_map().unwrap();
                assert!(map.get(2).unwrap().is_some());
                assert!(map.get(17).unwrap().is_some());
            }
            _ => panic!("expected a reply"),
        }
    }

    #[test]
    fn state_over_passthrough_channel_is_an_error_reply_not_a_disconnect() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut device_crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        let mut settings = Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device");
        let mut session = Session::new();
        let mut clock = weave_common::time::SystemClock::new();
        let mut commands = CommandTable::new(4, 512);
        let counters = CounterSet::load(&storage, &[], &HostCsprng).unwrap();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;
        let mut state_provider = EmptyState;

        let request = state_request();
        let outcome = with_context(
            &mut session,
            &mut device_crypto,
            &mut settings,
            &mut storage,
            &config,
            &mut clock,
            &mut commands,
            &counters,
            &trace_log,
            &mut executor,
            &mut state_provider,
            |ctx| dispatch(request.as_bytes(), ctx),
        );

        match outcome {
            Outcome::Reply(buf) => {
                let mut dec = Decoder::new(buf.as_bytes());
                let map = dec.read_item().unwrap().as_map().unwrap();
                let error = map.get(3).unwrap().unwrap().as_map().unwrap();
                assert_eq!(error.get(4).unwrap().unwrap().as_i64().unwrap(), Status::EncryptionRequired.code() as i64);
            }
            _ => panic!("expected an error reply, not a disconnect"),
        }
    }

    #[test]
    fn malformed_envelope_disconnects() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut device_crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        let mut settings = Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device");
        let mut session = Session::new();
        let mut clock = weave_common::time::SystemClock::new();
        let mut commands = CommandTable::new(4, 512);
        let counters = CounterSet::load(&storage, &[], &HostCsprng).unwrap();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;
        let mut state_provider = EmptyState;

        let garbage = [0xFFu8; 4];
        let outcome = with_context(
            &mut session,
            &mut device_crypto,
            &mut settings,
            &mut storage,
            &config,
            &mut clock,
            &mut commands,
            &counters,
            &trace_log,
            &mut executor,
            &mut state_provider,
            |ctx| dispatch(&garbage, ctx),
        );

        assert!(matches!(outcome, Outcome::Disconnect));
    }

    #[test]
    fn unknown_api_id_is_privet_not_found() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut device_crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        let mut settings = Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device");
        let mut session = Session::new();
        let mut clock = weave_common::time::SystemClock::new();
        let mut commands = CommandTable::new(4, 512);
        let counters = CounterSet::load(&storage, &[], &HostCsprng).unwrap();
        let trace_log = TraceLog::new(16);
        let mut executor = EchoExecutor;
        let mut state_provider = EmptyState;

        let entries = [(1i64, Value::Int(999)), (2i64, Value::Int(1))];
        let request = encode_to_buffer(&Value::map(&entries), 32).unwrap();
        let outcome = with_context(
            &mut session,
            &mut device_crypto,
            &mut settings,
            &mut storage,
            &config,
            &mut clock,
            &mut commands,
            &counters,
            &trace_log,
            &mut executor,
            &mut state_provider,
            |ctx| dispatch(request.as_bytes(), ctx),
        );

        match outcome {
            Outcome::Reply(buf) => {
                let mut dec = Decoder::new(buf.as_bytes());
                let map = dec.read_item().unwrap().as_map().unwrap();
                let error = map.get(3).unwrap().unwrap().as_map().unwrap();
                assert_eq!(error.get(4).unwrap().unwrap().as_i64().unwrap(), Status::PrivetNotFound.code() as i64);
            }
            _ => panic!("expected an error reply"),
        }
    }
}
