//! The composition root (spec.md §9 "Global-ish device pointer"): owns every
//! piece of per-device state and drives the cooperative event loop (spec.md
//! §5) behind the three entry points a host ever calls directly —
//! [`Device::handle_events`], [`Device::notify_handle`], [`Device::stop`].

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use weave_common::buffer::Buffer;
use weave_common::status::Result;
use weave_common::time::{unix_to_j2000, MonotonicClock, WallClock};
use weave_crypto::providers::{BlockCipher128, Csprng, Sha256};
use weave_device::advertising::{build_advertising_data, AdvertisingInputs, ADVERTISING_PAYLOAD_LEN};
use weave_device::command::CommandTable;
use weave_device::config::Config;
use weave_device::counters::CounterSet;
use weave_device::crypto::DeviceCrypto;
use weave_device::settings::Settings;
use weave_device::storage::Storage;
use weave_device::trace::TraceLog;
use weave_dispatch::envelope::CURRENT_VERSION;
use weave_dispatch::handlers::execute::CommandExecutor;
use weave_dispatch::handlers::state::StateProvider;
use weave_dispatch::{dispatch, Context, Outcome, Phase, Session};
use weave_transport::channel::Channel;
use weave_transport::device_channel::DeviceChannel;
use weave_transport::message::{MessageState, MessageType};

use crate::handshake::{SessionHandshake, SessionObserver};
use crate::notify::Notify;
use crate::radio::{Radio, RadioEvent};

/// Capacity of the reassembled inbound/outbound RPC message buffers —
/// larger than any single packet, since a message may span several.
const MESSAGE_BUFFER_CAPACITY: usize = 2048;

/// What `handle_events()` accomplished this call, per spec.md §5's
/// "runs until there is no immediately available work, then returns an
/// Idle/Busy indicator".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    Idle,
    Busy,
}

/// One device: identity, persisted state, the connection currently open (if
/// any), and the application collaborators (`CommandExecutor`,
/// `StateProvider`) that `/execute` and `/state` delegate to.
pub struct Device<C, S, R, Ck, St, X, P> {
    session: Rc<RefCell<Session>>,
    device_crypto: Rc<RefCell<DeviceCrypto>>,
    settings: Settings,
    storage: St,
    config: Config,
    clock: Ck,
    commands: CommandTable,
    counters: CounterSet,
    trace_log: TraceLog,
    executor: X,
    state_provider: P,
    cipher: C,
    rng: R,
    build_string: &'static str,
    channel: DeviceChannel<SessionHandshake<C, S, R>, SessionObserver>,
    current_time_j2000: Rc<Cell<u32>>,
    last_activity_uptime: u32,
    last_coalesce_uptime: u32,
    stopped: bool,
    notify: Notify,
    _sha: PhantomData<S>,
}

impl<C, S, R, Ck, St, X, P> Device<C, S, R, Ck, St, X, P>
where
    C: BlockCipher128 + Copy,
    S: Sha256,
    R: Csprng + Copy,
    Ck: MonotonicClock + WallClock,
    St: Storage,
    X: CommandExecutor,
    P: StateProvider,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut settings: Settings,
        mut storage: St,
        config: Config,
        clock: Ck,
        executor: X,
        state_provider: P,
        cipher: C,
        rng: R,
        build_string: &'static str,
    ) -> Result<Self> {
        let device_crypto = DeviceCrypto::load_or_init(&mut storage, &config, &rng)?;
        settings.load_persisted(&storage)?;
        let counters = CounterSet::load(&storage, &[], &rng)?;
        let commands = CommandTable::new(config.command_slot_count, config.command_reply_capacity);
        let trace_log = TraceLog::new(config.trace_log_capacity);

        let session = Rc::new(RefCell::new(Session::new()));
        let device_crypto = Rc::new(RefCell::new(device_crypto));
        let current_time_j2000 = Rc::new(Cell::new(0u32));

        let handshake = SessionHandshake {
            session: session.clone(),
            device_crypto: device_crypto.clone(),
            cipher,
            rng,
            current_time_j2000: current_time_j2000.clone(),
            _sha: PhantomData,
        };
        let observer = SessionObserver { session: session.clone() };
        let channel = Channel::new(config.local_max_packet_size as usize, MESSAGE_BUFFER_CAPACITY, MESSAGE_BUFFER_CAPACITY);
        let channel = DeviceChannel::new(channel, handshake, observer);

        Ok(Device {
            session,
            device_crypto,
            settings,
            storage,
            config,
            clock,
            commands,
            counters,
            trace_log,
            executor,
            state_provider,
            cipher,
            rng,
            build_string,
            channel,
            current_time_j2000,
            last_activity_uptime: 0,
            last_coalesce_uptime: 0,
            stopped: false,
            notify: Notify::new(),
            _sha: PhantomData,
        })
    }

    /// A clonable handle a host can fire from an interrupt context to wake
    /// whatever thread calls `handle_events()`.
    pub fn notify_handle(&self) -> Notify {
        self.notify.clone()
    }

    /// Halts the event loop (spec.md §5 "invoking a `stop()` entry on the
    /// device"): drops any open connection and makes further
    /// `handle_events()` calls no-ops.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.channel.reset();
    }

    /// The current 20-byte advertising payload (spec.md §4.11), recomputed
    /// from whatever `Settings`/`DeviceCrypto` hold right now. Pushing it to
    /// a radio is a host concern — this crate never calls out to one.
    pub fn advertising_data(&self) -> [u8; ADVERTISING_PAYLOAD_LEN] {
        let device_crypto = self.device_crypto.borrow();
        build_advertising_data(&AdvertisingInputs {
            device_class: self.settings.device_class,
            model_id: self.settings.model_id,
            supports_wifi_24ghz: self.settings.supports_wifi_24ghz,
            supports_wifi_50ghz: self.settings.supports_wifi_50ghz,
            supports_ble_40: self.settings.supports_ble_40,
            is_set_up: device_crypto.is_set_up(),
            device_id: device_crypto.device_id().unwrap_or([0u8; 4]),
        })
    }

    /// One iteration of the cooperative event loop (spec.md §5): drain at
    /// most one radio event, attempt at most one outbound send, check the
    /// idle/coalesce timers, then report whether any of that did anything.
    pub fn handle_events(&mut self, radio: &impl Radio) -> WorkState {
        if self.stopped {
            return WorkState::Idle;
        }

        let mut busy = false;

        if let Some(unix) = self.clock.now_unix() {
            self.current_time_j2000.set(unix_to_j2000(unix).max(0) as u32);
        }

        if let Some(event) = radio.try_recv_event() {
            busy = true;
            self.last_activity_uptime = self.clock.uptime_seconds();
            match event {
                RadioEvent::Connected => {}
                RadioEvent::Disconnected => self.channel.reset(),
                RadioEvent::Packet(packet) => self.on_packet_in(&packet),
            }
        }

        if radio.can_send() {
            let mut packet = Buffer::with_capacity(self.channel.channel().max_packet_size());
            if self.channel.get_next_packet_out(&mut packet) && !packet.is_empty() && radio.send(packet.as_bytes()).is_ok() {
                busy = true;
            }
        }

        let uptime = self.clock.uptime_seconds();
        if self.channel.is_connected() {
            let is_set_up = self.device_crypto.borrow().is_set_up();
            let timeout = if is_set_up {
                self.config.idle_timeout_seconds
            } else {
                self.config.unconfigured_idle_timeout_seconds
            };
            if uptime.saturating_sub(self.last_activity_uptime) >= timeout {
                tracing::debug!(uptime, timeout, "idle timeout, resetting connection");
                self.channel.reset();
                busy = true;
            }
        }

        if uptime.saturating_sub(self.last_coalesce_uptime) >= self.config.counter_coalesce_interval_seconds {
            let _ = self.counters.try_coalesce(&mut self.storage, &self.config, uptime);
            self.last_coalesce_uptime = uptime;
            busy = true;
        }

        if busy {
            WorkState::Busy
        } else {
            WorkState::Idle
        }
    }

    /// Feeds one packet through the device channel and, once a full data
    /// message has reassembled, decrypts/dispatches/encrypts it and queues
    /// the reply. Mirrors the data-flow note in spec.md §2: "radio → packet
    /// channel → device channel → session (decrypt) → dispatcher → handler
    /// → session (encrypt) → packet channel → radio."
    fn on_packet_in(&mut self, packet: &[u8]) {
        if !self.channel.append_packet_in(packet) {
            self.channel.reset();
            return;
        }

        let is_data_complete = self.channel.channel().message_in().state() == MessageState::Complete
            && self.channel.channel().message_in().message_type() == MessageType::Data;
        if !is_data_complete {
            return;
        }

        let mut message = match self.channel.channel().message_in().read_remaining() {
            Ok(view) => {
                let mut buf = Buffer::with_capacity(view.len());
                if buf.append(view.as_bytes()).is_err() {
                    self.channel.reset();
                    return;
                }
                buf
            }
            Err(_) => {
                self.channel.reset();
                return;
            }
        };

        if self.session.borrow().crypto().phase() == Phase::SATReceived {
            self.complete_token_sha256_handshake(message.as_bytes());
            return;
        }

        if self.session.borrow_mut().decrypt_incoming(&self.cipher, &mut message).is_err() {
            self.channel.reset();
            return;
        }

        match self.dispatch_message(message.as_bytes()) {
            Outcome::Reply(mut reply) => {
                if self.session.borrow_mut().encrypt_outgoing(&self.cipher, &mut reply).is_err() {
                    self.channel.reset();
                    return;
                }
                self.channel.complete_exchange();
                let out = self.channel.channel_mut().message_out_mut();
                out.start(MessageType::Data);
                if out.append_bytes(reply.as_bytes()).is_err() {
                    self.channel.reset();
                    return;
                }
                out.ready();
            }
            Outcome::NoReply => self.channel.complete_exchange(),
            Outcome::Disconnect => self.channel.reset(),
        }
    }

    /// Completes a `TokenSha256` handshake whose SAT′ arrived as this
    /// connection's first Data message (spec.md §4.3) — the counterpart to
    /// `device_channel.rs`'s ConnReq-time `Handshake::exchange`, which only
    /// gets the client that far. Queues the device's 16-byte proof
    /// signature as the reply on success, or drops the connection.
    fn complete_token_sha256_handshake(&mut self, sat_prime_bytes: &[u8]) {
        let current_time_j2000 = self.current_time_j2000.get();
        let device_crypto = self.device_crypto.borrow();
        let mut reply = Buffer::with_capacity(16);
        let ok = self.session.borrow_mut().complete_token_sha256_handshake::<C, S>(
            &device_crypto,
            &self.cipher,
            current_time_j2000,
            sat_prime_bytes,
            &mut reply,
        );
        drop(device_crypto);

        if !ok {
            self.channel.reset();
            return;
        }

        self.channel.complete_exchange();
        let out = self.channel.channel_mut().message_out_mut();
        out.start(MessageType::Data);
        if out.append_bytes(reply.as_bytes()).is_err() {
            self.channel.reset();
            return;
        }
        out.ready();
    }

    fn dispatch_message(&mut self, message: &[u8]) -> Outcome {
        let uptime_seconds = self.clock.uptime_seconds();
        let current_time_j2000 = self.current_time_j2000.get();
        let mut session_ref = self.session.borrow_mut();
        let mut device_crypto_ref = self.device_crypto.borrow_mut();

        let mut ctx = Context {
            session: &mut session_ref,
            device_crypto: &mut device_crypto_ref,
            settings: &mut self.settings,
            storage: &mut self.storage,
            config: &self.config,
            wall_clock: &mut self.clock,
            commands: &mut self.commands,
            counters: &self.counters,
            trace_log: &self.trace_log,
            executor: &mut self.executor,
            state_provider: &mut self.state_provider,
            cipher: &self.cipher,
            rng: &self.rng,
            enable_multipairing: self.config.enable_multipairing,
            current_version: CURRENT_VERSION as u8,
            build_string: self.build_string,
            uptime_seconds,
            current_time_j2000,
            _sha256: PhantomData,
        };

        dispatch(message, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use weave_common::cbor::{encode_to_buffer, Decoder, MapRef};
    use weave_common::time::{SystemClock, TimeStatus};
    use weave_device::settings::Settings;
    use weave_device::storage::MemoryStorage;
    use weave_crypto::providers::host::{HostBlockCipher, HostCsprng, HostSha256};
    use weave_transport::packet_header::{self, HeaderCmd};

    const MODE_PASSTHROUGH: u8 = 0x00;
    const API_INFO: i32 = 0;
    const ENV_KEY_API_ID: i64 = 1;
    const ENV_KEY_REQUEST_ID: i64 = 2;
    const ENV_KEY_RESULT: i64 = 17;

    struct EchoExecutor;
    impl CommandExecutor for EchoExecutor {
        fn execute(&mut self, _trait_id: u32, _name_id: u32, _param: Option<MapRef<'_>>) -> Result<Buffer> {
            encode_to_buffer(&weave_common::value::Value::Int(1), 8)
        }
    }

    struct EmptyState;
    impl StateProvider for EmptyState {
        fn state(&mut self, _param: Option<MapRef<'_>>) -> Result<(i64, Buffer)> {
            Ok((1, encode_to_buffer(&weave_common::value::Value::map(&[]), 8)?))
        }
    }

    /// A clock a test can advance independently of the `Device` it was
    /// handed to, since `Device` takes its clock by value and exposes no
    /// accessor back to it.
    #[derive(Clone)]
    struct SharedClock(Rc<RefCell<SystemClock>>);

    impl SharedClock {
        fn new() -> Self {
            SharedClock(Rc::new(RefCell::new(SystemClock::new())))
        }

        fn advance(&self, seconds: u32) {
            self.0.borrow_mut().advance(seconds);
        }
    }

    impl MonotonicClock for SharedClock {
        fn uptime_seconds(&self) -> u32 {
            self.0.borrow().uptime_seconds()
        }
    }

    impl WallClock for SharedClock {
        fn now_unix(&self) -> Option<i64> {
            self.0.borrow().now_unix()
        }

        fn status(&self) -> TimeStatus {
            self.0.borrow().status()
        }

        fn set_now_unix(&mut self, unix_seconds: i64, trusted: bool) {
            self.0.borrow_mut().set_now_unix(unix_seconds, trusted);
        }
    }

    #[derive(Default)]
    struct FakeRadio {
        inbound: RefCell<VecDeque<RadioEvent>>,
        sent: RefCell<Vec<Vec<u8>>>,
    }

    impl FakeRadio {
        fn push(&self, event: RadioEvent) {
            self.inbound.borrow_mut().push_back(event);
        }

        fn take_sent(&self) -> Vec<Vec<u8>> {
            self.sent.borrow_mut().drain(..).collect()
        }
    }

    impl Radio for FakeRadio {
        fn try_recv_event(&self) -> Option<RadioEvent> {
            self.inbound.borrow_mut().pop_front()
        }

        fn can_send(&self) -> bool {
            true
        }

        fn send(&self, packet: &[u8]) -> Result<()> {
            self.sent.borrow_mut().push(packet.to_vec());
            Ok(())
        }
    }

    fn new_device() -> (Device<HostBlockCipher, HostSha256, HostCsprng, SharedClock, MemoryStorage, EchoExecutor, EmptyState>, SharedClock) {
        let settings = Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device");
        let storage = MemoryStorage::new();
        let config = Config::default();
        let clock = SharedClock::new();
        let device = Device::new(
            settings,
            storage,
            config,
            clock.clone(),
            EchoExecutor,
            EmptyState,
            HostBlockCipher,
            HostCsprng,
            "v1.0.0-test",
        )
        .unwrap();
        (device, clock)
    }

    fn connection_request_packet() -> Vec<u8> {
        let header = packet_header::new_control(HeaderCmd::ConnectionRequest, 0);
        let mut packet = vec![header];
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&512u16.to_be_bytes());
        packet.push(MODE_PASSTHROUGH);
        packet
    }

    fn info_request_packet(request_id: i64) -> Vec<u8> {
        let entries = [(ENV_KEY_API_ID, weave_common::value::Value::Int(API_INFO)), (ENV_KEY_REQUEST_ID, weave_common::value::Value::Int(request_id as i32))];
        let body = encode_to_buffer(&weave_common::value::Value::map(&entries), 32).unwrap();
        let header = packet_header::new_data(true, true, 0);
        let mut packet = vec![header];
        packet.extend_from_slice(body.as_bytes());
        packet
    }

    #[test]
    fn fresh_device_reports_unset_up_advertising_payload() {
        let (device, _clock) = new_device();
        let payload = device.advertising_data();
        assert_eq!(payload.len(), ADVERTISING_PAYLOAD_LEN);
        assert_eq!(payload, device.advertising_data());
    }

    #[test]
    fn connect_and_info_round_trip_over_passthrough() {
        let (mut device, _clock) = new_device();
        let radio = FakeRadio::default();

        radio.push(RadioEvent::Packet(connection_request_packet()));
        assert_eq!(device.handle_events(&radio), WorkState::Busy);
        let confirm = radio.take_sent();
        assert_eq!(confirm.len(), 1);
        assert!(packet_header::is_control(confirm[0][0]));

        radio.push(RadioEvent::Packet(info_request_packet(7)));
        assert_eq!(device.handle_events(&radio), WorkState::Busy);
        let reply = radio.take_sent();
        assert_eq!(reply.len(), 1);
        assert!(packet_header::is_data(reply[0][0]));

        let mut dec = Decoder::new(&reply[0][1..]);
        let map = dec.read_item().unwrap().as_map().unwrap();
        assert!(map.get(ENV_KEY_RESULT).unwrap().is_some());
    }

    #[test]
    fn idle_timeout_disconnects_an_unconfigured_connection() {
        let (mut device, clock) = new_device();
        let radio = FakeRadio::default();

        radio.push(RadioEvent::Packet(connection_request_packet()));
        device.handle_events(&radio);
        assert!(device.channel.is_connected());

        clock.advance(Config::default().unconfigured_idle_timeout_seconds);
        device.handle_events(&radio);
        assert!(!device.channel.is_connected());
    }

    #[test]
    fn stop_makes_further_events_a_no_op() {
        let (mut device, _clock) = new_device();
        let radio = FakeRadio::default();

        device.stop();
        radio.push(RadioEvent::Packet(connection_request_packet()));
        assert_eq!(device.handle_events(&radio), WorkState::Idle);
        assert!(radio.take_sent().is_empty());
    }
}
