//! Device-wide configuration: capacities, timeouts, and the persistence
//! coalesce interval. Each `#define` in
//! `original_source/include/uweave/config.h` becomes a named constant or a
//! [`Config`] field here, per SPEC_FULL.md's ambient-stack guidance.

/// `UW_SETTINGS_MAX_NAME_LENGTH`.
pub const SETTINGS_MAX_NAME_LENGTH: usize = 128;
/// `UW_TRACE_LOG_ENTRY_COUNT`.
pub const TRACE_LOG_ENTRY_COUNT: usize = 256;
/// `UW_STORAGE_ALIGNMENT`. Must be a power of two.
pub const STORAGE_ALIGNMENT: usize = 16;
/// `UW_IDLE_TIMEOUT_SECONDS`: disconnect policy once the device is set up.
pub const IDLE_TIMEOUT_SECONDS: u32 = 7;
/// `UW_UNCONFIGURED_IDLE_TIMEOUT_SECONDS`: disconnect policy before setup.
pub const UNCONFIGURED_IDLE_TIMEOUT_SECONDS: u32 = 120;
/// `kUwCounterCoalesceIntervalSeconds`.
pub const COUNTER_COALESCE_INTERVAL_SECONDS: u32 = 10;
/// `UW_BLE_PACKET_SIZE`: the smallest packet size a device must accept.
pub const MIN_PACKET_SIZE: u16 = 20;
/// `UW_ENABLE_MULTIPAIRING_DEFAULT`.
pub const ENABLE_MULTIPAIRING_DEFAULT: bool = false;

/// Runtime-tunable configuration a host supplies at construction, analogous
/// to `wallet_common`'s typed `Config` structs. Everything that was a
/// compile-time `#define` in the original is a field with the same default
/// here instead, so a host crate can size command/counter tables without
/// recompiling this crate.
#[derive(Debug, Clone)]
pub struct Config {
    pub command_slot_count: usize,
    pub command_reply_capacity: usize,
    pub trace_log_capacity: usize,
    pub local_max_packet_size: u16,
    pub idle_timeout_seconds: u32,
    pub unconfigured_idle_timeout_seconds: u32,
    pub counter_coalesce_interval_seconds: u32,
    pub storage_alignment: usize,
    pub enable_multipairing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            command_slot_count: 4,
            command_reply_capacity: 512,
            trace_log_capacity: TRACE_LOG_ENTRY_COUNT,
            local_max_packet_size: 512,
            idle_timeout_seconds: IDLE_TIMEOUT_SECONDS,
            unconfigured_idle_timeout_seconds: UNCONFIGURED_IDLE_TIMEOUT_SECONDS,
            counter_coalesce_interval_seconds: COUNTER_COALESCE_INTERVAL_SECONDS,
            storage_alignment: STORAGE_ALIGNMENT,
            enable_multipairing: ENABLE_MULTIPAIRING_DEFAULT,
        }
    }
}
