//! Time handling: monotonic uptime, wall-clock status, and the J2000/Unix
//! conversion that must happen only at API boundaries (internally, time is
//! always tracked in J2000 seconds).

/// Seconds between the Unix epoch (1970-01-01) and J2000
/// (2000-01-01T00:00:00Z), from `original_source/src/macaroon.h`.
pub const J2000_EPOCH_OFFSET: i64 = 946_684_800;

pub fn unix_to_j2000(unix_seconds: i64) -> i64 {
    unix_seconds - J2000_EPOCH_OFFSET
}

pub fn j2000_to_unix(j2000_seconds: i64) -> i64 {
    j2000_seconds + J2000_EPOCH_OFFSET
}

/// Reported by the info query and gates non-Owner authentication: a
/// non-Owner role may only authenticate once the wall clock is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStatus {
    /// The wall clock has never been set.
    Invalid,
    /// The wall clock was set by an untrusted source (e.g. a non-Owner
    /// setup call) and may be wrong.
    Degraded,
    /// The wall clock was set by a trusted (Owner) source.
    Ok,
}

/// A source of monotonic "uptime" ticks, used for idle timeouts and counter
/// coalescing. Never goes backwards and does not need to track wall time.
pub trait MonotonicClock {
    fn uptime_seconds(&self) -> u32;
}

/// The device's notion of wall-clock time, settable at runtime (via
/// `/setup` or an Owner-authenticated pairing timestamp) and otherwise
/// "unset".
pub trait WallClock {
    fn now_unix(&self) -> Option<i64>;
    fn status(&self) -> TimeStatus;

    /// Sets the wall clock. `trusted` corresponds to an Owner-authority
    /// write (pairing/confirm decrypted timestamp, or `/setup` from an
    /// already-paired Owner); anything else leaves the clock `Degraded`.
    fn set_now_unix(&mut self, unix_seconds: i64, trusted: bool);
}

/// A simple in-memory `WallClock`/`MonotonicClock` used by tests and as a
/// reference implementation for hosts that don't need anything fancier.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    uptime_seconds: u32,
    wall_unix: Option<i64>,
    status: Option<TimeStatus>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the simulated uptime; real hosts back `MonotonicClock` with
    /// actual hardware ticks instead.
    pub fn advance(&mut self, seconds: u32) {
        self.uptime_seconds = self.uptime_seconds.saturating_add(seconds);
    }
}

impl MonotonicClock for SystemClock {
    fn uptime_seconds(&self) -> u32 {
        self.uptime_seconds
    }
}

impl WallClock for SystemClock {
    fn now_unix(&self) -> Option<i64> {
        self.wall_unix
    }

    fn status(&self) -> TimeStatus {
        self.status.unwrap_or(TimeStatus::Invalid)
    }

    fn set_now_unix(&mut self, unix_seconds: i64, trusted: bool) {
        self.wall_unix = Some(unix_seconds);
        self.status = Some(if trusted { TimeStatus::Ok } else { TimeStatus::Degraded });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn j2000_round_trips() {
        let unix = 1_700_000_000_i64;
        assert_eq!(j2000_to_unix(unix_to_j2000(unix)), unix);
    }

    #[test]
    fn clock_starts_invalid() {
        let clock = SystemClock::new();
        assert_eq!(clock.status(), TimeStatus::Invalid);
        assert_eq!(clock.now_unix(), None);
    }

    #[test]
    fn trusted_set_is_ok_status() {
        let mut clock = SystemClock::new();
        clock.set_now_unix(1_700_000_000, true);
        assert_eq!(clock.status(), TimeStatus::Ok);
        clock.set_now_unix(1_700_000_001, false);
        assert_eq!(clock.status(), TimeStatus::Degraded);
    }
}
