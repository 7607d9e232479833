//! The wake primitive spec.md §5 calls "a tiny notify entry point that must
//! be safe to call from an interrupt handler (its contract is: set a flag /
//! wake primitive only)".
//!
//! [`Notify::notify`] does exactly that: one `AtomicBool` store, no
//! allocation, locking, or I/O. A host clones a [`Notify`] out of the
//! [`crate::Device`] it belongs to and fires it from whatever context
//! observes new radio work (an ISR, a GATT write callback) to wake the
//! thread that calls `handle_events()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Notify(Arc<AtomicBool>);

impl Notify {
    pub fn new() -> Self {
        Notify(Arc::new(AtomicBool::new(false)))
    }

    /// Interrupt-safe: sets the pending flag and returns immediately.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Reads and clears the pending flag. A host loop typically calls this
    /// before blocking, to avoid missing a notification that raced its own
    /// `handle_events()` call.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_flag() {
        let notify = Notify::new();
        assert!(!notify.take());
        notify.notify();
        assert!(notify.take());
        assert!(!notify.take());
    }

    #[test]
    fn clones_share_the_same_flag() {
        let notify = Notify::new();
        let handle = notify.clone();
        handle.notify();
        assert!(notify.take());
    }
}
