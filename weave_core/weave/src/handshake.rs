//! Adapters binding `weave_dispatch::session::Session` to the
//! `Handshake`/`ConnectionObserver` traits `weave_transport::device_channel`
//! requires its type parameters to implement.
//!
//! `DeviceChannel` owns its handshake and observer by value, but a
//! `Session` is also the thing every subsequent RPC dispatch call needs
//! mutable access to — so the two sides share ownership through
//! `Rc<RefCell<_>>` rather than one borrowing from the other, which a
//! self-referential `Device` struct can't express in safe Rust.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use weave_common::buffer::{Buffer, BufferView};
use weave_crypto::providers::{BlockCipher128, Csprng, Sha256};
use weave_device::crypto::DeviceCrypto;
use weave_dispatch::Session;
use weave_transport::device_channel::{ConnectionObserver, Handshake};

pub struct SessionHandshake<C, S, R> {
    pub(crate) session: Rc<RefCell<Session>>,
    pub(crate) device_crypto: Rc<RefCell<DeviceCrypto>>,
    pub(crate) cipher: C,
    pub(crate) rng: R,
    pub(crate) current_time_j2000: Rc<Cell<u32>>,
    pub(crate) _sha: PhantomData<S>,
}

impl<C: BlockCipher128, S: Sha256, R: Csprng> Handshake for SessionHandshake<C, S, R> {
    fn exchange(&mut self, request: BufferView<'_>, confirm: &mut Buffer) -> bool {
        let device_crypto = self.device_crypto.borrow();
        self.session.borrow_mut().handshake_exchange::<C, S, R>(
            &device_crypto,
            &self.cipher,
            &self.rng,
            self.current_time_j2000.get(),
            request,
            confirm,
        )
    }
}

/// Invalidates the session's role/access-control grant whenever the
/// connection it belongs to is torn down. Channel encryption itself is
/// reset by `DeviceChannel::reset()` through the channel, not through here.
pub struct SessionObserver {
    pub(crate) session: Rc<RefCell<Session>>,
}

impl ConnectionObserver for SessionObserver {
    fn on_reset(&mut self) {
        self.session.borrow_mut().invalidate();
    }
}
