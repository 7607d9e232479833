//! The composition root of the uweave-rs device core (spec.md §9
//! "Global-ish device pointer"): wires `weave_transport`'s framing,
//! `weave_dispatch`'s session/RPC layer, and `weave_device`'s persisted
//! state into one `Device`, and defines the host-facing capability traits
//! (`Radio`) spec.md §1/§6 call out as external collaborators that the
//! crates below this one don't themselves need to know about.
//!
//! A host links this crate, implements `Radio` and `weave_device::storage::
//! Storage` for its platform, picks a `CommandExecutor`/`StateProvider` for
//! its application traits, and drives `Device::handle_events()` from
//! whatever scheduler it already has — bring-up/CLI glue is out of scope
//! (spec.md §1), same as for every crate below this one.

mod device;
mod handshake;
mod notify;
mod radio;

pub use device::{Device, WorkState};
pub use notify::Notify;
pub use radio::{Radio, RadioEvent};
