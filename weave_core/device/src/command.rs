//! The command slot table (spec.md §3/§4.9): an at-most-one-active /
//! small-recent-history buffer with an eviction policy.
//!
//! Grounded on `original_source/src/command.c` + `src/command_list.c`: a
//! fixed-capacity array of command objects, ids strictly increasing, and
//! eviction that only ever replaces a slot in a "completed" state — never
//! one that is still in flight (testable property 6).

use weave_common::buffer::Buffer;
use weave_common::status::{Result, Status};

/// Ordered from most to least preferred for eviction, matching
/// `UwCommandState`'s doc comment exactly: "ordered by decreasing eviction
/// preference".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommandState {
    Empty,
    Done,
    AsyncQueried,
    Error,
    Cancelled,
    AsyncDone,
    CancelRequested,
    AsyncInProgress,
}

impl CommandState {
    /// States at or above `Cancelled` are "complete" and may be evicted;
    /// everything below is still live and must never be evicted out from
    /// under an in-flight async command.
    fn is_complete(self) -> bool {
        self <= CommandState::Cancelled
    }
}

/// One command slot: trait/name identify the `/execute` call that filled
/// it, `id` is the strictly-increasing handle returned to the client for
/// async polling, and `reply` holds the already-CBOR-encoded result.
#[derive(Debug)]
pub struct Command {
    trait_id: u32,
    name_id: u32,
    id: u32,
    tick_stamp: u32,
    state: CommandState,
    reply: Buffer,
}

impl Command {
    fn new(reply_capacity: usize) -> Self {
        Command {
            trait_id: 0,
            name_id: 0,
            id: 0,
            tick_stamp: 0,
            state: CommandState::Empty,
            reply: Buffer::with_capacity(reply_capacity),
        }
    }

    fn is_initialized(&self) -> bool {
        self.id > 0
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn trait_id(&self) -> u32 {
        self.trait_id
    }

    pub fn name_id(&self) -> u32 {
        self.name_id
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn mark_done(&mut self, reply_cbor: &[u8]) -> Result<()> {
        self.reply.reset();
        self.reply.append(reply_cbor).map_err(|_| Status::PrivetResponseTooLarge)?;
        self.state = CommandState::Done;
        Ok(())
    }

    pub fn mark_error(&mut self, reply_cbor: &[u8]) -> Result<()> {
        self.reply.reset();
        self.reply.append(reply_cbor).map_err(|_| Status::PrivetResponseTooLarge)?;
        self.state = CommandState::Error;
        Ok(())
    }

    pub fn mark_deferred(&mut self) {
        self.state = CommandState::AsyncInProgress;
    }

    pub fn reply_bytes(&self) -> &[u8] {
        self.reply.as_bytes()
    }
}

fn is_preferred(lhs: &Command, candidate: &Command) -> bool {
    if lhs.state == CommandState::Empty && candidate.state != CommandState::Empty {
        return true;
    }
    if lhs.state.is_complete() && candidate.state.is_complete() {
        return lhs.id < candidate.id;
    }
    lhs.state < candidate.state
}

/// Fixed-capacity command table, one per device. Mirrors `UwCommandList`.
pub struct CommandTable {
    commands: Vec<Command>,
    next_id: u32,
}

impl CommandTable {
    pub fn new(capacity: usize, reply_capacity: usize) -> Self {
        CommandTable {
            commands: (0..capacity).map(|_| Command::new(reply_capacity)).collect(),
            next_id: 0,
        }
    }

    /// Finds a free or evictable slot and assigns it a fresh id and tick
    /// stamp. Returns [`Status::CommandNoAvailableBuffers`] if every slot is
    /// still in-flight (`AsyncDone`/`CancelRequested`/`AsyncInProgress`),
    /// matching `uw_command_list_get_free_or_evict_`'s "no eviction
    /// implemented" fallback for those states.
    pub fn allocate(&mut self, uptime_seconds: u32) -> Result<&mut Command> {
        let mut best: Option<usize> = None;
        for i in 0..self.commands.len() {
            best = match best {
                None if self.commands[i].state.is_complete() => Some(i),
                None => None,
                Some(b) => {
                    if is_preferred(&self.commands[i], &self.commands[b]) {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        let index = best.ok_or(Status::CommandNoAvailableBuffers)?;
        self.next_id += 1;
        let command = &mut self.commands[index];
        command.trait_id = 0;
        command.name_id = 0;
        command.id = self.next_id;
        command.tick_stamp = uptime_seconds;
        command.state = CommandState::Empty;
        command.reply.reset();
        Ok(command)
    }

    pub fn set_request(&mut self, command_id: u32, trait_id: u32, name_id: u32) {
        if let Some(command) = self.find_mut(command_id) {
            command.trait_id = trait_id;
            command.name_id = name_id;
        }
    }

    pub fn find(&self, command_id: u32) -> Option<&Command> {
        self.commands.iter().filter(|c| c.is_initialized()).find(|c| c.id == command_id)
    }

    pub fn find_mut(&mut self, command_id: u32) -> Option<&mut Command> {
        self.commands.iter_mut().filter(|c| c.is_initialized()).find(|c| c.id == command_id)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let mut table = CommandTable::new(2, 64);
        let a = table.allocate(0).unwrap().id();
        let b = table.allocate(0).unwrap().id();
        assert!(b > a);
    }

    #[test]
    fn empty_slots_preferred_over_done_slots() {
        let mut table = CommandTable::new(2, 64);
        let first_id = table.allocate(0).unwrap().id();
        table.find_mut(first_id).unwrap().mark_done(&[]).unwrap();

        let second = table.allocate(0).unwrap();
        assert_ne!(second.id(), first_id);
        assert_eq!(second.state(), CommandState::Empty);
    }

    #[test]
    fn no_available_buffers_when_all_in_progress() {
        let mut table = CommandTable::new(1, 64);
        let id = table.allocate(0).unwrap().id();
        table.find_mut(id).unwrap().mark_deferred();
        assert_eq!(table.allocate(0).unwrap_err(), Status::CommandNoAvailableBuffers);
    }

    #[test]
    fn never_evicts_in_progress_while_a_completed_slot_exists() {
        let mut table = CommandTable::new(2, 64);
        let in_progress = table.allocate(0).unwrap().id();
        table.find_mut(in_progress).unwrap().mark_deferred();

        let done = table.allocate(0).unwrap().id();
        table.find_mut(done).unwrap().mark_done(&[]).unwrap();

        // A third allocation must reuse the completed slot, not the
        // in-progress one.
        let third = table.allocate(0).unwrap();
        assert_ne!(third.id(), in_progress);
        assert!(table.find(in_progress).unwrap().state() == CommandState::AsyncInProgress);
    }

    #[test]
    fn completed_ties_break_by_lowest_id() {
        let mut table = CommandTable::new(2, 64);
        let first = table.allocate(0).unwrap().id();
        table.find_mut(first).unwrap().mark_done(&[]).unwrap();
        let second = table.allocate(0).unwrap().id();
        table.find_mut(second).unwrap().mark_done(&[]).unwrap();

        let reused = table.allocate(0).unwrap();
        assert_ne!(reused.id(), first);
        assert_ne!(reused.id(), second);
        // Both prior slots were Done (same eviction preference), so the
        // lowest command id (oldest, `first`) must have been the one reused
        // — meaning the surviving old slot is `second`.
        assert!(table.find(second).is_some());
    }
}
