//! The persistent blob store collaborator (spec.md §1/§6): a small fixed
//! set of named blobs with atomic-replace semantics, and the storage
//! alignment helper from `original_source/include/uweave/provider/storage.h`.

use weave_common::status::Result;

/// The fixed set of persisted blobs (`UwStorageFileName`). Ids 100+ are
/// reserved for application/vendor use in the original; this core only
/// ever reads/writes the three named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobName {
    Settings,
    Keys,
    Counters,
}

/// A named-blob persistence collaborator. Implementations must guarantee
/// that a failed `put` leaves the previously-stored value readable on the
/// next `get` (spec.md §6, testable property 5) — whether via a
/// write-then-rename scheme, a journal, or wear-leveled flash pages is an
/// implementation detail this trait doesn't constrain.
pub trait Storage {
    fn get(&self, name: BlobName) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, name: BlobName, data: &[u8]) -> Result<()>;
}

/// Rounds `len` up to the storage alignment boundary, matching
/// `uwp_storage_size_align`.
pub fn align_up(len: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (len + alignment - 1) & !(alignment - 1)
}

/// An in-memory [`Storage`] used by tests and by hosts without a real
/// persistence layer. Not crash-safe — a real implementation must honor the
/// atomic-replace contract documented above.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    settings: Option<Vec<u8>>,
    keys: Option<Vec<u8>>,
    counters: Option<Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: BlobName) -> &Option<Vec<u8>> {
        match name {
            BlobName::Settings => &self.settings,
            BlobName::Keys => &self.keys,
            BlobName::Counters => &self.counters,
        }
    }

    fn slot_mut(&mut self, name: BlobName) -> &mut Option<Vec<u8>> {
        match name {
            BlobName::Settings => &mut self.settings,
            BlobName::Keys => &mut self.keys,
            BlobName::Counters => &mut self.counters,
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, name: BlobName) -> Result<Option<Vec<u8>>> {
        Ok(self.slot(name).clone())
    }

    fn put(&mut self, name: BlobName, data: &[u8]) -> Result<()> {
        *self.slot_mut(name) = Some(data.to_vec());
        Ok(())
    }
}
