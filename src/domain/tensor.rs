// ============================================================
// Layer 3 — Tensor Identity and Tensor Record
// ============================================================
// The profiler never touches tensor data. All it needs from a
// tensor is:
//   - WHICH storage backs it   (TensorIdentity, the dedup key)
//   - HOW MANY bytes it holds  (element count × element size)
//
// Identity is a generation-qualified handle issued by the
// storage allocator:
//   slot       — index of the storage slot in the allocator
//   generation — bumped every time the slot is reused
//
// A view or alias of a tensor shares its storage, so it reports
// the same identity. A freed slot that gets reused for a new
// allocation reports a new generation, so it can never be
// mistaken for the tensor that used the slot before.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle identifying one backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorIdentity {
    slot:       u64,
    generation: u32,
}

impl TensorIdentity {
    pub fn new(slot: u64, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for TensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}g{}", self.slot, self.generation)
    }
}

/// What the runtime reports about one tensor when it calls the observer.
///
/// `numel` is the element count of the BACKING STORAGE, not of the
/// logical view. A view of a larger buffer still pins the whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRecord {
    pub identity:     TensorIdentity,
    pub numel:        u64,
    pub element_size: u64,
}

impl TensorRecord {
    pub fn new(identity: TensorIdentity, numel: u64, element_size: u64) -> Self {
        Self { identity, numel, element_size }
    }

    /// Bytes pinned by the backing storage.
    pub fn size_bytes(&self) -> u64 {
        self.numel * self.element_size
    }
}
