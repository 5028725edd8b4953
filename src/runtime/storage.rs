// ============================================================
// Layer 5 — Simulated Device Storage
// ============================================================
// A shape-level stand-in for an accelerator allocator. No data
// is stored; only sizes, identities and counters.
//
// Storage identity:
//   Each allocation takes a slot. When the last tensor using a
//   storage is dropped the slot goes back on the free list; the
//   next allocation that reuses it bumps the slot's generation,
//   so the new storage gets a new TensorIdentity.
//
// Counters (caching allocator model):
//   allocated — bytes held by live storages
//   reserved  — bytes the allocator holds from the device;
//               grows in BLOCK_BYTES steps when allocated
//               exceeds it, never shrinks until empty_cache()
//   peaks of both since creation (or reset_peaks())
//
// The arena is shared between tensors through Rc<RefCell<_>>,
// so it is single-threaded.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::domain::tensor::{TensorIdentity, TensorRecord};
use crate::domain::traits::DeviceMemory;

/// Reservation granularity of the caching allocator (2 MiB).
pub const BLOCK_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    live:       bool,
}

#[derive(Debug, Default)]
struct ArenaState {
    slots:          Vec<Slot>,
    free_slots:     Vec<usize>,
    allocated:      u64,
    peak_allocated: u64,
    reserved:       u64,
    peak_reserved:  u64,
}

impl ArenaState {
    fn acquire(&mut self, bytes: u64) -> TensorIdentity {
        let index = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation = slot.generation.wrapping_add(1);
                slot.live = true;
                index
            }
            None => {
                self.slots.push(Slot { generation: 0, live: true });
                self.slots.len() - 1
            }
        };

        self.allocated += bytes;
        self.peak_allocated = self.peak_allocated.max(self.allocated);
        if self.allocated > self.reserved {
            self.reserved = round_up(self.allocated, BLOCK_BYTES);
            self.peak_reserved = self.peak_reserved.max(self.reserved);
        }

        TensorIdentity::new(index as u64, self.slots[index].generation)
    }

    fn release(&mut self, identity: TensorIdentity, bytes: u64) {
        let index = identity.slot() as usize;
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.live && slot.generation == identity.generation() {
                slot.live = false;
                self.free_slots.push(index);
                self.allocated = self.allocated.saturating_sub(bytes);
            }
        }
    }
}

fn round_up(bytes: u64, block: u64) -> u64 {
    bytes.div_ceil(block) * block
}

// ─── StorageArena ─────────────────────────────────────────────────────────────
/// Handle to the shared simulated allocator. Cloning shares the arena.
#[derive(Clone, Default)]
pub struct StorageArena {
    state: Rc<RefCell<ArenaState>>,
}

impl StorageArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a tensor with a fresh storage.
    pub fn tensor(&self, shape: &[usize], element_size: u64) -> SimTensor {
        let numel = shape.iter().product::<usize>() as u64;
        let bytes = numel * element_size;
        let identity = self.state.borrow_mut().acquire(bytes);
        let storage = Storage {
            arena: Rc::clone(&self.state),
            identity,
            numel,
            element_size,
        };
        SimTensor { storage: Rc::new(storage), shape: shape.to_vec() }
    }

    /// Returns cached-but-unused reservation to the device.
    pub fn empty_cache(&self) {
        let mut state = self.state.borrow_mut();
        state.reserved = round_up(state.allocated, BLOCK_BYTES);
    }

    /// Restarts peak tracking from the current values.
    pub fn reset_peaks(&self) {
        let mut state = self.state.borrow_mut();
        state.peak_allocated = state.allocated;
        state.peak_reserved = state.reserved;
    }

    /// Number of storages currently alive
    pub fn live_storages(&self) -> usize {
        self.state.borrow().slots.iter().filter(|s| s.live).count()
    }
}

impl DeviceMemory for StorageArena {
    fn max_memory_allocated(&self) -> u64 {
        self.state.borrow().peak_allocated
    }

    fn memory_allocated(&self) -> u64 {
        self.state.borrow().allocated
    }

    fn max_memory_reserved(&self) -> u64 {
        self.state.borrow().peak_reserved
    }

    fn memory_reserved(&self) -> u64 {
        self.state.borrow().reserved
    }
}

// ─── Storage ──────────────────────────────────────────────────────────────────
struct Storage {
    arena:        Rc<RefCell<ArenaState>>,
    identity:     TensorIdentity,
    numel:        u64,
    element_size: u64,
}

impl Drop for Storage {
    fn drop(&mut self) {
        let bytes = self.numel * self.element_size;
        self.arena.borrow_mut().release(self.identity, bytes);
    }
}

// ─── SimTensor ────────────────────────────────────────────────────────────────
/// A tensor of the simulated runtime: a shape over a shared storage.
#[derive(Clone)]
pub struct SimTensor {
    storage: Rc<Storage>,
    shape:   Vec<usize>,
}

impl SimTensor {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Logical element count of this view
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn identity(&self) -> TensorIdentity {
        self.storage.identity
    }

    pub fn element_size(&self) -> u64 {
        self.storage.element_size
    }

    /// What the observer sees: identity and full storage size.
    pub fn record(&self) -> TensorRecord {
        TensorRecord::new(self.storage.identity, self.storage.numel, self.storage.element_size)
    }

    /// A new shape over the same storage. Returns None if the element
    /// counts differ.
    pub fn view(&self, shape: &[usize]) -> Option<SimTensor> {
        let numel: usize = shape.iter().product();
        (numel == self.numel()).then(|| SimTensor {
            storage: Rc::clone(&self.storage),
            shape:   shape.to_vec(),
        })
    }

    pub fn shares_storage_with(&self, other: &SimTensor) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }
}

impl fmt::Debug for SimTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimTensor")
            .field("identity", &self.storage.identity)
            .field("shape", &self.shape)
            .finish()
    }
}
