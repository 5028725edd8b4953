// ============================================================
// Layer 4 — Identity Registry
// ============================================================
// Remembers which storages have already been counted in the
// current accounting window. Every accumulator owns one.

use std::collections::HashSet;

use crate::domain::tensor::TensorIdentity;

#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    seen: HashSet<TensorIdentity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True (and marks it) the first time `identity` is offered in this
    /// window, false on every later call until `clear`.
    pub fn is_new(&mut self, identity: TensorIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn contains(&self, identity: &TensorIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Starts a new window.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
