// ============================================================
// Layer 4 — Category Accumulators
// ============================================================
// One accumulator per memory category:
//
//   activations → CategoryAccumulator  (total only)
//   weights     → NamedAccumulator     (total + per-parameter)
//   gradients   → NamedAccumulator     (total + per-parameter)
//
// Every byte goes through the accumulator's IdentityRegistry
// first, so offering the same storage twice never counts it
// twice.
//
// For named accumulators the per-name buckets are a subset of
// the total:
//
//   total - sum(buckets) = unnamed ("intermediate") bytes ≥ 0
//
// A negative remainder can only come from a bucket being fed
// bytes that bypassed the registry, so it is reported as an
// AccountingInvariant error instead of being clamped.

use indexmap::IndexMap;

use crate::domain::error::{ProfilerError, ProfilerResult};
use crate::domain::tensor::TensorIdentity;
use crate::profiler::registry::IdentityRegistry;

// ─── CategoryAccumulator ──────────────────────────────────────────────────────
#[derive(Debug, Default, Clone)]
pub struct CategoryAccumulator {
    registry:    IdentityRegistry,
    total_bytes: u64,
}

impl CategoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `size_bytes` if `identity` has not been counted in this window.
    /// Returns whether the bytes were added.
    pub fn add_if_new(&mut self, identity: TensorIdentity, size_bytes: u64) -> bool {
        if self.registry.is_new(identity) {
            self.total_bytes += size_bytes;
            true
        } else {
            false
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of distinct storages counted in this window
    pub fn distinct_tensors(&self) -> usize {
        self.registry.len()
    }

    /// Drops the total and the identity set.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.total_bytes = 0;
    }
}

// ─── NamedAccumulator ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct NamedAccumulator {
    category: &'static str,
    totals:   CategoryAccumulator,
    buckets:  IndexMap<String, u64>,
}

impl NamedAccumulator {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            totals:  CategoryAccumulator::new(),
            buckets: IndexMap::new(),
        }
    }

    /// Counts an unnamed tensor: total only.
    pub fn add_if_new(&mut self, identity: TensorIdentity, size_bytes: u64) -> bool {
        self.totals.add_if_new(identity, size_bytes)
    }

    /// Counts a tensor attributed to `name`: total and the name's bucket.
    pub fn add_named(&mut self, name: &str, identity: TensorIdentity, size_bytes: u64) -> bool {
        if !self.totals.add_if_new(identity, size_bytes) {
            return false;
        }
        match self.buckets.get_mut(name) {
            Some(bytes) => *bytes += size_bytes,
            None => {
                self.buckets.insert(name.to_string(), size_bytes);
            }
        }
        true
    }

    /// Replaces the bucket list with `names`, in that order. Surviving
    /// names keep their bytes, new names start at zero, and the bytes of
    /// dropped names stay in the total (so they become intermediate).
    pub fn rebuild_buckets<'n>(&mut self, names: impl IntoIterator<Item = &'n str>) {
        let mut old = std::mem::take(&mut self.buckets);
        self.buckets = names
            .into_iter()
            .map(|name| (name.to_string(), old.swap_remove(name).unwrap_or(0)))
            .collect();
    }

    pub fn bucket(&self, name: &str) -> u64 {
        self.buckets.get(name).copied().unwrap_or(0)
    }

    pub fn buckets(&self) -> &IndexMap<String, u64> {
        &self.buckets
    }

    pub fn total_bytes(&self) -> u64 {
        self.totals.total_bytes()
    }

    pub fn named_bytes(&self) -> u64 {
        self.buckets.values().sum()
    }

    /// Bytes counted in the total but not attributed to any name.
    pub fn intermediate_bytes(&self) -> ProfilerResult<u64> {
        let total = self.total_bytes();
        let named = self.named_bytes();
        total
            .checked_sub(named)
            .ok_or(ProfilerError::AccountingInvariant { category: self.category, total, named })
    }

    /// Clears totals and identities and zeroes every bucket; names survive.
    pub fn reset(&mut self) {
        self.totals.reset();
        self.buckets.values_mut().for_each(|b| *b = 0);
    }

    /// Clears everything including bucket names.
    pub fn clear(&mut self) {
        self.totals.reset();
        self.buckets.clear();
    }
}
