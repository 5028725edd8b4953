// ============================================================
// Layer 4 — Profiler Core
// ============================================================
// The deduplicated memory-attribution engine. Leaf first:
//
//   registry.rs    — IdentityRegistry: "counted this storage yet?"
//   accumulator.rs — CategoryAccumulator / NamedAccumulator
//   walker.rs      — flattens the component tree, collects
//                    named parameters
//   ledger.rs      — the three accumulators + parameter set,
//                    and the callback handlers feeding them
//   binder.rs      — registers hooks on every component
//   lifecycle.rs   — MemoryProfiler: counters, reporting,
//                    epoch resets
//   units.rs       — byte → unit conversion (nearest rounding)
//
// Nothing in here depends on a particular tensor runtime; it
// only sees the traits in domain::traits.

pub mod accumulator;
pub mod binder;
pub mod ledger;
pub mod lifecycle;
pub mod registry;
pub mod units;
pub mod walker;

pub use lifecycle::{MemoryProfiler, MemoryReport, ProfilerConfig, ProfilerState};
pub use units::{mb, MemoryUnit};
