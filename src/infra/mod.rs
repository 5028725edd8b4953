// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Output concerns the profiler core and the use cases share:
//
//   report.rs       — Console report
//                     Renders a MemoryReport as a titled block
//                     with per-parameter breakdowns.
//
//   stats_log.rs    — Structured CSV log
//                     One row per reported iteration in a
//                     timestamped file, appended with a fresh
//                     file handle per row.
//
//   config_store.rs — Run configuration persistence
//                     Saves/loads ProfileConfig as JSON.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Console rendering of memory reports
pub mod report;

/// Append-only CSV log of memory reports
pub mod stats_log;

/// ProfileConfig JSON persistence
pub mod config_store;
