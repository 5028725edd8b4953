// ============================================================
// Layer 3 — Profiler Errors
// ============================================================
// Typed errors raised by the profiler core. The application
// and CLI layers wrap these in anyhow with extra context.
//
//   InvalidPrintPeriod   — configuration error, fatal
//   UnknownUnit          — unit string not in B/KB/MB/GB, fatal
//   AccountingInvariant  — named gradient bytes exceed the total,
//                          which means something was counted twice

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("print period must be at least 1, got {0}")]
    InvalidPrintPeriod(usize),

    #[error("unknown memory unit '{0}' (expected one of: B, KB, MB, GB)")]
    UnknownUnit(String),

    #[error("{category} accounting is inconsistent: named bytes {named} exceed total {total}")]
    AccountingInvariant {
        category: &'static str,
        total:    u64,
        named:    u64,
    },
}

pub type ProfilerResult<T> = Result<T, ProfilerError>;
