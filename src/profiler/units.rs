// ============================================================
// Layer 4 — Byte Unit Conversion
// ============================================================
// Reported figures are whole numbers in a chosen unit.
// Conversion rounds to the NEAREST integer (half up) so a small
// but non-zero allocation does not show up as 0 once it
// reaches half a unit:
//
//   MB(0)         = 0
//   MB(499_999)   = 0
//   MB(500_000)   = 1
//   MB(999_999)   = 1
//   MB(5_000_000) = 5
//
// Units are decimal (1 MB = 1_000_000 bytes).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ProfilerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryUnit {
    #[serde(rename = "B")]
    Bytes,
    #[serde(rename = "KB")]
    Kilobytes,
    #[default]
    #[serde(rename = "MB")]
    Megabytes,
    #[serde(rename = "GB")]
    Gigabytes,
}

impl MemoryUnit {
    pub fn bytes_per_unit(self) -> u64 {
        match self {
            MemoryUnit::Bytes     => 1,
            MemoryUnit::Kilobytes => 1_000,
            MemoryUnit::Megabytes => 1_000_000,
            MemoryUnit::Gigabytes => 1_000_000_000,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            MemoryUnit::Bytes     => "B",
            MemoryUnit::Kilobytes => "KB",
            MemoryUnit::Megabytes => "MB",
            MemoryUnit::Gigabytes => "GB",
        }
    }

    /// Converts `bytes` to this unit, rounding half up.
    pub fn convert(self, bytes: u64) -> u64 {
        let per = self.bytes_per_unit();
        if per == 1 {
            return bytes;
        }
        // Split instead of (bytes + per / 2) / per so u64::MAX cannot overflow
        bytes / per + u64::from(bytes % per >= per / 2)
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for MemoryUnit {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" | "BYTES" => Ok(MemoryUnit::Bytes),
            "KB"          => Ok(MemoryUnit::Kilobytes),
            "MB"          => Ok(MemoryUnit::Megabytes),
            "GB"          => Ok(MemoryUnit::Gigabytes),
            _             => Err(ProfilerError::UnknownUnit(s.to_string())),
        }
    }
}

/// Bytes → megabytes, nearest integer.
pub fn mb(bytes: u64) -> u64 {
    MemoryUnit::Megabytes.convert(bytes)
}
