// ============================================================
// Layer 6 — Memory Stats Logger
// ============================================================
// Records every reported iteration as one CSV row.
//
// File location:
//   <output_dir>/memory_stats_<YYYYmmdd_HHMMSS>.csv
// The directory is created on demand. If a file with the same
// timestamp already exists a numeric suffix is added, so two
// runs never write into the same file.
//
// Columns (figures in the configured unit, MB by default):
//   epoch, iteration,
//   peak_allocated, peak_cached, current_cached,
//   total_activation, total_weight, weight:<param>...,
//   total_gradient, grad:<param>..., intermediate_gradient
//
// Example CSV output:
//   epoch,iteration,peak_allocated_mb,...,weight:a.weight,...
//   1,10,35,40,40,3,8,5,3,9,5,3,1
//
// Every append opens the file, writes one row and closes it
// again, so rows already written survive a crash mid-training.
// If the parameter set changes between reports a fresh header
// row is written before the next data row.

use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::profiler::lifecycle::MemoryReport;
use crate::profiler::units::MemoryUnit;

pub struct StatsLog {
    /// Full path to the CSV file
    path: PathBuf,

    unit: MemoryUnit,

    /// Parameter names of the header currently in effect
    columns: Vec<String>,
}

impl StatsLog {
    /// Creates the directory and a new timestamped file with its header row.
    pub fn create(dir: &Path, unit: MemoryUnit, parameter_names: Vec<String>) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (path, mut file) = create_unique(dir, &stamp)?;

        writeln!(file, "{}", header(unit, &parameter_names))
            .with_context(|| format!("Cannot write header to '{}'", path.display()))?;
        tracing::info!("Logging memory stats to '{}'", path.display());

        Ok(Self { path, unit, columns: parameter_names })
    }

    /// Appends one report as a CSV row.
    pub fn append(&mut self, report: &MemoryReport) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open '{}' for appending", self.path.display()))?;

        let names: Vec<String> = report.parameter_names().map(str::to_string).collect();
        if names != self.columns {
            tracing::warn!(
                "Parameter set changed ({} → {} columns), writing a new header",
                self.columns.len(),
                names.len()
            );
            writeln!(f, "{}", header(self.unit, &names))?;
            self.columns = names;
        }

        writeln!(f, "{}", row(self.unit, report))?;
        f.flush()?;

        tracing::debug!(
            "Logged memory stats for epoch {} iteration {}",
            report.epoch,
            report.iteration
        );
        Ok(())
    }

    /// Return the path to the CSV file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn create_unique(dir: &Path, stamp: &str) -> Result<(PathBuf, fs::File)> {
    let mut attempt = 0usize;
    loop {
        let name = if attempt == 0 {
            format!("memory_stats_{stamp}.csv")
        } else {
            format!("memory_stats_{stamp}_{attempt}.csv")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot create '{}'", path.display()));
            }
        }
    }
}

/// Header row for the given parameter names.
pub fn header(unit: MemoryUnit, parameter_names: &[String]) -> String {
    let suffix = unit.suffix().to_ascii_lowercase();
    let mut cols = vec![
        "epoch".to_string(),
        "iteration".to_string(),
        format!("peak_allocated_{suffix}"),
        format!("peak_cached_{suffix}"),
        format!("current_cached_{suffix}"),
        format!("total_activation_{suffix}"),
        format!("total_weight_{suffix}"),
    ];
    cols.extend(parameter_names.iter().map(|n| format!("weight:{n}")));
    cols.push(format!("total_gradient_{suffix}"));
    cols.extend(parameter_names.iter().map(|n| format!("grad:{n}")));
    cols.push(format!("intermediate_gradient_{suffix}"));
    cols.join(",")
}

/// Data row for one report, in the column order of `header`.
pub fn row(unit: MemoryUnit, r: &MemoryReport) -> String {
    let mut cols = vec![r.epoch as u64, r.iteration as u64];
    cols.extend(
        [
            r.device.peak_allocated,
            r.device.peak_reserved,
            r.device.current_reserved,
            r.activation_bytes,
            r.weight_bytes,
        ]
        .map(|b| unit.convert(b)),
    );
    cols.extend(r.weight_breakdown.iter().map(|(_, b)| unit.convert(*b)));
    cols.push(unit.convert(r.gradient_bytes));
    cols.extend(r.gradient_breakdown.iter().map(|(_, b)| unit.convert(*b)));
    cols.push(unit.convert(r.intermediate_gradient_bytes));

    cols.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::DeviceMemorySnapshot;

    fn report(names: &[&str]) -> MemoryReport {
        let breakdown: Vec<(String, u64)> = names.iter().map(|n| (n.to_string(), 2_000_000)).collect();
        MemoryReport {
            epoch:                       1,
            iteration:                   10,
            device:                      DeviceMemorySnapshot {
                peak_allocated:    35_000_000,
                current_allocated: 20_000_000,
                peak_reserved:     40_000_000,
                current_reserved:  38_000_000,
            },
            activation_bytes:            3_000_000,
            weight_bytes:                2_000_000 * names.len() as u64,
            weight_breakdown:            breakdown.clone(),
            gradient_bytes:              2_000_000 * names.len() as u64 + 500_000,
            gradient_breakdown:          breakdown,
            intermediate_gradient_bytes: 500_000,
        }
    }

    #[test]
    fn test_header_names_every_column() {
        let h = header(MemoryUnit::Megabytes, &["a.weight".to_string(), "b.weight".to_string()]);
        assert_eq!(
            h,
            "epoch,iteration,peak_allocated_mb,peak_cached_mb,current_cached_mb,\
             total_activation_mb,total_weight_mb,weight:a.weight,weight:b.weight,\
             total_gradient_mb,grad:a.weight,grad:b.weight,intermediate_gradient_mb"
        );
    }

    #[test]
    fn test_row_matches_header_width() {
        let names = ["a.weight", "b.weight"];
        let owned: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let h = header(MemoryUnit::Megabytes, &owned);
        let r = row(MemoryUnit::Megabytes, &report(&names));
        assert_eq!(h.split(',').count(), r.split(',').count());
        assert_eq!(r, "1,10,35,40,38,3,4,2,2,5,2,2,1");
    }

    #[test]
    fn test_create_and_append_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let mut log = StatsLog::create(&dir, MemoryUnit::Megabytes, vec!["a.weight".into()]).unwrap();
        log.append(&report(&["a.weight"])).unwrap();
        log.append(&report(&["a.weight"])).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch,iteration"));
        assert!(log.path().file_name().unwrap().to_string_lossy().starts_with("memory_stats_"));
    }

    #[test]
    fn test_same_second_files_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let a = StatsLog::create(tmp.path(), MemoryUnit::Megabytes, Vec::new()).unwrap();
        let b = StatsLog::create(tmp.path(), MemoryUnit::Megabytes, Vec::new()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_changed_parameters_write_new_header() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = StatsLog::create(tmp.path(), MemoryUnit::Megabytes, vec!["a.weight".into()]).unwrap();
        log.append(&report(&["a.weight", "c.weight"])).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let headers = text.lines().filter(|l| l.starts_with("epoch,")).count();
        assert_eq!(headers, 2);
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the directory should go
        let blocker = tmp.path().join("blocked");
        fs::write(&blocker, "x").unwrap();
        assert!(StatsLog::create(&blocker.join("logs"), MemoryUnit::Megabytes, Vec::new()).is_err());
    }
}
