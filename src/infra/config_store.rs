// ============================================================
// Layer 6 — Run Configuration Store
// ============================================================
// Saves and restores the ProfileConfig of a run as JSON.
//
// What gets written:
//   <output_dir>/profile_config.json  — the resolved run config
//
// Saving it next to the CSV log means every log file can be
// traced back to the model shape and settings that produced it.
// The same JSON can be fed back with `profile --config <file>`
// to repeat a run.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::application::profile_use_case::ProfileConfig;

pub const CONFIG_FILE: &str = "profile_config.json";

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes `<dir>/profile_config.json`, creating the directory if needed.
    pub fn save(&self, cfg: &ProfileConfig) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(path)
    }

    /// Reads a config previously written by `save` (or by hand).
    pub fn load(path: &Path) -> Result<ProfileConfig> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid profile config", path.display()))
    }
}
