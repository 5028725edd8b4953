// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Builds the configured model without running it and describes
// what the profiler would attach to:
//
//   1. the flattened component tree (one line per hooked path,
//      indented by depth, with its kind)
//   2. the tracked parameters and their sizes, tied parameters
//      listed once

use anyhow::{Context, Result};

use crate::application::profile_use_case::{Engine, ProfileConfig};
use crate::domain::traits::Component;
use crate::profiler::units::MemoryUnit;
use crate::profiler::walker::{flatten, named_parameters};
use crate::runtime::build_model;

const NAME_WIDTH: usize = 32;

pub struct InspectUseCase {
    config: ProfileConfig,
}

impl InspectUseCase {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<String> {
        let unit = self.config.profiler.unit;
        match self.config.engine {
            Engine::Sim => {
                let model = build_model(&self.config.model).context("Cannot build the simulated model")?;
                Ok(describe(&model, unit))
            }
            Engine::Burn => {
                let host = crate::ml::trainer::build_host(&self.config.model);
                Ok(describe(&host, unit))
            }
        }
    }
}

/// Component tree and parameter table of `root`.
pub fn describe(root: &dyn Component, unit: MemoryUnit) -> String {
    let components = flatten(root);
    let mut lines = vec![format!("Components ({}, root: {})", components.len(), root.kind())];
    for (path, component) in &components {
        let depth = path.matches('.').count();
        let label = format!("{}{}", "  ".repeat(depth + 1), path);
        lines.push(format!("{:<width$} {}", label, component.kind(), width = NAME_WIDTH));
    }

    let params = named_parameters(root);
    lines.push(format!("Parameters ({})", params.len()));
    let mut total = 0u64;
    for (name, record) in &params {
        total += record.size_bytes();
        lines.push(format!(
            "  {:<width$} {:>7} {}",
            name,
            unit.convert(record.size_bytes()),
            unit,
            width = NAME_WIDTH - 2
        ));
    }
    lines.push(format!("  {:<width$} {:>7} {}", "total", unit.convert(total), unit, width = NAME_WIDTH - 2));

    lines.join("\n")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ModelSpec;

    fn config(engine: Engine) -> ProfileConfig {
        let mut cfg = ProfileConfig {
            engine,
            model: ModelSpec {
                input_features:       8,
                hidden:               vec![16],
                output_features:      4,
                shared_block_repeats: 0,
                element_size:         4,
                bias:                 true,
            },
            ..ProfileConfig::default()
        };
        cfg.profiler.unit = MemoryUnit::Bytes;
        cfg
    }

    #[test]
    fn test_sim_description() {
        let text = InspectUseCase::new(config(Engine::Sim)).execute().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // stem, stem.fc, stem.act, head, head.flatten, head.out
        assert_eq!(lines[0], "Components (6, root: Sequential)");
        assert!(lines[2].trim_start().starts_with("stem.fc"));
        assert!(lines[2].ends_with("Linear"));
        assert_eq!(lines[7], "Parameters (4)");
        // (8·16 + 16 + 16·4 + 4) × 4 bytes
        assert!(lines.last().unwrap().ends_with(&format!("{} B", 212 * 4)));
    }

    #[test]
    fn test_burn_description() {
        let text = InspectUseCase::new(config(Engine::Burn)).execute().unwrap();
        assert!(text.starts_with("Components (3, root: MlpModel)"));
        assert!(text.contains("layers.0.weight"));
        assert!(text.lines().last().unwrap().ends_with(&format!("{} B", 212 * 4)));
    }
}
