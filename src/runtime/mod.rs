// ============================================================
// Layer 5 — Simulated Device Runtime
// ============================================================
// A host for the profiler that needs no accelerator. It keeps
// the parts of a real runtime the profiler cares about:
//
//   storage.rs — StorageArena: generation-qualified storage
//                identities, caching allocator counters
//   module.rs  — SimModule: nested layers with parameters and
//                gradients
//   engine.rs  — SimModel: forward/backward with hook dispatch
//
// and none of the arithmetic. Tensors are shapes over storages.
//
// build_model() turns a ModelSpec into an MLP-shaped tree:
//
//   stem        Sequential[fc: Linear, act: ReLU]
//   body.N      Sequential[fc: Linear, act: ReLU(inplace)]
//   shared      Repeat × k [block: Sequential[fc, act]]
//   head        Sequential[flatten: Flatten, out: Linear]

pub mod engine;
pub mod module;
pub mod storage;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub use engine::SimModel;
pub use module::SimModule;
pub use storage::{SimTensor, StorageArena};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub input_features:       usize,
    /// Widths of the hidden layers; at least one
    pub hidden:               Vec<usize>,
    pub output_features:      usize,
    /// How many times the shared block runs per forward (0 = no block)
    pub shared_block_repeats: usize,
    /// Bytes per element (4 = f32, 2 = f16)
    pub element_size:         u64,
    pub bias:                 bool,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            input_features:       784,
            hidden:               vec![1024, 1024],
            output_features:      10,
            shared_block_repeats: 2,
            element_size:         4,
            bias:                 true,
        }
    }
}

pub fn build_model(spec: &ModelSpec) -> Result<SimModel> {
    let Some((&first, rest)) = spec.hidden.split_first() else {
        bail!("model needs at least one hidden layer");
    };
    if spec.input_features == 0 || spec.output_features == 0 || spec.hidden.contains(&0) {
        bail!("layer widths must be positive: {:?}", spec);
    }

    let arena = StorageArena::new();
    let es = spec.element_size;
    let linear = |i: usize, o: usize| SimModule::linear(&arena, i, o, spec.bias, es);

    let mut children = vec![(
        "stem",
        SimModule::sequential(vec![("fc", linear(spec.input_features, first)), ("act", SimModule::relu())]),
    )];

    let names: Vec<String> = (0..rest.len()).map(|i| i.to_string()).collect();
    let mut width = first;
    let mut body = Vec::new();
    for (name, &next) in names.iter().zip(rest) {
        body.push((
            name.as_str(),
            SimModule::sequential(vec![("fc", linear(width, next)), ("act", SimModule::inplace_relu())]),
        ));
        width = next;
    }
    if !body.is_empty() {
        children.push(("body", SimModule::sequential(body)));
    }

    if spec.shared_block_repeats > 0 {
        let block = SimModule::sequential(vec![("fc", linear(width, width)), ("act", SimModule::relu())]);
        children.push(("shared", SimModule::repeat(spec.shared_block_repeats, "block", block)));
    }

    children.push((
        "head",
        SimModule::sequential(vec![("flatten", SimModule::flatten()), ("out", linear(width, spec.output_features))]),
    ));

    let root = SimModule::sequential(children);
    Ok(SimModel::new(root, arena, es))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::{Component, DeviceMemory, ParameterGradients};
    use crate::profiler::lifecycle::{MemoryProfiler, ProfilerConfig};
    use crate::profiler::units::MemoryUnit;
    use crate::profiler::walker::{flatten, named_parameters};

    fn small_spec() -> ModelSpec {
        ModelSpec {
            input_features:       8,
            hidden:               vec![16, 16],
            output_features:      4,
            shared_block_repeats: 2,
            element_size:         4,
            bias:                 false,
        }
    }

    fn profiler_for(model: &mut SimModel, print_period: usize) -> MemoryProfiler {
        let cfg = ProfilerConfig { print_period, ..ProfilerConfig::default() };
        MemoryProfiler::new(model, cfg).unwrap()
    }

    /// One training step: forward, backward, tape released
    fn step(model: &mut SimModel, profiler: &mut MemoryProfiler, rows: usize) {
        let x = model.input(&[rows, 8]);
        model.forward(x, profiler).unwrap();
        model.backward(profiler).unwrap();
    }

    #[test]
    fn test_built_tree_layout() {
        let model = build_model(&small_spec()).unwrap();
        let paths: Vec<String> = flatten(&model).into_keys().collect();
        assert_eq!(
            paths,
            vec![
                "stem", "stem.fc", "stem.act",
                "body", "body.0", "body.0.fc", "body.0.act",
                "shared", "shared.block", "shared.block.fc", "shared.block.act",
                "head", "head.flatten", "head.out",
            ]
        );
        assert_eq!(named_parameters(&model).len(), 4);
    }

    #[test]
    fn test_empty_hidden_is_rejected() {
        let spec = ModelSpec { hidden: Vec::new(), ..small_spec() };
        assert!(build_model(&spec).is_err());
    }

    #[test]
    fn test_backward_without_forward_fails() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        assert!(model.backward(&mut profiler).is_err());
    }

    #[test]
    fn test_activations_count_fresh_buffers_and_dedup_inplace() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        let x = model.input(&[2, 8]);
        model.forward(x, &mut profiler).unwrap();

        // Fresh outputs, 2 rows × width × 4 bytes each:
        //   stem.fc 16, stem.act 16, body.0.fc 16,
        //   shared.block.fc 16 ×2, shared.block.act 16 ×2, head.out 4
        // Containers and in-place/flatten outputs alias one of those.
        let expected = 2 * 4 * (16 * 7 + 4);
        assert_eq!(profiler.ledger().activation_bytes(), expected as u64);
    }

    #[test]
    fn test_parameter_gradients_are_named_and_intermediates_are_not() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        step(&mut model, &mut profiler, 2);

        let report = profiler.record_step(&model, &model).unwrap().unwrap();
        let named: u64 = report.gradient_breakdown.iter().map(|(_, b)| b).sum();
        // Every parameter got exactly its own size in gradients
        assert_eq!(named, report.weight_bytes);
        for (name, bytes) in &report.gradient_breakdown {
            let weight = report.weight_breakdown.iter().find(|(n, _)| n == name).unwrap().1;
            assert_eq!(*bytes, weight);
        }
        assert_eq!(report.gradient_bytes, named + report.intermediate_gradient_bytes);
        assert!(report.intermediate_gradient_bytes > 0);
    }

    #[test]
    fn test_gradients_persist_across_steps_until_zero_grad() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        step(&mut model, &mut profiler, 2);
        let first = model.gradient_of("stem.fc.weight").unwrap().identity;
        step(&mut model, &mut profiler, 2);
        assert_eq!(model.gradient_of("stem.fc.weight").unwrap().identity, first);

        model.zero_grad();
        assert!(model.gradient_of("stem.fc.weight").is_none());
    }

    #[test]
    fn test_tape_release_frees_activations() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        let weights = model.memory_allocated();
        step(&mut model, &mut profiler, 4);
        model.zero_grad();
        assert_eq!(model.memory_allocated(), weights);
        assert!(model.max_memory_allocated() > weights);
        assert!(!model.has_tape());
    }

    #[test]
    fn test_epoch_reset_then_recount() {
        let mut model = build_model(&small_spec()).unwrap();
        let mut profiler = profiler_for(&mut model, 1);
        step(&mut model, &mut profiler, 2);
        let first = profiler.record_step(&model, &model).unwrap().unwrap();

        profiler.end_epoch();
        model.zero_grad();
        step(&mut model, &mut profiler, 2);
        let second = profiler.record_step(&model, &model).unwrap().unwrap();

        assert_eq!(second.epoch, 2);
        assert_eq!(second.iteration, 1);
        assert_eq!(second.activation_bytes, first.activation_bytes);
        assert_eq!(second.gradient_bytes, first.gradient_bytes);
    }

    #[test]
    fn test_leaf_model_tracks_root_parameters() {
        let arena = StorageArena::new();
        let root = SimModule::linear(&arena, 8, 4, true, 4);
        let mut model = SimModel::new(root, arena, 4);
        let mut profiler = profiler_for(&mut model, 1);
        assert_eq!(profiler.instrumentation().component_count(), 0);

        let x = model.input(&[1, 8]);
        model.forward(x, &mut profiler).unwrap();
        model.backward(&mut profiler).unwrap();
        let report = profiler.record_step(&model, &model).unwrap().unwrap();

        // No component hooks → no activations; the model hook still sees
        // the parameter gradients
        assert_eq!(report.activation_bytes, 0);
        assert_eq!(report.weight_bytes, (8 * 4 + 4) * 4);
        assert_eq!(report.gradient_bytes - report.intermediate_gradient_bytes, report.weight_bytes);
        assert_eq!(model.kind(), "Linear");
    }

    /// Every data row of a CSV log as "column → value", using the header in effect
    fn csv_rows(text: &str) -> Vec<std::collections::HashMap<String, u64>> {
        let mut header: Vec<&str> = Vec::new();
        let mut rows = Vec::new();
        for line in text.lines() {
            if line.starts_with("epoch,") {
                header = line.split(',').collect();
                continue;
            }
            let values = line.split(',').map(|v| v.parse::<u64>().unwrap());
            rows.push(header.iter().map(|h| h.to_string()).zip(values).collect());
        }
        rows
    }

    #[test]
    fn test_parameters_added_and_removed_between_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let mut model = build_model(&small_spec()).unwrap();
        let cfg = ProfilerConfig {
            print_period: 1,
            log_to_file:  true,
            output_dir:   tmp.path().to_path_buf(),
            unit:         MemoryUnit::Bytes,
        };
        let mut profiler = MemoryProfiler::new(&mut model, cfg).unwrap();
        step(&mut model, &mut profiler, 2);
        profiler.record_step(&model, &model).unwrap().unwrap();

        // A root-level parameter is discovered ahead of every existing one
        let scale = model.input(&[16]);
        model.root_mut().insert_param("scale", scale);
        step(&mut model, &mut profiler, 2);
        let report = profiler.record_step(&model, &model).unwrap().unwrap();

        let weight_names: Vec<&str> = report.weight_breakdown.iter().map(|(n, _)| n.as_str()).collect();
        let grad_names: Vec<&str> = report.gradient_breakdown.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(weight_names[0], "scale");
        assert_eq!(grad_names, weight_names);

        let tracked = profiler.tracked_parameters();
        assert!(!tracked.iter().find(|p| p.name == "scale").unwrap().has_gradient());
        assert!(tracked.iter().find(|p| p.name == "stem.fc.weight").unwrap().has_gradient());

        // Dropping a parameter moves its gradient bytes into the intermediate figure
        let removed = model.root_mut().find_mut("head.out").unwrap().remove_param("weight").unwrap();
        let removed_bytes = removed.value.record().size_bytes();
        let after = profiler.record_step(&model, &model).unwrap().unwrap();
        assert!(after.gradient_breakdown.iter().all(|(n, _)| n != "head.out.weight"));
        assert_eq!(after.gradient_bytes, report.gradient_bytes);
        assert_eq!(after.intermediate_gradient_bytes, report.intermediate_gradient_bytes + removed_bytes);

        // The log carries one header per parameter set, each row under its own names
        let text = std::fs::read_to_string(profiler.log_path().unwrap()).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("epoch,")).count(), 3);
        let rows = csv_rows(&text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["weight:scale"], 16 * 4);
        assert_eq!(rows[1]["grad:scale"], 0);
        assert_eq!(rows[1]["grad:stem.fc.weight"], 16 * 8 * 4);
        assert_eq!(rows[1]["grad:head.out.weight"], removed_bytes);
        assert!(!rows[2].contains_key("grad:head.out.weight"));
    }
}
