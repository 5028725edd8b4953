// ============================================================
// Layer 5 — Simulated Execution Engine
// ============================================================
// SimModel runs forward and backward passes over a SimModule
// tree and invokes the observer at the hooked paths.
//
// Forward:
//   Each module invocation produces a Frame holding its input
//   and output tensors (what autograd would save). The frames
//   form the tape; while the tape lives, so do the activations.
//
// Backward (tape in reverse):
//   Linear       — allocates grad_input, allocates or reuses the
//                  weight/bias .grad (accumulation keeps storage)
//   Relu         — allocates grad_input
//   InplaceRelu  — reuses grad_output as grad_input
//   Flatten      — view of grad_output
//   containers   — chain their children's gradients
//   The model input does not require a gradient, so the first
//   leaf on the data path gets None as grad_input.
//
// After each module's backward, a registered backward hook on
// its path fires; the root frame has path "" so the whole-model
// hook fires last.

use anyhow::{anyhow, bail, Result};
use std::collections::HashSet;

use crate::domain::tensor::TensorRecord;
use crate::domain::traits::{
    Component, DeviceMemory, ExecutionObserver, HookHandle, HookHost, HookKind, ParameterGradients,
};
use crate::profiler::walker::join_path;
use crate::runtime::module::{Layer, SimModule};
use crate::runtime::storage::{SimTensor, StorageArena};

struct Frame {
    path:     String,
    layer:    Layer,
    input:    SimTensor,
    output:   SimTensor,
    children: Vec<Frame>,
}

struct Hooks<'h> {
    forward:  &'h HashSet<String>,
    backward: &'h HashSet<String>,
}

pub struct SimModel {
    root:           SimModule,
    arena:          StorageArena,
    element_size:   u64,
    forward_hooks:  HashSet<String>,
    backward_hooks: HashSet<String>,
    next_hook_id:   u64,
    tape:           Option<Frame>,
}

impl SimModel {
    pub fn new(root: SimModule, arena: StorageArena, element_size: u64) -> Self {
        Self {
            root,
            arena,
            element_size,
            forward_hooks:  HashSet::new(),
            backward_hooks: HashSet::new(),
            next_hook_id:   0,
            tape:           None,
        }
    }

    pub fn root(&self) -> &SimModule {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut SimModule {
        &mut self.root
    }

    pub fn arena(&self) -> &StorageArena {
        &self.arena
    }

    /// Allocates an input batch of shape `shape`.
    pub fn input(&self, shape: &[usize]) -> SimTensor {
        self.arena.tensor(shape, self.element_size)
    }

    /// Runs the model on `input`, keeping the tape for `backward`.
    /// A tape left over from an earlier forward is discarded.
    pub fn forward(&mut self, input: SimTensor, observer: &mut dyn ExecutionObserver) -> Result<SimTensor> {
        self.tape = None;
        let hooks = Hooks { forward: &self.forward_hooks, backward: &self.backward_hooks };
        let frame = forward_module(&self.root, String::new(), input, &self.arena, &hooks, observer)?;
        let output = frame.output.clone();
        self.tape = Some(frame);
        Ok(output)
    }

    /// Back-propagates a gradient of ones from the last forward output,
    /// then frees the tape.
    pub fn backward(&mut self, observer: &mut dyn ExecutionObserver) -> Result<()> {
        let frame = self
            .tape
            .take()
            .ok_or_else(|| anyhow!("backward called without a preceding forward pass"))?;

        let seed = self.arena.tensor(frame.output.shape(), self.element_size);
        let hooks = Hooks { forward: &self.forward_hooks, backward: &self.backward_hooks };
        backward_frame(&mut self.root, &frame, seed, false, &self.arena, &hooks, observer)?;
        Ok(())
    }

    /// Drops all parameter gradients.
    pub fn zero_grad(&mut self) {
        self.root.zero_grad();
    }

    pub fn has_tape(&self) -> bool {
        self.tape.is_some()
    }

    fn next_handle(&mut self, kind: HookKind, path: &str) -> HookHandle {
        let id = self.next_hook_id;
        self.next_hook_id += 1;
        HookHandle { kind, path: path.to_string(), id }
    }
}

fn forward_module(
    module:   &SimModule,
    path:     String,
    input:    SimTensor,
    arena:    &StorageArena,
    hooks:    &Hooks<'_>,
    observer: &mut dyn ExecutionObserver,
) -> Result<Frame> {
    let element_size = input.element_size();
    let rows = input.shape().first().copied().unwrap_or(1);
    let mut children = Vec::new();

    let output = match module.layer() {
        Layer::Sequential => {
            let mut current = input.clone();
            for (name, child) in module.child_modules() {
                let frame = forward_module(child, join_path(&path, name), current, arena, hooks, observer)?;
                current = frame.output.clone();
                children.push(frame);
            }
            current
        }
        Layer::Repeat { times } => {
            let mut current = input.clone();
            for _ in 0..times {
                for (name, child) in module.child_modules() {
                    let frame = forward_module(child, join_path(&path, name), current, arena, hooks, observer)?;
                    current = frame.output.clone();
                    children.push(frame);
                }
            }
            current
        }
        Layer::Linear { in_features, out_features } => {
            let features = input.numel() / rows.max(1);
            if features != in_features {
                bail!("'{}' expects {} input features, got shape {:?}", path, in_features, input.shape());
            }
            arena.tensor(&[rows, out_features], element_size)
        }
        Layer::Relu => arena.tensor(input.shape(), element_size),
        Layer::InplaceRelu => input.clone(),
        Layer::Flatten => {
            let flat = input.numel() / rows.max(1);
            input
                .view(&[rows, flat])
                .ok_or_else(|| anyhow!("'{}' cannot flatten shape {:?}", path, input.shape()))?
        }
    };

    if hooks.forward.contains(&path) {
        observer.post_forward(&path, &[input.record()], &output.record());
    }

    Ok(Frame { path, layer: module.layer(), input, output, children })
}

fn backward_frame(
    root:          &mut SimModule,
    frame:         &Frame,
    grad_output:   SimTensor,
    needs_grad_in: bool,
    arena:         &StorageArena,
    hooks:         &Hooks<'_>,
    observer:      &mut dyn ExecutionObserver,
) -> Result<Option<SimTensor>> {
    let element_size = grad_output.element_size();

    let grad_input = match frame.layer {
        Layer::Sequential | Layer::Repeat { .. } => {
            let mut grad = Some(grad_output.clone());
            for (i, child) in frame.children.iter().enumerate().rev() {
                let upstream = grad
                    .take()
                    .ok_or_else(|| anyhow!("missing gradient flowing into '{}'", child.path))?;
                grad = backward_frame(root, child, upstream, i > 0 || needs_grad_in, arena, hooks, observer)?;
            }
            if frame.children.is_empty() && !needs_grad_in {
                None
            } else {
                grad
            }
        }
        Layer::Linear { .. } => {
            let module = root
                .find_mut(&frame.path)
                .ok_or_else(|| anyhow!("module '{}' vanished between forward and backward", frame.path))?;
            for (_, param) in module.params_mut() {
                // An existing .grad accumulates in place
                if param.grad.is_none() {
                    param.grad = Some(arena.tensor(param.value.shape(), element_size));
                }
            }
            needs_grad_in.then(|| arena.tensor(frame.input.shape(), element_size))
        }
        Layer::Relu => needs_grad_in.then(|| arena.tensor(frame.input.shape(), element_size)),
        Layer::InplaceRelu => needs_grad_in.then(|| grad_output.clone()),
        Layer::Flatten if needs_grad_in => Some(
            grad_output
                .view(frame.input.shape())
                .ok_or_else(|| anyhow!("'{}' cannot unflatten its gradient", frame.path))?,
        ),
        Layer::Flatten => None,
    };

    if hooks.backward.contains(&frame.path) {
        let grad_inputs = [grad_input.as_ref().map(SimTensor::record)];
        let grad_outputs = [Some(grad_output.record())];
        observer.post_backward(&frame.path, &grad_inputs, &grad_outputs, &*root);
    }

    Ok(grad_input)
}

// ─── Runtime boundary ─────────────────────────────────────────────────────────
impl Component for SimModel {
    fn kind(&self) -> &str {
        self.root.kind()
    }

    fn children(&self) -> Vec<(&str, &dyn Component)> {
        self.root.children()
    }

    fn parameters(&self) -> Vec<(&str, TensorRecord)> {
        self.root.parameters()
    }
}

impl HookHost for SimModel {
    fn register_forward_hook(&mut self, path: &str) -> HookHandle {
        self.forward_hooks.insert(path.to_string());
        self.next_handle(HookKind::Forward, path)
    }

    fn register_backward_hook(&mut self, path: &str) -> HookHandle {
        self.backward_hooks.insert(path.to_string());
        self.next_handle(HookKind::Backward, path)
    }
}

impl ParameterGradients for SimModel {
    fn gradient_of(&self, name: &str) -> Option<TensorRecord> {
        self.root.gradient_of(name)
    }
}

impl DeviceMemory for SimModel {
    fn max_memory_allocated(&self) -> u64 {
        self.arena.max_memory_allocated()
    }

    fn memory_allocated(&self) -> u64 {
        self.arena.memory_allocated()
    }

    fn max_memory_reserved(&self) -> u64 {
        self.arena.max_memory_reserved()
    }

    fn memory_reserved(&self) -> u64 {
        self.arena.memory_reserved()
    }
}
