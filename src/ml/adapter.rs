// ============================================================
// Layer 5 — Burn Runtime Adapter
// ============================================================
// BurnHost lets the memory profiler observe an MlpModel running
// on a burn backend. burn has no module hooks and no storage
// handles, so the adapter supplies both:
//
//   Component tree   — a snapshot of the model rebuilt by refresh()
//                      (MlpModel → layers: Vec → N × Linear, head)
//   HookHost         — remembers which paths the profiler hooked
//   forward          — observe_forward() is called from
//                      MlpModel::forward_observed for each Linear
//   backward         — observe_backward() reads every parameter
//                      gradient out of B::Gradients, then fires the
//                      backward hooks children-first, whole model last
//
// Identities:
//   Weights keep one identity per parameter name for the host's
//   lifetime (the optimizer swaps tensors but the parameter is
//   the same allocation from the model's point of view). Every
//   observed activation and every backward pass's gradients get
//   fresh identities, since burn returns new tensors for both.
//
// burn does not expose intermediate gradients, so backward hooks
// receive empty gradient lists, and it has no allocator counters,
// so DeviceMemory reads as zero.

use burn::{nn::Linear, prelude::*, tensor::backend::AutodiffBackend};
use std::collections::{HashMap, HashSet};

use crate::domain::tensor::{TensorIdentity, TensorRecord};
use crate::domain::traits::{
    Component, DeviceMemory, ExecutionObserver, HookHandle, HookHost, HookKind, ParameterGradients,
};
use crate::ml::model::MlpModel;

// ─── Snapshot tree ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
struct Node {
    kind:     &'static str,
    children: Vec<(String, Node)>,
    params:   Vec<(String, TensorRecord)>,
}

impl Node {
    fn container(kind: &'static str, children: Vec<(String, Node)>) -> Self {
        Self { kind, children, params: Vec::new() }
    }
}

impl Component for Node {
    fn kind(&self) -> &str {
        self.kind
    }

    fn children(&self) -> Vec<(&str, &dyn Component)> {
        self.children
            .iter()
            .map(|(name, node)| (name.as_str(), node as &dyn Component))
            .collect()
    }

    fn parameters(&self) -> Vec<(&str, TensorRecord)> {
        self.params.iter().map(|(name, r)| (name.as_str(), *r)).collect()
    }
}

// ─── BurnHost ─────────────────────────────────────────────────────────────────
pub struct BurnHost {
    root:           Node,
    element_size:   u64,
    next_slot:      u64,
    weight_ids:     HashMap<String, TensorIdentity>,
    gradients:      HashMap<String, TensorRecord>,
    forward_hooks:  HashSet<String>,
    /// In registration order (pre-order, whole model last)
    backward_hooks: Vec<String>,
    next_hook_id:   u64,
}

impl BurnHost {
    pub fn new<B: Backend>(model: &MlpModel<B>) -> Self {
        let mut host = Self {
            root:           Node::container("MlpModel", Vec::new()),
            element_size:   std::mem::size_of::<B::FloatElem>() as u64,
            next_slot:      0,
            weight_ids:     HashMap::new(),
            gradients:      HashMap::new(),
            forward_hooks:  HashSet::new(),
            backward_hooks: Vec::new(),
            next_hook_id:   0,
        };
        host.refresh(model);
        host
    }

    /// Rebuilds the component snapshot from the current model.
    /// Call after every optimizer step.
    pub fn refresh<B: Backend>(&mut self, model: &MlpModel<B>) {
        let mut live = HashSet::new();

        let mut layers = Vec::with_capacity(model.layers.len());
        for (i, linear) in model.layers.iter().enumerate() {
            let node = self.linear_node(&format!("layers.{i}"), linear, &mut live);
            layers.push((i.to_string(), node));
        }
        let head = self.linear_node("head", &model.head, &mut live);

        self.root = Node::container(
            "MlpModel",
            vec![
                ("layers".to_string(), Node::container("Vec", layers)),
                ("head".to_string(), head),
            ],
        );
        self.weight_ids.retain(|name, _| live.contains(name));
    }

    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Reports `output` of the component at `path` if it is hooked.
    pub fn observe_forward<B: Backend, const D: usize>(
        &mut self,
        path:     &str,
        output:   &Tensor<B, D>,
        observer: &mut dyn ExecutionObserver,
    ) {
        if !self.forward_hooks.contains(path) {
            return;
        }
        let record = self.fresh_record(output.shape().num_elements());
        observer.post_forward(path, &[], &record);
    }

    /// Collects the parameter gradients of one backward pass and fires
    /// the registered backward hooks.
    pub fn observe_backward<B: AutodiffBackend>(
        &mut self,
        model:    &MlpModel<B>,
        grads:    &B::Gradients,
        observer: &mut dyn ExecutionObserver,
    ) {
        self.gradients.clear();
        for (path, linear) in model.named_linears() {
            if let Some(grad) = linear.weight.val().grad(grads) {
                let record = self.fresh_record(grad.shape().num_elements());
                self.gradients.insert(format!("{path}.weight"), record);
            }
            if let Some(bias) = &linear.bias {
                if let Some(grad) = bias.val().grad(grads) {
                    let record = self.fresh_record(grad.shape().num_elements());
                    self.gradients.insert(format!("{path}.bias"), record);
                }
            }
        }
        tracing::debug!("burn backward produced {} parameter gradients", self.gradients.len());

        let host: &Self = self;
        for path in host.backward_hooks.iter().rev().filter(|p| !p.is_empty()) {
            observer.post_backward(path, &[], &[], host);
        }
        if host.backward_hooks.iter().any(|p| p.is_empty()) {
            observer.post_backward("", &[], &[], host);
        }
    }

    fn linear_node<B: Backend>(&mut self, path: &str, linear: &Linear<B>, live: &mut HashSet<String>) -> Node {
        let mut params = Vec::with_capacity(2);
        let weight = linear.weight.val().shape().num_elements();
        params.push(("weight".to_string(), self.weight_record(format!("{path}.weight"), weight, live)));
        if let Some(bias) = &linear.bias {
            let numel = bias.val().shape().num_elements();
            params.push(("bias".to_string(), self.weight_record(format!("{path}.bias"), numel, live)));
        }
        Node { kind: "Linear", children: Vec::new(), params }
    }

    fn weight_record(&mut self, name: String, numel: usize, live: &mut HashSet<String>) -> TensorRecord {
        let identity = match self.weight_ids.get(&name) {
            Some(&id) => id,
            None => {
                let id = self.issue();
                self.weight_ids.insert(name.clone(), id);
                id
            }
        };
        live.insert(name);
        TensorRecord::new(identity, numel as u64, self.element_size)
    }

    fn fresh_record(&mut self, numel: usize) -> TensorRecord {
        let identity = self.issue();
        TensorRecord::new(identity, numel as u64, self.element_size)
    }

    fn issue(&mut self) -> TensorIdentity {
        let id = TensorIdentity::new(self.next_slot, 0);
        self.next_slot += 1;
        id
    }

    fn next_handle(&mut self, kind: HookKind, path: &str) -> HookHandle {
        let id = self.next_hook_id;
        self.next_hook_id += 1;
        HookHandle { kind, path: path.to_string(), id }
    }
}

impl Component for BurnHost {
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

impl HookHost for BurnHost {
    fn register_forward_hook(&mut self, path: &str) -> HookHandle {
        self.forward_hooks.insert(path.to_string());
        self.next_handle(HookKind::Forward, path)
    }

    fn register_backward_hook(&mut self, path: &str) -> HookHandle {
        if !self.backward_hooks.iter().any(|p| p == path) {
            self.backward_hooks.push(path.to_string());
        }
        self.next_handle(HookKind::Backward, path)
    }
}

impl ParameterGradients for BurnHost {
    fn gradient_of(&self, name: &str) -> Option<TensorRecord> {
        self.gradients.get(name).copied()
    }
}

impl DeviceMemory for BurnHost {
    fn max_memory_allocated(&self) -> u64 {
        0
    }

    fn memory_allocated(&self) -> u64 {
        0
    }

    fn max_memory_reserved(&self) -> u64 {
        0
    }

    fn memory_reserved(&self) -> u64 {
        0
    }
}
