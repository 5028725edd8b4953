// ============================================================
// Layer 5 — Simulated Modules
// ============================================================
// The nested component tree the simulated runtime executes.
//
//   Sequential   — runs its children in order
//   Repeat       — runs its single child N times (shared weights,
//                  the same component fires N forward hooks)
//   Linear       — [rows, in] → [rows, out], owns weight (+ bias)
//   Relu         — out-of-place, allocates a new output
//   InplaceRelu  — returns its input (same storage)
//   Flatten      — view of its input with a new shape
//
// Parameters own a value tensor and an optional gradient. The
// gradient stays None until the first backward reaches the
// module, and keeps its storage across steps until zero_grad().

use indexmap::IndexMap;

use crate::domain::tensor::TensorRecord;
use crate::domain::traits::{Component, ParameterGradients};
use crate::runtime::storage::{SimTensor, StorageArena};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Sequential,
    Repeat { times: usize },
    Linear { in_features: usize, out_features: usize },
    Relu,
    InplaceRelu,
    Flatten,
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Sequential  => "Sequential",
            Layer::Repeat { .. } => "Repeat",
            Layer::Linear { .. } => "Linear",
            Layer::Relu        => "ReLU",
            Layer::InplaceRelu => "ReLU(inplace)",
            Layer::Flatten     => "Flatten",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimParam {
    pub value: SimTensor,
    pub grad:  Option<SimTensor>,
}

#[derive(Debug)]
pub struct SimModule {
    layer:    Layer,
    children: Vec<(String, SimModule)>,
    params:   IndexMap<String, SimParam>,
}

impl SimModule {
    fn new(layer: Layer) -> Self {
        Self { layer, children: Vec::new(), params: IndexMap::new() }
    }

    pub fn linear(arena: &StorageArena, in_features: usize, out_features: usize, bias: bool, element_size: u64) -> Self {
        let mut module = Self::new(Layer::Linear { in_features, out_features });
        let weight = arena.tensor(&[out_features, in_features], element_size);
        module.params.insert("weight".into(), SimParam { value: weight, grad: None });
        if bias {
            let b = arena.tensor(&[out_features], element_size);
            module.params.insert("bias".into(), SimParam { value: b, grad: None });
        }
        module
    }

    pub fn relu() -> Self {
        Self::new(Layer::Relu)
    }

    pub fn inplace_relu() -> Self {
        Self::new(Layer::InplaceRelu)
    }

    pub fn flatten() -> Self {
        Self::new(Layer::Flatten)
    }

    pub fn sequential(children: Vec<(&str, SimModule)>) -> Self {
        let mut module = Self::new(Layer::Sequential);
        module.children = children.into_iter().map(|(n, m)| (n.to_string(), m)).collect();
        module
    }

    /// Runs `child` `times` times per forward pass.
    pub fn repeat(times: usize, name: &str, child: SimModule) -> Self {
        let mut module = Self::new(Layer::Repeat { times });
        module.children.push((name.to_string(), child));
        module
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn child_modules(&self) -> &[(String, SimModule)] {
        &self.children
    }

    pub fn param(&self, name: &str) -> Option<&SimParam> {
        self.params.get(name)
    }

    pub fn params_mut(&mut self) -> impl Iterator<Item = (&str, &mut SimParam)> {
        self.params.iter_mut().map(|(n, p)| (n.as_str(), p))
    }

    /// Adds a parameter after construction (e.g. a late-initialised scale).
    pub fn insert_param(&mut self, name: &str, value: SimTensor) {
        self.params.insert(name.to_string(), SimParam { value, grad: None });
    }

    pub fn remove_param(&mut self, name: &str) -> Option<SimParam> {
        self.params.shift_remove(name)
    }

    /// Module at dotted `path` below this one ("" is self).
    pub fn find(&self, path: &str) -> Option<&SimModule> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |module, segment| {
            module.children.iter().find(|(n, _)| n == segment).map(|(_, m)| m)
        })
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut SimModule> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |module, segment| {
            module.children.iter_mut().find(|(n, _)| n == segment).map(|(_, m)| m)
        })
    }

    /// Drops every gradient in this subtree (set-to-none semantics).
    pub fn zero_grad(&mut self) {
        for param in self.params.values_mut() {
            param.grad = None;
        }
        for (_, child) in &mut self.children {
            child.zero_grad();
        }
    }
}

impl Component for SimModule {
    fn kind(&self) -> &str {
        self.layer.name()
    }

    fn children(&self) -> Vec<(&str, &dyn Component)> {
        self.children
            .iter()
            .map(|(name, module)| (name.as_str(), module as &dyn Component))
            .collect()
    }

    fn parameters(&self) -> Vec<(&str, TensorRecord)> {
        self.params
            .iter()
            .map(|(name, p)| (name.as_str(), p.value.record()))
            .collect()
    }
}

impl ParameterGradients for SimModule {
    fn gradient_of(&self, name: &str) -> Option<TensorRecord> {
        let (module_path, param) = match name.rsplit_once('.') {
            Some((path, param)) => (path, param),
            None => ("", name),
        };
        self.find(module_path)?
            .param(param)?
            .grad
            .as_ref()
            .map(SimTensor::record)
    }
}
