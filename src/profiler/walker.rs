// ============================================================
// Layer 4 — Component Tree Walker
// ============================================================
// Flattens the nested model into "path → component" so hooks
// can be bound to every component exactly once.
//
//   model                (root, not visited itself)
//   ├── encoder          → "encoder"
//   │   ├── 0            → "encoder.0"
//   │   └── 1            → "encoder.1"
//   └── head             → "head"
//
// Order is pre-order: a parent is visited before its children.
// The walk uses an explicit stack, so depth is bounded by heap
// and not by the call stack.
//
// Components are not told apart by address: a child stored
// inline at offset 0 of its parent has the parent's address.
// The tree is acyclic by construction (children are borrowed
// from their owner), so every path is visited. Tied parameters
// are deduplicated by storage identity instead.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::domain::tensor::{TensorIdentity, TensorRecord};
use crate::domain::traits::Component;

/// Joins a parent path and a child name with '.'.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Visits every descendant of `root` once, in pre-order. `root` itself is not visited.
pub fn for_each_component<'a>(root: &'a dyn Component, mut visit: impl FnMut(&str, &'a dyn Component)) {
    // Children are pushed in reverse so the first child is popped first
    let mut stack: Vec<(String, &'a dyn Component)> = root
        .children()
        .into_iter()
        .rev()
        .map(|(name, child)| (name.to_string(), child))
        .collect();

    while let Some((path, component)) = stack.pop() {
        visit(&path, component);
        for (name, child) in component.children().into_iter().rev() {
            stack.push((join_path(&path, name), child));
        }
    }
}

/// Ordered "path → component" mapping of every descendant of `root`.
pub fn flatten(root: &dyn Component) -> IndexMap<String, &dyn Component> {
    let mut components = IndexMap::new();
    for_each_component(root, |path, component| {
        components.insert(path.to_string(), component);
    });
    components
}

/// Every parameter of `root` and its descendants, by dotted path.
///
/// A storage shared by several parameters (tied weights) is listed
/// once, under the first name reached.
pub fn named_parameters(root: &dyn Component) -> Vec<(String, TensorRecord)> {
    let mut seen: HashSet<TensorIdentity> = HashSet::new();
    let mut params = Vec::new();

    let mut collect = |prefix: &str, component: &dyn Component| {
        for (name, tensor) in component.parameters() {
            if seen.insert(tensor.identity) {
                params.push((join_path(prefix, name), tensor));
            }
        }
    };

    collect("", root);
    for_each_component(root, |path, component| collect(path, component));
    params
}
