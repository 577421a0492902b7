// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph store: nodes, tensors and the topology between them.
//!
//! # Ownership
//!
//! ```text
//! Graph ──owns──▶ initializers  (name → Tensor, constant data)
//!   │   ──owns──▶ value infos   (name → dtype/shape, possibly unknown)
//!   │   ──owns──▶ nodes         (insertion order)
//!   └── inputs / outputs        (ordered tensor names)
//! ```
//!
//! Nodes refer to tensors by name only. Every mutation checks the names it
//! touches before changing anything, so a failed call leaves the graph as
//! it was.

use crate::{ModelError, Node, OpKind};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;
use tensor_core::{DType, Shape, Tensor};

/// Static type information for a tensor value. Either half may be unknown
/// until shape inference runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValueInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
}

impl ValueInfo {
    /// Fully known value info.
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self {
            dtype: Some(dtype),
            shape: Some(shape),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.dtype.is_some() && self.shape.is_some()
    }
}

impl fmt::Display for ValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dtype {
            Some(d) => write!(f, "{d}")?,
            None => f.write_str("?")?,
        }
        match &self.shape {
            Some(s) => write!(f, "{s}"),
            None => f.write_str("[?]"),
        }
    }
}

/// A computation graph over named tensors.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Graph {
    /// Human-readable graph name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    initializers: BTreeMap<String, Tensor>,
    #[serde(default)]
    value_info: BTreeMap<String, ValueInfo>,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Nodes in insertion order (not necessarily execution order).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn node_index(&self, name: &str) -> Result<usize, ModelError> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| ModelError::NodeNotFound {
                node: name.to_string(),
            })
    }

    /// Returns the constant data of an initializer.
    pub fn get_tensor(&self, name: &str) -> Option<&Tensor> {
        self.initializers.get(name)
    }

    pub fn initializers(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.initializers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializers.contains_key(name)
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i == name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Value info of a tensor. Initializers report their own dtype/shape.
    pub fn value_info(&self, name: &str) -> Option<ValueInfo> {
        match self.initializers.get(name) {
            Some(t) => Some(ValueInfo::new(t.dtype(), t.shape().clone())),
            None => self.value_info.get(name).cloned(),
        }
    }

    /// Stored value infos of non-constant tensors.
    pub fn value_infos(&self) -> impl Iterator<Item = (&str, &ValueInfo)> {
        self.value_info.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Node that produces `tensor`, if any.
    pub fn producer(&self, tensor: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.outputs.iter().any(|o| o == tensor))
    }

    /// Nodes that read `tensor`, in insertion order.
    pub fn consumers(&self, tensor: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.inputs.iter().any(|i| i == tensor))
            .collect()
    }

    /// `true` when `name` is an initializer, a graph input or a node output.
    pub fn has_tensor(&self, name: &str) -> bool {
        self.is_initializer(name) || self.is_input(name) || self.producer(name).is_some()
    }

    /// Every tensor name defined in the graph.
    pub fn tensor_names(&self) -> BTreeSet<&str> {
        self.initializers
            .keys()
            .chain(self.inputs.iter())
            .chain(self.nodes.iter().flat_map(|n| n.outputs.iter()))
            .map(String::as_str)
            .collect()
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Declares a graph input with its type.
    pub fn add_input(&mut self, name: impl Into<String>, info: ValueInfo) -> Result<(), ModelError> {
        let name = name.into();
        if self.has_tensor(&name) {
            return Err(ModelError::NameCollision { name });
        }
        self.value_info.insert(name.clone(), info);
        self.inputs.push(name);
        Ok(())
    }

    /// Marks an existing or future tensor as a graph output.
    pub fn add_output(&mut self, name: impl Into<String>) -> Result<(), ModelError> {
        let name = name.into();
        if self.is_output(&name) {
            return Err(ModelError::NameCollision { name });
        }
        self.outputs.push(name);
        Ok(())
    }

    /// Adds a constant tensor under a fresh name.
    pub fn add_initializer(&mut self, name: impl Into<String>, data: Tensor) -> Result<(), ModelError> {
        let name = name.into();
        if self.has_tensor(&name) {
            return Err(ModelError::NameCollision { name });
        }
        self.value_info.remove(&name);
        self.initializers.insert(name, data);
        Ok(())
    }

    /// Replaces the data of an initializer, or creates one under a name no
    /// node produces and no graph input uses.
    pub fn set_tensor(&mut self, name: impl Into<String>, data: Tensor) -> Result<(), ModelError> {
        let name = name.into();
        if self.is_input(&name) || self.producer(&name).is_some() {
            return Err(ModelError::NameCollision { name });
        }
        self.value_info.remove(&name);
        self.initializers.insert(name, data);
        Ok(())
    }

    /// Removes an initializer nobody reads.
    pub fn remove_initializer(&mut self, name: &str) -> Result<Tensor, ModelError> {
        if !self.is_initializer(name) {
            return Err(ModelError::TensorNotFound {
                tensor: name.to_string(),
            });
        }
        self.check_unused(name, None)?;
        self.initializers
            .remove(name)
            .ok_or_else(|| ModelError::TensorNotFound {
                tensor: name.to_string(),
            })
    }

    /// Records inferred (or declared) type information for a value.
    pub fn set_value_info(&mut self, name: impl Into<String>, info: ValueInfo) -> Result<(), ModelError> {
        let name = name.into();
        if self.is_initializer(&name) {
            return Err(ModelError::NameCollision { name });
        }
        self.value_info.insert(name, info);
        Ok(())
    }

    /// Drops value infos for names no longer defined in the graph.
    /// Returns how many were removed.
    pub fn prune_value_info(&mut self) -> usize {
        let live: HashSet<String> = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .chain(self.nodes.iter().flat_map(|n| n.outputs.iter()))
            .cloned()
            .collect();
        let before = self.value_info.len();
        self.value_info.retain(|k, _| live.contains(k));
        before - self.value_info.len()
    }

    /// Appends a node.
    ///
    /// # Errors
    /// - [`ModelError::InvalidNode`] for an empty name or no outputs.
    /// - [`ModelError::DuplicateNode`] if the name is taken.
    /// - [`ModelError::DuplicateOutput`] if another node already produces
    ///   one of its outputs.
    /// - [`ModelError::NameCollision`] if an output is an initializer or
    ///   graph input.
    pub fn add_node(&mut self, node: Node) -> Result<(), ModelError> {
        self.check_node(&node, None)?;
        tracing::trace!(node = %node.name, op = %node.op, "add node");
        self.nodes.push(node);
        Ok(())
    }

    /// Removes a node. Its outputs must not be read by any other node or be
    /// graph outputs.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, ModelError> {
        let idx = self.node_index(name)?;
        for out in &self.nodes[idx].outputs {
            self.check_unused(out, Some(idx))?;
        }
        let node = self.nodes.remove(idx);
        for out in &node.outputs {
            self.value_info.remove(out);
        }
        Ok(node)
    }

    /// Replaces a node in place, keeping its position in insertion order.
    /// Outputs that the replacement no longer produces must be unused.
    pub fn replace_node(&mut self, name: &str, node: Node) -> Result<Node, ModelError> {
        let idx = self.node_index(name)?;
        self.check_node(&node, Some(idx))?;
        for out in &self.nodes[idx].outputs {
            if !node.outputs.contains(out) {
                self.check_unused(out, Some(idx))?;
            }
        }
        let old = std::mem::replace(&mut self.nodes[idx], node);
        for out in &old.outputs {
            if !self.nodes[idx].outputs.contains(out) {
                self.value_info.remove(out);
            }
        }
        Ok(old)
    }

    /// Replaces a node by initializers holding the values of its outputs.
    /// Readers of those outputs now read constants.
    pub fn fold_node(&mut self, name: &str, values: Vec<Tensor>) -> Result<Node, ModelError> {
        let idx = self.node_index(name)?;
        if values.len() != self.nodes[idx].outputs.len() {
            return Err(ModelError::InvalidNode {
                node: name.to_string(),
                detail: format!(
                    "{} values supplied for {} outputs",
                    values.len(),
                    self.nodes[idx].outputs.len()
                ),
            });
        }
        let node = self.nodes.remove(idx);
        for (out, value) in node.outputs.iter().zip(values) {
            self.value_info.remove(out);
            self.initializers.insert(out.clone(), value);
        }
        Ok(node)
    }

    /// Replaces the nodes named in `old` by `new` in one step.
    ///
    /// The new nodes take the insertion position of the first removed node.
    /// The resulting graph is validated before anything is committed, so a
    /// failed splice leaves the graph untouched. Returns the removed nodes.
    pub fn splice_nodes(&mut self, old: &[&str], new: Vec<Node>) -> Result<Vec<Node>, ModelError> {
        let mut indices = old
            .iter()
            .map(|name| self.node_index(name))
            .collect::<Result<Vec<_>, _>>()?;
        indices.sort_unstable();
        indices.dedup();
        let at = indices.first().copied().unwrap_or(self.nodes.len());

        let mut candidate = self.clone();
        let mut removed: Vec<Node> = indices
            .iter()
            .rev()
            .map(|&i| candidate.nodes.remove(i))
            .collect();
        removed.reverse();
        for (offset, node) in new.into_iter().enumerate() {
            candidate.check_node(&node, None)?;
            candidate.nodes.insert(at + offset, node);
        }
        candidate.prune_value_info();
        candidate.validate()?;

        *self = candidate;
        Ok(removed)
    }

    /// Renames a single tensor everywhere it is referenced.
    pub fn rename_tensor(&mut self, old: &str, new: &str) -> Result<(), ModelError> {
        let mut map = BTreeMap::new();
        map.insert(old.to_string(), new.to_string());
        self.rename_tensors(&map)
    }

    /// Renames several tensors at once. All renames are checked before any
    /// is applied; the map is applied simultaneously, so swaps are allowed.
    ///
    /// # Errors
    /// [`ModelError::TensorNotFound`] for an unknown old name and
    /// [`ModelError::NameCollision`] if a new name is already taken (by a
    /// tensor not being renamed away) or used twice.
    pub fn rename_tensors(&mut self, renames: &BTreeMap<String, String>) -> Result<(), ModelError> {
        let existing = self.tensor_names();
        let mut targets = HashSet::new();
        for (old, new) in renames {
            if !existing.contains(old.as_str()) {
                return Err(ModelError::TensorNotFound { tensor: old.clone() });
            }
            let taken = existing.contains(new.as_str()) && !renames.contains_key(new);
            if new.is_empty() || taken || !targets.insert(new.as_str()) {
                return Err(ModelError::NameCollision { name: new.clone() });
            }
        }

        let apply = |name: &mut String| {
            if let Some(new) = renames.get(name.as_str()) {
                *name = new.clone();
            }
        };
        for node in &mut self.nodes {
            node.inputs.iter_mut().for_each(apply);
            node.outputs.iter_mut().for_each(apply);
        }
        self.inputs.iter_mut().for_each(apply);
        self.outputs.iter_mut().for_each(apply);
        self.initializers = std::mem::take(&mut self.initializers)
            .into_iter()
            .map(|(k, v)| (renames.get(&k).cloned().unwrap_or(k), v))
            .collect();
        self.value_info = std::mem::take(&mut self.value_info)
            .into_iter()
            .map(|(k, v)| (renames.get(&k).cloned().unwrap_or(k), v))
            .collect();
        Ok(())
    }

    fn check_node(&self, node: &Node, replacing: Option<usize>) -> Result<(), ModelError> {
        if node.name.is_empty() {
            return Err(ModelError::InvalidNode {
                node: node.name.clone(),
                detail: "node name is empty".into(),
            });
        }
        if node.outputs.is_empty() {
            return Err(ModelError::InvalidNode {
                node: node.name.clone(),
                detail: "node has no outputs".into(),
            });
        }
        let others = || {
            self.nodes
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != replacing)
                .map(|(_, n)| n)
        };
        if others().any(|n| n.name == node.name) {
            return Err(ModelError::DuplicateNode {
                node: node.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for out in &node.outputs {
            if !seen.insert(out) {
                return Err(ModelError::DuplicateOutput {
                    tensor: out.clone(),
                    first: node.name.clone(),
                    second: node.name.clone(),
                });
            }
            if let Some(prev) = others().find(|n| n.outputs.contains(out)) {
                return Err(ModelError::DuplicateOutput {
                    tensor: out.clone(),
                    first: prev.name.clone(),
                    second: node.name.clone(),
                });
            }
            if self.is_initializer(out) || self.is_input(out) {
                return Err(ModelError::NameCollision { name: out.clone() });
            }
        }
        Ok(())
    }

    /// Fails if `tensor` is read by a node other than `except` or is a
    /// graph output.
    fn check_unused(&self, tensor: &str, except: Option<usize>) -> Result<(), ModelError> {
        if let Some(consumer) = self
            .nodes
            .iter()
            .enumerate()
            .find(|(i, n)| Some(*i) != except && n.inputs.iter().any(|x| x == tensor))
        {
            return Err(ModelError::TensorInUse {
                tensor: tensor.to_string(),
                consumer: format!("node '{}'", consumer.1.name),
            });
        }
        if self.is_output(tensor) {
            return Err(ModelError::TensorInUse {
                tensor: tensor.to_string(),
                consumer: "the graph outputs".into(),
            });
        }
        Ok(())
    }

    // ── Topology ───────────────────────────────────────────────────

    /// Node indices in execution order.
    ///
    /// Kahn's algorithm; among ready nodes the one inserted first runs
    /// first, so the order is deterministic.
    pub fn topo_indices(&self) -> Result<Vec<usize>, ModelError> {
        let producers = self.producer_map();
        let n = self.nodes.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        for (i, node) in self.nodes.iter().enumerate() {
            let deps: BTreeSet<usize> = node
                .inputs
                .iter()
                .filter_map(|input| producers.get(input.as_str()).copied())
                .collect();
            indegree[i] = deps.len();
            for d in deps {
                dependents[d].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| indegree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &d in &dependents[i] {
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    ready.push(Reverse(d));
                }
            }
        }

        if order.len() < n {
            let node = self.node_on_cycle(&indegree, &producers);
            return Err(ModelError::Cycle { node });
        }
        Ok(order)
    }

    /// Nodes in execution order. See [`topo_indices`](Self::topo_indices).
    pub fn topo_order(&self) -> Result<Vec<&Node>, ModelError> {
        Ok(self
            .topo_indices()?
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect())
    }

    /// Walks unresolved dependencies from a stuck node until a node repeats;
    /// the repeated node lies on a cycle.
    fn node_on_cycle(&self, indegree: &[usize], producers: &HashMap<&str, usize>) -> String {
        let Some(mut current) = indegree.iter().position(|&d| d > 0) else {
            return String::new();
        };
        let mut visited = HashSet::new();
        while visited.insert(current) {
            let next = self.nodes[current]
                .inputs
                .iter()
                .filter_map(|i| producers.get(i.as_str()).copied())
                .find(|&p| indegree[p] > 0);
            match next {
                Some(p) => current = p,
                None => break,
            }
        }
        self.nodes[current].name.clone()
    }

    fn producer_map(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(i, n)| n.outputs.iter().map(move |o| (o.as_str(), i)))
            .collect()
    }

    /// Indices of nodes with a path to a graph output, in insertion order.
    pub fn live_indices(&self) -> BTreeSet<usize> {
        let producers = self.producer_map();
        let mut live = BTreeSet::new();
        let mut stack: Vec<usize> = self
            .outputs
            .iter()
            .filter_map(|o| producers.get(o.as_str()).copied())
            .collect();
        while let Some(i) = stack.pop() {
            if live.insert(i) {
                stack.extend(
                    self.nodes[i]
                        .inputs
                        .iter()
                        .filter_map(|input| producers.get(input.as_str()).copied()),
                );
            }
        }
        live
    }

    /// Nodes with a path to a graph output, in insertion order.
    pub fn live_nodes(&self) -> Vec<&Node> {
        self.live_indices()
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect()
    }

    // ── Validation ─────────────────────────────────────────────────

    /// Checks every structural invariant: unique non-empty node names,
    /// unique producers, no name shared between initializers, graph inputs
    /// and node outputs, no dangling references and no cycles.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut defined: HashMap<&str, &str> = HashMap::new();
        for name in self.initializers.keys() {
            defined.insert(name, "initializer");
        }
        for name in &self.inputs {
            if defined.insert(name, "graph input").is_some() {
                return Err(ModelError::NameCollision { name: name.clone() });
            }
        }

        let mut node_names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(ModelError::InvalidNode {
                    node: String::new(),
                    detail: "node name is empty".into(),
                });
            }
            if !node_names.insert(node.name.as_str()) {
                return Err(ModelError::DuplicateNode {
                    node: node.name.clone(),
                });
            }
            for out in &node.outputs {
                match defined.insert(out, &node.name) {
                    None => {}
                    Some("initializer") | Some("graph input") => {
                        return Err(ModelError::NameCollision { name: out.clone() })
                    }
                    Some(first) => {
                        return Err(ModelError::DuplicateOutput {
                            tensor: out.clone(),
                            first: first.to_string(),
                            second: node.name.clone(),
                        })
                    }
                }
            }
        }

        for node in &self.nodes {
            if let Some(missing) = node.inputs.iter().find(|i| !defined.contains_key(i.as_str())) {
                return Err(ModelError::DanglingReference {
                    node: node.name.clone(),
                    tensor: missing.clone(),
                });
            }
        }
        if let Some(missing) = self.outputs.iter().find(|o| !defined.contains_key(o.as_str())) {
            return Err(ModelError::DanglingOutput {
                tensor: missing.clone(),
            });
        }

        self.topo_indices()?;
        Ok(())
    }

    /// Counts nodes per operator kind.
    pub fn op_histogram(&self) -> BTreeMap<&OpKind, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(&node.op).or_insert(0) += 1;
        }
        counts
    }

    /// Returns a one-line summary of the graph.
    pub fn summary(&self) -> String {
        let ops: Vec<String> = self
            .op_histogram()
            .into_iter()
            .map(|(op, n)| format!("{n} {op}"))
            .collect();
        format!(
            "Graph '{}': {} nodes [{}], {} initializers, {} inputs, {} outputs",
            self.name,
            self.nodes.len(),
            ops.join(", "),
            self.initializers.len(),
            self.inputs.len(),
            self.outputs.len(),
        )
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for name in &self.inputs {
            let info = self.value_info(name).unwrap_or_default();
            writeln!(f, "  input  {name}: {info}")?;
        }
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        for name in &self.outputs {
            let info = self.value_info(name).unwrap_or_default();
            writeln!(f, "  output {name}: {info}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_info(dims: Vec<usize>) -> ValueInfo {
        ValueInfo::new(DType::F32, Shape::new(dims))
    }

    /// x ──Relu──▶ a ──Add(a, c)──▶ y
    fn chain() -> Graph {
        let mut g = Graph::new("chain");
        g.add_input("x", f32_info(vec![4])).unwrap();
        g.add_initializer("c", Tensor::from_f32(Shape::vector(4), &[1.0; 4]).unwrap())
            .unwrap();
        g.add_node(Node::new("relu", OpKind::Relu).with_inputs(["x"]).with_outputs(["a"]))
            .unwrap();
        g.add_node(Node::new("add", OpKind::Add).with_inputs(["a", "c"]).with_outputs(["y"]))
            .unwrap();
        g.add_output("y").unwrap();
        g
    }

    fn names<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<&'a str> {
        nodes.into_iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_validate_ok() {
        chain().validate().unwrap();
    }

    #[test]
    fn test_topo_order_ignores_insertion_order() {
        let mut g = Graph::new("rev");
        g.add_input("x", f32_info(vec![1])).unwrap();
        g.add_node(Node::new("second", OpKind::Relu).with_inputs(["a"]).with_outputs(["b"]))
            .unwrap();
        g.add_node(Node::new("first", OpKind::Identity).with_inputs(["x"]).with_outputs(["a"]))
            .unwrap();
        g.add_output("b").unwrap();
        assert_eq!(names(g.topo_order().unwrap()), ["first", "second"]);
    }

    #[test]
    fn test_topo_tie_break_by_insertion() {
        let mut g = Graph::new("ties");
        g.add_input("x", f32_info(vec![1])).unwrap();
        for name in ["c", "a", "b"] {
            g.add_node(
                Node::new(name, OpKind::Identity)
                    .with_inputs(["x"])
                    .with_outputs([format!("{name}_y")]),
            )
            .unwrap();
        }
        assert_eq!(names(g.topo_order().unwrap()), ["c", "a", "b"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut g = Graph::new("cycle");
        g.add_input("x", f32_info(vec![1])).unwrap();
        g.add_node(Node::new("entry", OpKind::Add).with_inputs(["x", "q"]).with_outputs(["p"]))
            .unwrap();
        g.add_node(Node::new("loop", OpKind::Relu).with_inputs(["p"]).with_outputs(["q"]))
            .unwrap();
        let err = g.topo_order().unwrap_err();
        match err {
            ModelError::Cycle { node } => assert!(node == "entry" || node == "loop"),
            other => panic!("expected cycle, got {other}"),
        }
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut g = chain();
        let err = g
            .add_node(Node::new("dup", OpKind::Relu).with_inputs(["x"]).with_outputs(["a"]))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateOutput { ref first, .. } if first == "relu"));
        assert_eq!(g.nodes().len(), 2);
    }

    #[test]
    fn test_duplicate_node_name_rejected() {
        let mut g = chain();
        let err = g
            .add_node(Node::new("relu", OpKind::Relu).with_inputs(["x"]).with_outputs(["z"]))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateNode { .. }));
    }

    #[test]
    fn test_output_colliding_with_initializer() {
        let mut g = chain();
        let err = g
            .add_node(Node::new("bad", OpKind::Relu).with_inputs(["x"]).with_outputs(["c"]))
            .unwrap_err();
        assert!(matches!(err, ModelError::NameCollision { .. }));
    }

    #[test]
    fn test_dangling_reference() {
        let mut g = chain();
        g.add_node(Node::new("lost", OpKind::Relu).with_inputs(["nowhere"]).with_outputs(["z"]))
            .unwrap();
        let err = g.validate().unwrap_err();
        assert!(matches!(err, ModelError::DanglingReference { ref tensor, .. } if tensor == "nowhere"));
    }

    #[test]
    fn test_dangling_graph_output() {
        let mut g = chain();
        g.add_output("ghost").unwrap();
        assert!(matches!(g.validate(), Err(ModelError::DanglingOutput { .. })));
    }

    #[test]
    fn test_rename_tensor_updates_all_references() {
        let mut g = chain();
        g.rename_tensor("a", "relu_out").unwrap();
        assert_eq!(g.get_node("relu").unwrap().outputs, ["relu_out"]);
        assert_eq!(g.get_node("add").unwrap().inputs, ["relu_out", "c"]);
        g.rename_tensor("c", "bias").unwrap();
        assert!(g.get_tensor("bias").is_some());
        g.rename_tensor("y", "out").unwrap();
        assert_eq!(g.outputs(), ["out"]);
        g.validate().unwrap();
    }

    #[test]
    fn test_rename_collision_is_atomic() {
        let mut g = chain();
        let before = g.clone();
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "fresh".to_string());
        map.insert("y".to_string(), "c".to_string());
        assert!(matches!(g.rename_tensors(&map), Err(ModelError::NameCollision { .. })));
        assert_eq!(g, before);
        assert!(matches!(
            g.rename_tensor("missing", "m"),
            Err(ModelError::TensorNotFound { .. })
        ));
    }

    #[test]
    fn test_rename_swap() {
        let mut g = chain();
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "y".to_string());
        map.insert("y".to_string(), "a".to_string());
        g.rename_tensors(&map).unwrap();
        assert_eq!(g.get_node("relu").unwrap().outputs, ["y"]);
        assert_eq!(g.outputs(), ["a"]);
    }

    #[test]
    fn test_remove_node_in_use_fails() {
        let mut g = chain();
        assert!(matches!(g.remove_node("relu"), Err(ModelError::TensorInUse { .. })));
        assert!(matches!(g.remove_node("add"), Err(ModelError::TensorInUse { .. })));
        assert!(matches!(g.remove_node("nope"), Err(ModelError::NodeNotFound { .. })));
    }

    #[test]
    fn test_remove_unused_node() {
        let mut g = chain();
        g.add_node(Node::new("spare", OpKind::Relu).with_inputs(["x"]).with_outputs(["s"]))
            .unwrap();
        let removed = g.remove_node("spare").unwrap();
        assert_eq!(removed.op, OpKind::Relu);
        assert_eq!(g, chain());
    }

    #[test]
    fn test_replace_node_keeps_position() {
        let mut g = chain();
        let old = g
            .replace_node(
                "relu",
                Node::new("relu", OpKind::Identity).with_inputs(["x"]).with_outputs(["a"]),
            )
            .unwrap();
        assert_eq!(old.op, OpKind::Relu);
        assert_eq!(g.nodes()[0].op, OpKind::Identity);
        let err = g.replace_node(
            "relu",
            Node::new("relu", OpKind::Identity).with_inputs(["x"]).with_outputs(["b"]),
        );
        assert!(matches!(err, Err(ModelError::TensorInUse { .. })));
    }

    #[test]
    fn test_fold_node_turns_outputs_into_constants() {
        let mut g = chain();
        let a = Tensor::from_f32(Shape::vector(4), &[2.0; 4]).unwrap();
        let node = g.fold_node("relu", vec![a.clone()]).unwrap();
        assert_eq!(node.name, "relu");
        assert_eq!(g.get_tensor("a"), Some(&a));
        assert!(g.get_node("relu").is_none());
        g.validate().unwrap();
        assert!(g.fold_node("add", vec![]).is_err());
    }

    #[test]
    fn test_splice_nodes_replaces_chain() {
        let mut g = chain();
        let fused = Node::new("fused", OpKind::Add).with_inputs(["x", "c"]).with_outputs(["y"]);
        let removed = g.splice_nodes(&["relu", "add"], vec![fused]).unwrap();
        assert_eq!(names(&removed), ["relu", "add"]);
        assert_eq!(names(g.nodes()), ["fused"]);
        assert!(!g.has_tensor("a"));
    }

    #[test]
    fn test_failed_splice_leaves_graph_untouched() {
        let mut g = chain();
        let before = g.clone();
        // Removing only the producer of `a` leaves `add` dangling.
        let bad = Node::new("other", OpKind::Relu).with_inputs(["x"]).with_outputs(["z"]);
        assert!(g.splice_nodes(&["relu"], vec![bad]).is_err());
        assert_eq!(g, before);
    }

    #[test]
    fn test_set_tensor() {
        let mut g = chain();
        let data = Tensor::from_f32(Shape::vector(4), &[2.0; 4]).unwrap();
        g.set_tensor("c", data.clone()).unwrap();
        assert_eq!(g.get_tensor("c"), Some(&data));
        assert!(g.set_tensor("a", data.clone()).is_err());
        assert!(g.set_tensor("x", data).is_err());
    }

    #[test]
    fn test_remove_initializer_in_use() {
        let mut g = chain();
        assert!(g.remove_initializer("c").is_err());
        g.add_initializer("unused", Tensor::scalar_f32(1.0)).unwrap();
        assert!(g.remove_initializer("unused").is_ok());
    }

    #[test]
    fn test_producer_and_consumers() {
        let g = chain();
        assert_eq!(g.producer("a").unwrap().name, "relu");
        assert!(g.producer("x").is_none());
        assert_eq!(names(g.consumers("a")), ["add"]);
    }

    #[test]
    fn test_live_nodes() {
        let mut g = chain();
        g.add_node(Node::new("dead1", OpKind::Relu).with_inputs(["x"]).with_outputs(["d1"]))
            .unwrap();
        g.add_node(Node::new("dead2", OpKind::Relu).with_inputs(["d1"]).with_outputs(["d2"]))
            .unwrap();
        assert_eq!(names(g.live_nodes()), ["relu", "add"]);
    }

    #[test]
    fn test_value_info_for_initializer() {
        let g = chain();
        let info = g.value_info("c").unwrap();
        assert_eq!(info, ValueInfo::new(DType::F32, Shape::vector(4)));
        assert_eq!(g.value_info("a"), None);
    }

    #[test]
    fn test_summary_and_display() {
        let g = chain();
        let s = g.summary();
        assert!(s.contains("2 nodes"));
        assert!(s.contains("1 Relu"));
        let display = format!("{g}");
        assert!(display.contains("relu: Relu(x) -> (a)"));
        assert!(display.contains("input  x: float32[4]"));
    }
}
