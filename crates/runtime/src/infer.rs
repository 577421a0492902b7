// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static shape and dtype inference.
//!
//! Types flow from graph inputs and initializers through the nodes in
//! topological order. Only nodes with a path to a graph output are
//! inferred; the rest are reported as unreachable so dead-node elimination
//! can remove them, without failing on them.

use crate::registry::{registry, InferInput, TensorType};
use crate::InferenceError;
use model_ir::{Graph, ValueInfo};
use std::collections::HashMap;

/// What a shape-inference run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Number of nodes whose outputs were inferred.
    pub inferred_nodes: usize,
    /// Names of nodes with no path to a graph output, left uninferred.
    pub unreachable: Vec<String>,
}

/// Returns a copy of `graph` with the value info of every reachable tensor
/// filled in.
pub fn infer_shapes(graph: &Graph) -> Result<Graph, InferenceError> {
    infer_shapes_with_report(graph).map(|(g, _)| g)
}

/// Like [`infer_shapes`], also returning an [`InferenceReport`].
#[tracing::instrument(skip_all, fields(graph = %graph.name))]
pub fn infer_shapes_with_report(graph: &Graph) -> Result<(Graph, InferenceReport), InferenceError> {
    graph.validate()?;
    let order = graph.topo_indices()?;
    let live = graph.live_indices();

    let mut types: HashMap<&str, TensorType> = HashMap::new();
    for (name, tensor) in graph.initializers() {
        types.insert(name, TensorType::of(tensor));
    }
    for name in graph.inputs() {
        let info = graph.value_info(name).unwrap_or_default();
        match (info.dtype, info.shape) {
            (Some(dtype), Some(shape)) => {
                types.insert(name, TensorType::new(dtype, shape));
            }
            _ => {
                return Err(InferenceError::UnknownInput {
                    input: name.clone(),
                })
            }
        }
    }

    let mut out = graph.clone();
    let mut report = InferenceReport::default();
    let registry = registry();

    for idx in order {
        let node = &graph.nodes()[idx];
        if !live.contains(&idx) {
            tracing::warn!(node = %node.name, op = %node.op, "node does not reach a graph output; not inferred");
            report.unreachable.push(node.name.clone());
            continue;
        }
        let handler = registry
            .get(&node.op)
            .ok_or_else(|| InferenceError::UnsupportedOp {
                node: node.name.clone(),
                op: node.op.to_string(),
            })?;

        let mut inputs = Vec::with_capacity(node.inputs.len());
        for name in &node.inputs {
            let ty = types.get(name.as_str()).cloned().ok_or_else(|| {
                model_ir::ModelError::DanglingReference {
                    node: node.name.clone(),
                    tensor: name.clone(),
                }
            })?;
            inputs.push(InferInput {
                name,
                ty,
                constant: graph.get_tensor(name),
            });
        }

        let outputs = handler.infer(node, &inputs)?;
        if outputs.len() != node.outputs.len() {
            return Err(InferenceError::ShapeMismatch {
                node: node.name.clone(),
                op: node.op.to_string(),
                detail: format!(
                    "operator produces {} outputs, node declares {}",
                    outputs.len(),
                    node.outputs.len()
                ),
            });
        }

        for (name, ty) in node.outputs.iter().zip(outputs) {
            tracing::debug!(node = %node.name, tensor = %name, "{}{}", ty.dtype, ty.shape);
            if graph.is_output(name) {
                check_declared(name, graph.value_info(name), &ty)?;
            }
            out.set_value_info(name.clone(), ty.clone().into())?;
            types.insert(name, ty);
        }
        report.inferred_nodes += 1;
    }

    tracing::debug!(
        inferred = report.inferred_nodes,
        unreachable = report.unreachable.len(),
        "shape inference complete"
    );
    Ok((out, report))
}

/// A declared graph output must agree with inference on whatever it states.
fn check_declared(name: &str, declared: Option<ValueInfo>, inferred: &TensorType) -> Result<(), InferenceError> {
    let Some(declared) = declared else {
        return Ok(());
    };
    let dtype_ok = declared.dtype.map_or(true, |d| d == inferred.dtype);
    let shape_ok = declared.shape.as_ref().map_or(true, |s| *s == inferred.shape);
    if dtype_ok && shape_ok {
        return Ok(());
    }
    Err(InferenceError::OutputMismatch {
        output: name.to_string(),
        declared,
        inferred: inferred.clone().into(),
    })
}
