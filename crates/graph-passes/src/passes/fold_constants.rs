// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Constant folding.
//!
//! A node whose inputs are all initializers is evaluated once with the
//! interpreter's own handler and replaced by initializers holding its
//! outputs. Nodes are visited in topological order, so folding cascades
//! through chains of constant nodes in a single run. This is what turns
//! weight quantizers (`Quant` over a weight initializer) into plain
//! quantized weights.

use crate::{GraphPass, PassError};
use model_ir::Graph;
use runtime::registry;

/// Evaluates constant subgraphs ahead of time.
#[derive(Debug, Clone, Default)]
pub struct FoldConstants;

impl FoldConstants {
    pub fn new() -> Self {
        Self
    }
}

impl GraphPass for FoldConstants {
    fn name(&self) -> &str {
        "fold-constants"
    }

    fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        let order: Vec<String> = graph
            .topo_order()?
            .into_iter()
            .map(|n| n.name.clone())
            .collect();
        let mut out = graph.clone();
        let mut folded = 0usize;

        for name in order {
            let Some(node) = out.get_node(&name) else {
                continue;
            };
            let foldable = !node.inputs.is_empty()
                && node.inputs.iter().all(|i| out.is_initializer(i))
                && !node.outputs.iter().any(|o| out.is_output(o));
            if !foldable {
                continue;
            }
            // Unregistered operators stay as they are.
            let Some(handler) = registry().get(&node.op) else {
                continue;
            };

            let inputs: Vec<_> = node.inputs.iter().filter_map(|i| out.get_tensor(i)).collect();
            let values = handler.eval(node, &inputs)?;
            tracing::debug!(node = %name, op = %node.op, "folded into constants");
            out.fold_node(&name, values)?;
            folded += 1;
        }

        if folded > 0 {
            tracing::info!(folded, "constant folding complete");
        }
        Ok(out)
    }
}
