// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dead-node elimination.
//!
//! Removes every node with no path to a graph output, then every
//! initializer no node reads, then value infos for names that no longer
//! exist. Repeats until nothing changes. Graph inputs are part of the
//! interface and are never removed.

use crate::{GraphPass, PassError};
use model_ir::Graph;

#[derive(Debug, Clone, Default)]
pub struct EliminateDeadNodes;

impl EliminateDeadNodes {
    pub fn new() -> Self {
        Self
    }
}

impl GraphPass for EliminateDeadNodes {
    fn name(&self) -> &str {
        "eliminate-dead-nodes"
    }

    fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        let mut out = graph.clone();
        let (mut nodes, mut initializers) = (0usize, 0usize);

        loop {
            let live = out.live_indices();
            // Reverse topological order: a dead node's readers are dead
            // too and go first.
            let dead: Vec<String> = out
                .topo_indices()?
                .into_iter()
                .rev()
                .filter(|i| !live.contains(i))
                .map(|i| out.nodes()[i].name.clone())
                .collect();
            for name in &dead {
                tracing::debug!(node = %name, "removing dead node");
                out.remove_node(name)?;
            }

            let unused: Vec<String> = out
                .initializers()
                .map(|(name, _)| name)
                .filter(|name| !out.is_output(name) && out.consumers(name).is_empty())
                .map(str::to_string)
                .collect();
            for name in &unused {
                out.remove_initializer(name)?;
            }

            if dead.is_empty() && unused.is_empty() {
                break;
            }
            nodes += dead.len();
            initializers += unused.len();
        }

        let infos = out.prune_value_info();
        if nodes + initializers + infos > 0 {
            tracing::info!(nodes, initializers, value_infos = infos, "dead code removed");
        }
        Ok(out)
    }
}
