// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Deterministic names for intermediate tensors.
//!
//! Output `i` of node `n` becomes `n_out{i}`. Graph inputs, graph outputs
//! and initializers keep their names. A tensor whose canonical name is
//! already held by a tensor that keeps its name is left alone (and logged).

use crate::{GraphPass, PassError};
use model_ir::Graph;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct CanonicalizeNames;

impl CanonicalizeNames {
    pub fn new() -> Self {
        Self
    }

    /// Canonical name of output `index` of `node`.
    pub fn canonical_name(node: &str, index: usize) -> String {
        format!("{node}_out{index}")
    }
}

impl GraphPass for CanonicalizeNames {
    fn name(&self) -> &str {
        "canonicalize-names"
    }

    fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        for node in graph.topo_order()? {
            for (i, out) in node.outputs.iter().enumerate() {
                let target = Self::canonical_name(&node.name, i);
                if graph.is_output(out) || *out == target {
                    continue;
                }
                renames.insert(out.clone(), target);
            }
        }

        // Drop renames whose target is held by a tensor that keeps its
        // name; dropping one can block another, so repeat until stable.
        let existing = graph.tensor_names();
        loop {
            let blocked: Vec<String> = renames
                .iter()
                .filter(|(_, target)| existing.contains(target.as_str()) && !renames.contains_key(*target))
                .map(|(old, _)| old.clone())
                .collect();
            if blocked.is_empty() {
                break;
            }
            for old in blocked {
                if let Some(target) = renames.remove(&old) {
                    tracing::warn!(tensor = %old, target = %target, "canonical name already taken; keeping original");
                }
            }
        }
        debug_assert_eq!(
            renames.values().collect::<BTreeSet<_>>().len(),
            renames.len(),
            "canonical names are unique per node output"
        );

        let mut out = graph.clone();
        if !renames.is_empty() {
            tracing::debug!(renamed = renames.len(), "canonicalizing tensor names");
            out.rename_tensors(&renames)?;
        }
        Ok(out)
    }
}
