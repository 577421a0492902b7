// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape inference as a pipeline stage.

use crate::{GraphPass, PassError};
use model_ir::Graph;

/// Fills in the dtype and shape of every tensor that reaches an output.
#[derive(Debug, Clone, Default)]
pub struct InferShapes;

impl InferShapes {
    pub fn new() -> Self {
        Self
    }
}

impl GraphPass for InferShapes {
    fn name(&self) -> &str {
        "infer-shapes"
    }

    fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        let (out, report) = runtime::infer_shapes_with_report(graph)?;
        if !report.unreachable.is_empty() {
            tracing::warn!(
                unreachable = ?report.unreachable,
                "nodes left uninferred; run eliminate-dead-nodes first"
            );
        }
        Ok(out)
    }
}
