// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON interchange for [`Graph`].
//!
//! The on-disk form mirrors the in-memory store one to one:
//!
//! ```json
//! {
//!   "name": "bipolar",
//!   "nodes": [
//!     { "name": "bq", "op": "BipolarQuant", "inputs": ["x", "s"], "outputs": ["y"] }
//!   ],
//!   "initializers": { "s": { "shape": [], "dtype": "f32", "data": [0.5] } },
//!   "value_info": { "x": { "dtype": "f32", "shape": [3] } },
//!   "inputs": ["x"],
//!   "outputs": ["y"]
//! }
//! ```
//!
//! Every load is followed by [`Graph::validate`], so a graph obtained here
//! satisfies the structural invariants.

use crate::{Graph, ModelError};
use std::path::Path;

impl Graph {
    /// Parses and validates a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let graph: Graph = serde_json::from_str(json)?;
        graph.validate()?;
        tracing::debug!("{}", graph.summary());
        Ok(graph)
    }

    /// Loads and validates a graph from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serializes the graph to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the graph to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ModelError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
