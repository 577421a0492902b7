// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Structural errors raised by the graph store.

/// Errors that can occur when building, mutating or loading a graph.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The data dependencies between nodes form a cycle.
    #[error("graph contains a cycle through node '{node}'")]
    Cycle { node: String },

    /// A node input resolves to no initializer, graph input or node output.
    #[error("node '{node}' reads undefined tensor '{tensor}'")]
    DanglingReference { node: String, tensor: String },

    /// A graph output is not produced by anything.
    #[error("graph output '{tensor}' is not defined")]
    DanglingOutput { tensor: String },

    /// Two nodes produce the same tensor.
    #[error("tensor '{tensor}' is produced by both '{first}' and '{second}'")]
    DuplicateOutput {
        tensor: String,
        first: String,
        second: String,
    },

    /// Two nodes share a name.
    #[error("duplicate node name '{node}'")]
    DuplicateNode { node: String },

    /// A tensor name is already taken by another initializer, input or output.
    #[error("tensor name '{name}' is already in use")]
    NameCollision { name: String },

    #[error("node not found: {node}")]
    NodeNotFound { node: String },

    #[error("tensor not found: {tensor}")]
    TensorNotFound { tensor: String },

    /// A tensor cannot be removed while something still reads it.
    #[error("tensor '{tensor}' is still used by {consumer}")]
    TensorInUse { tensor: String, consumer: String },

    /// A node is malformed (wrong arity, empty name, ...).
    #[error("invalid node '{node}': {detail}")]
    InvalidNode { node: String, detail: String },

    /// An attribute is missing its expected type or value.
    #[error("invalid attribute '{attribute}' on node '{node}': {detail}")]
    InvalidAttribute {
        node: String,
        attribute: String,
        detail: String,
    },

    /// The graph file could not be read or written.
    #[error("graph I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The graph JSON is malformed.
    #[error("failed to parse graph: {0}")]
    Parse(#[from] serde_json::Error),
}
