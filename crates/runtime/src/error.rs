// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for shape inference and execution.

use model_ir::{ModelError, ValueInfo};
use tensor_core::TensorError;

/// Errors raised while propagating dtypes and shapes through a graph.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// An operator's shape precondition does not hold.
    #[error("shape mismatch at node '{node}' ({op}): {detail}")]
    ShapeMismatch {
        node: String,
        op: String,
        detail: String,
    },

    /// An operator received an element type it cannot handle.
    #[error("type mismatch at node '{node}' ({op}): {detail}")]
    TypeMismatch {
        node: String,
        op: String,
        detail: String,
    },

    /// A constant operand (bit-width, thresholds, target shape) is invalid.
    #[error("invalid constant at node '{node}' ({op}): {detail}")]
    InvalidConstant {
        node: String,
        op: String,
        detail: String,
    },

    /// An operand that must be an initializer is computed at run time.
    #[error("node '{node}' ({op}) needs input '{input}' to be constant")]
    NonConstantInput {
        node: String,
        op: String,
        input: String,
    },

    /// The operator kind has no registered handler.
    #[error("unsupported operator '{op}' at node '{node}'")]
    UnsupportedOp { node: String, op: String },

    /// A graph input is missing its declared dtype or shape.
    #[error("graph input '{input}' has no declared dtype and shape")]
    UnknownInput { input: String },

    /// A declared graph output type disagrees with the inferred one.
    #[error("graph output '{output}' is declared as {declared} but inferred as {inferred}")]
    OutputMismatch {
        output: String,
        declared: ValueInfo,
        inferred: ValueInfo,
    },

    /// The graph is structurally broken.
    #[error("structural error: {0}")]
    Model(#[from] ModelError),
}

/// Errors raised while executing a graph.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A graph input has no binding.
    #[error("graph input '{input}' is not bound")]
    MissingInput { input: String },

    /// A binding names something that is not a graph input.
    #[error("'{input}' is not a graph input")]
    UnknownInput { input: String },

    /// A binding does not match the declared input type.
    #[error("binding for '{input}' does not match its declaration: {detail}")]
    InputMismatch { input: String, detail: String },

    /// The operator kind has no registered handler.
    #[error("unsupported operator '{op}' at node '{node}'")]
    UnsupportedOp { node: String, op: String },

    /// An integer result left its representable range.
    #[error("numeric overflow at node '{node}' ({op}): {source}")]
    NumericOverflow {
        node: String,
        op: String,
        #[source]
        source: TensorError,
    },

    /// A kernel rejected its operands.
    #[error("execution error at node '{node}' ({op}): {source}")]
    Kernel {
        node: String,
        op: String,
        #[source]
        source: TensorError,
    },

    /// A node received operands or attributes it cannot use.
    #[error("invalid operands at node '{node}' ({op}): {detail}")]
    InvalidOperands {
        node: String,
        op: String,
        detail: String,
    },

    /// A tensor a node reads was never produced.
    #[error("node '{node}' reads '{tensor}', which holds no value")]
    MissingValue { node: String, tensor: String },

    /// The graph is structurally broken.
    #[error("structural error: {0}")]
    Model(#[from] ModelError),
}

impl ExecutionError {
    /// Wraps a kernel error with node context; overflow keeps its own kind.
    pub fn from_kernel(node: &model_ir::Node, source: TensorError) -> Self {
        let (node, op) = (node.name.clone(), node.op.to_string());
        if source.is_overflow() {
            ExecutionError::NumericOverflow { node, op, source }
        } else {
            ExecutionError::Kernel { node, op, source }
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, ExecutionError::NumericOverflow { .. })
    }
}

/// Top-level runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
