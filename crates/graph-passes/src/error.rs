// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph passes and the lowering driver.

use model_ir::ModelError;
use runtime::{ExecutionError, InferenceError};
use tensor_core::Shape;

/// Errors raised by the Quant→MultiThreshold rewrite. The input graph is
/// never modified when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// The quantizer's parameters cannot be expressed as thresholds.
    #[error("cannot convert node '{node}': {detail}")]
    UnsupportedQuantConfig { node: String, detail: String },

    /// The rewritten graph does not preserve an output's type, or a
    /// synthesized threshold vector is malformed.
    #[error("rewrite of node '{node}' broke tensor '{tensor}': {detail}")]
    RewriteInvariant {
        node: String,
        tensor: String,
        detail: String,
    },

    #[error("shape inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("structural error: {0}")]
    Model(#[from] ModelError),
}

impl RewriteError {
    pub(crate) fn unsupported(node: &str, detail: impl Into<String>) -> Self {
        RewriteError::UnsupportedQuantConfig {
            node: node.to_string(),
            detail: detail.into(),
        }
    }
}

/// Errors raised by passes, pipelines, configuration and verification.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// A pass returned a graph that fails structural validation.
    #[error("pass '{pass}' left the graph invalid: {source}")]
    InvariantViolation {
        pass: String,
        #[source]
        source: ModelError,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Lowered outputs differ from the baseline beyond tolerance.
    #[error("output '{output}' diverges after lowering: max abs diff {max_abs:e}, max rel diff {max_rel:e}")]
    NotEquivalent {
        output: String,
        max_abs: f64,
        max_rel: f64,
    },

    /// Lowered output has a different shape than the baseline.
    #[error("output '{output}' changed shape from {reference} to {candidate}")]
    OutputShapeChanged {
        output: String,
        reference: Shape,
        candidate: Shape,
    },

    /// One side of a comparison did not produce an output.
    #[error("output '{output}' is missing from the {side} run")]
    MissingOutput { output: String, side: &'static str },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("structural error: {0}")]
    Model(#[from] ModelError),
}
