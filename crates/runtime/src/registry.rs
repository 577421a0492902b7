// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator registry.
//!
//! Every registered [`OpKind`] maps to exactly one [`OpHandler`] that knows
//! how to infer its output types and how to evaluate it. The table is built
//! once, on first use, and is read-only afterwards; supporting a new
//! operator means adding a handler to [`Registry::builtin`].

use crate::handlers;
use crate::{ExecutionError, InferenceError};
use model_ir::{ModelError, Node, OpKind};
use std::collections::HashMap;
use std::sync::OnceLock;
use tensor_core::ops::BinaryOp;
use tensor_core::{DType, Shape, Tensor};

/// Fully known element type and shape of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorType {
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorType {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    pub fn of(tensor: &Tensor) -> Self {
        Self::new(tensor.dtype(), tensor.shape().clone())
    }
}

impl From<TensorType> for model_ir::ValueInfo {
    fn from(t: TensorType) -> Self {
        model_ir::ValueInfo::new(t.dtype, t.shape)
    }
}

/// One operand as seen by shape inference.
#[derive(Debug, Clone)]
pub struct InferInput<'a> {
    /// Tensor name, for error messages.
    pub name: &'a str,
    pub ty: TensorType,
    /// Constant data when the operand is an initializer.
    pub constant: Option<&'a Tensor>,
}

/// Inference and evaluation for one operator kind.
pub trait OpHandler: Send + Sync {
    /// Predicts output types from input types (and constant inputs).
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError>;

    /// Evaluates the node on concrete inputs.
    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError>;
}

/// Read-only table from operator kind to handler.
pub struct Registry {
    handlers: HashMap<OpKind, Box<dyn OpHandler>>,
}

impl Registry {
    /// Builds the table of built-in handlers.
    pub fn builtin() -> Self {
        let mut r = Self {
            handlers: HashMap::new(),
        };
        r.register(OpKind::Identity, handlers::arith::Identity);
        r.register(OpKind::Add, handlers::arith::Binary(BinaryOp::Add));
        r.register(OpKind::Sub, handlers::arith::Binary(BinaryOp::Sub));
        r.register(OpKind::Mul, handlers::arith::Binary(BinaryOp::Mul));
        r.register(OpKind::Div, handlers::arith::Binary(BinaryOp::Div));
        r.register(OpKind::MatMul, handlers::arith::MatMul);
        r.register(OpKind::Relu, handlers::arith::Relu);
        r.register(OpKind::Reshape, handlers::shape::Reshape);
        r.register(OpKind::Transpose, handlers::shape::Transpose);
        r.register(OpKind::Flatten, handlers::shape::Flatten);
        r.register(OpKind::Quant, handlers::quant::Quant);
        r.register(OpKind::BipolarQuant, handlers::quant::BipolarQuant);
        r.register(OpKind::Trunc, handlers::quant::Trunc);
        r.register(OpKind::MultiThreshold, handlers::threshold::MultiThreshold);
        r
    }

    fn register(&mut self, kind: OpKind, handler: impl OpHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn get(&self, kind: &OpKind) -> Option<&dyn OpHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }

    pub fn contains(&self, kind: &OpKind) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let r = Registry::builtin();
        tracing::debug!("operator registry initialised with {} handlers", r.len());
        r
    })
}

// ── Helpers shared by the handlers ─────────────────────────────────

pub(crate) fn shape_error(node: &Node, detail: impl Into<String>) -> InferenceError {
    InferenceError::ShapeMismatch {
        node: node.name.clone(),
        op: node.op.to_string(),
        detail: detail.into(),
    }
}

pub(crate) fn type_error(node: &Node, detail: impl Into<String>) -> InferenceError {
    InferenceError::TypeMismatch {
        node: node.name.clone(),
        op: node.op.to_string(),
        detail: detail.into(),
    }
}

pub(crate) fn constant_error(node: &Node, detail: impl Into<String>) -> InferenceError {
    InferenceError::InvalidConstant {
        node: node.name.clone(),
        op: node.op.to_string(),
        detail: detail.into(),
    }
}

pub(crate) fn operand_error(node: &Node, detail: impl Into<String>) -> ExecutionError {
    ExecutionError::InvalidOperands {
        node: node.name.clone(),
        op: node.op.to_string(),
        detail: detail.into(),
    }
}

/// Checks the input count for inference.
pub(crate) fn arity(node: &Node, got: usize, min: usize, max: usize) -> Result<(), InferenceError> {
    if got < min || got > max {
        return Err(InferenceError::Model(ModelError::InvalidNode {
            node: node.name.clone(),
            detail: format!("{} expects {min} to {max} inputs, got {got}", node.op),
        }));
    }
    Ok(())
}

/// Checks the input count for evaluation.
pub(crate) fn eval_arity(node: &Node, got: usize, min: usize, max: usize) -> Result<(), ExecutionError> {
    if got < min || got > max {
        return Err(operand_error(
            node,
            format!("expects {min} to {max} inputs, got {got}"),
        ));
    }
    Ok(())
}
