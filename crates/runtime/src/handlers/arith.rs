// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Identity, elementwise arithmetic, matmul and relu.

use crate::registry::{arity, eval_arity, shape_error, type_error, InferInput, OpHandler, TensorType};
use crate::{ExecutionError, InferenceError};
use model_ir::Node;
use tensor_core::ops::{self, BinaryOp};
use tensor_core::Tensor;

pub(crate) struct Identity;

impl OpHandler for Identity {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 1, 1)?;
        Ok(vec![inputs[0].ty.clone()])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 1, 1)?;
        Ok(vec![inputs[0].clone()])
    }
}

pub(crate) struct Binary(pub BinaryOp);

impl OpHandler for Binary {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 2, 2)?;
        let (a, b) = (&inputs[0].ty, &inputs[1].ty);
        let shape = a.shape.broadcast(&b.shape).ok_or_else(|| {
            shape_error(node, format!("cannot broadcast {} with {}", a.shape, b.shape))
        })?;
        let dtype = a.dtype.promote(b.dtype).ok_or_else(|| {
            type_error(node, format!("cannot combine {} with {}", a.dtype, b.dtype))
        })?;
        Ok(vec![TensorType::new(dtype, shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 2, 2)?;
        let out = ops::binary(self.0, inputs[0], inputs[1])
            .map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct MatMul;

impl OpHandler for MatMul {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 2, 2)?;
        let (a, b) = (&inputs[0].ty, &inputs[1].ty);
        let shape = a.shape.matmul(&b.shape).ok_or_else(|| {
            shape_error(node, format!("cannot multiply {} by {}", a.shape, b.shape))
        })?;
        let dtype = a.dtype.promote(b.dtype).ok_or_else(|| {
            type_error(node, format!("cannot combine {} with {}", a.dtype, b.dtype))
        })?;
        Ok(vec![TensorType::new(dtype, shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 2, 2)?;
        let out = ops::matmul(inputs[0], inputs[1]).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct Relu;

impl OpHandler for Relu {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 1, 1)?;
        Ok(vec![inputs[0].ty.clone()])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 1, 1)?;
        let out = ops::relu(inputs[0]).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}
