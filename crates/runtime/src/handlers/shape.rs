// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layout operators: reshape, transpose and flatten.

use crate::registry::{
    arity, constant_error, eval_arity, operand_error, shape_error, InferInput, OpHandler, TensorType,
};
use crate::{ExecutionError, InferenceError};
use model_ir::quant::attr;
use model_ir::Node;
use tensor_core::{ops, Tensor};

/// Reads a shape tensor as signed dimensions.
fn target_dims(tensor: &Tensor) -> Option<Vec<i64>> {
    if tensor.shape().rank() > 1 || !tensor.is_integral() {
        return None;
    }
    Some(tensor.values().iter().map(|&v| v as i64).collect())
}

pub(crate) struct Reshape;

impl OpHandler for Reshape {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 2, 2)?;
        let target = inputs[1].constant.ok_or_else(|| InferenceError::NonConstantInput {
            node: node.name.clone(),
            op: node.op.to_string(),
            input: inputs[1].name.to_string(),
        })?;
        let dims = target_dims(target)
            .ok_or_else(|| constant_error(node, "target shape must be a 1-D integer tensor"))?;
        let shape = ops::reshape_shape(&inputs[0].ty.shape, &dims)
            .map_err(|e| shape_error(node, e.to_string()))?;
        Ok(vec![TensorType::new(inputs[0].ty.dtype, shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 2, 2)?;
        let dims = target_dims(inputs[1])
            .ok_or_else(|| operand_error(node, "target shape must be a 1-D integer tensor"))?;
        let out = ops::reshape(inputs[0], &dims).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct Transpose;

impl Transpose {
    fn perm(node: &Node) -> Result<Vec<i64>, model_ir::ModelError> {
        Ok(node.ints_attr(attr::PERM)?.map(<[i64]>::to_vec).unwrap_or_default())
    }
}

impl OpHandler for Transpose {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 1, 1)?;
        let perm = Self::perm(node)?;
        let (shape, _) = ops::transpose_shape(&inputs[0].ty.shape, &perm)
            .map_err(|e| shape_error(node, e.to_string()))?;
        Ok(vec![TensorType::new(inputs[0].ty.dtype, shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 1, 1)?;
        let perm = Self::perm(node)?;
        let out = ops::transpose(inputs[0], &perm).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct Flatten;

impl OpHandler for Flatten {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 1, 1)?;
        let axis = node.int_attr(attr::AXIS, 1)?;
        let shape = ops::flatten_shape(&inputs[0].ty.shape, axis)
            .map_err(|e| shape_error(node, e.to_string()))?;
        Ok(vec![TensorType::new(inputs[0].ty.dtype, shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 1, 1)?;
        let axis = node.int_attr(attr::AXIS, 1)?;
        let out = ops::flatten(inputs[0], axis).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}
