// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The quantizer family: `Quant`, `BipolarQuant` and `Trunc`.
//!
//! Quantizers always produce real values: float inputs keep their dtype and
//! integer inputs produce `F32`.

use crate::registry::{arity, constant_error, eval_arity, shape_error, InferInput, OpHandler, TensorType};
use crate::{ExecutionError, InferenceError};
use model_ir::quant::QuantAttrs;
use model_ir::Node;
use tensor_core::ops::{self, IntRange, TruncSpec};
use tensor_core::Tensor;

/// Output type shared by the family: the broadcast of data and parameters.
fn output_type(node: &Node, operands: &[InferInput<'_>]) -> Result<TensorType, InferenceError> {
    let shapes: Vec<_> = operands.iter().map(|i| &i.ty.shape).collect();
    let shape = ops::quant_output_shape("quant", &shapes).map_err(|e| shape_error(node, e.to_string()))?;
    Ok(TensorType::new(ops::real_dtype(operands[0].ty.dtype), shape))
}

/// A bit-width operand must hold a single value; when it is constant the
/// value must describe a valid range.
fn check_bit_width(node: &Node, input: &InferInput<'_>, signed: bool) -> Result<Option<IntRange>, InferenceError> {
    if input.ty.shape.num_elements() != 1 {
        return Err(shape_error(
            node,
            format!("bit-width '{}' must hold one value, got shape {}", input.name, input.ty.shape),
        ));
    }
    match input.constant {
        None => Ok(None),
        Some(t) => IntRange::from_tensor(t, signed)
            .map(Some)
            .map_err(|e| constant_error(node, e.to_string())),
    }
}

fn check_scale(node: &Node, input: &InferInput<'_>) -> Result<(), InferenceError> {
    if let Some(t) = input.constant {
        if let Some(bad) = t.values().iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(constant_error(
                node,
                format!("scale '{}' must be finite and positive, found {bad}", input.name),
            ));
        }
    }
    Ok(())
}

pub(crate) struct Quant;

impl OpHandler for Quant {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 4, 4)?;
        let attrs = QuantAttrs::from_node(node)?;
        check_scale(node, &inputs[1])?;
        check_bit_width(node, &inputs[3], attrs.signed)?;
        Ok(vec![output_type(node, &inputs[..3])?])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 4, 4)?;
        let attrs = QuantAttrs::from_node(node)?;
        let out = ops::quant(inputs[0], inputs[1], inputs[2], inputs[3], attrs.signed, attrs.rounding)
            .map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct BipolarQuant;

impl OpHandler for BipolarQuant {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 2, 2)?;
        check_scale(node, &inputs[1])?;
        Ok(vec![output_type(node, inputs)?])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 2, 2)?;
        let out = ops::bipolar_quant(inputs[0], inputs[1]).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

pub(crate) struct Trunc;

impl OpHandler for Trunc {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 5, 5)?;
        let attrs = QuantAttrs::from_node(node)?;
        check_scale(node, &inputs[1])?;
        let in_range = check_bit_width(node, &inputs[3], attrs.signed)?;
        let out_range = check_bit_width(node, &inputs[4], attrs.signed)?;
        if let (Some(i), Some(o)) = (in_range, out_range) {
            TruncSpec::new(i, o, attrs.rounding).map_err(|e| constant_error(node, e.to_string()))?;
        }
        Ok(vec![output_type(node, &inputs[..3])?])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 5, 5)?;
        let attrs = QuantAttrs::from_node(node)?;
        let out = ops::trunc(
            inputs[0],
            inputs[1],
            inputs[2],
            inputs[3],
            inputs[4],
            attrs.signed,
            attrs.rounding,
        )
        .map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::quant::attr;
    use model_ir::OpKind;
    use tensor_core::{DType, Shape};

    fn operand<'a>(name: &'a str, t: &'a Tensor) -> InferInput<'a> {
        InferInput {
            name,
            ty: TensorType::of(t),
            constant: Some(t),
        }
    }

    #[test]
    fn test_quant_infer_keeps_data_shape() {
        let node = Node::new("q", OpKind::Quant).with_attr(attr::SIGNED, 0i64);
        let x = Tensor::zeros(Shape::matrix(2, 4), DType::F32);
        let s = Tensor::scalar_f32(0.5);
        let z = Tensor::scalar_f32(0.0);
        let b = Tensor::scalar_f32(4.0);
        let out = Quant
            .infer(&node, &[operand("x", &x), operand("s", &s), operand("z", &z), operand("b", &b)])
            .unwrap();
        assert_eq!(out[0], TensorType::new(DType::F32, Shape::matrix(2, 4)));
    }

    #[test]
    fn test_quant_infer_rejects_bad_constants() {
        let node = Node::new("q", OpKind::Quant);
        let x = Tensor::zeros(Shape::vector(4), DType::F32);
        let s = Tensor::scalar_f32(0.5);
        let z = Tensor::scalar_f32(0.0);
        let zero_bits = Tensor::scalar_f32(0.0);
        let err = Quant
            .infer(&node, &[operand("x", &x), operand("s", &s), operand("z", &z), operand("b", &zero_bits)])
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidConstant { .. }));

        let negative = Tensor::scalar_f32(-1.0);
        let bits = Tensor::scalar_f32(2.0);
        let err = Quant
            .infer(&node, &[operand("x", &x), operand("s", &negative), operand("z", &z), operand("b", &bits)])
            .unwrap_err();
        assert!(matches!(err, InferenceError::InvalidConstant { .. }));
    }

    #[test]
    fn test_int_input_produces_float() {
        let node = Node::new("bq", OpKind::BipolarQuant);
        let x = Tensor::zeros(Shape::vector(3), DType::I8);
        let s = Tensor::scalar_f32(1.0);
        let out = BipolarQuant.infer(&node, &[operand("x", &x), operand("s", &s)]).unwrap();
        assert_eq!(out[0].dtype, DType::F32);
    }

    #[test]
    fn test_trunc_rejects_widening() {
        let node = Node::new("t", OpKind::Trunc);
        let x = Tensor::zeros(Shape::vector(3), DType::F32);
        let s = Tensor::scalar_f32(1.0);
        let z = Tensor::scalar_f32(0.0);
        let narrow = Tensor::scalar_f32(2.0);
        let wide = Tensor::scalar_f32(4.0);
        let inputs = [
            operand("x", &x),
            operand("s", &s),
            operand("z", &z),
            operand("in", &narrow),
            operand("out", &wide),
        ];
        assert!(Trunc.infer(&node, &inputs).is_err());
    }

    #[test]
    fn test_trunc_overflow_surfaces() {
        let node = Node::new("t", OpKind::Trunc).with_attr(attr::SIGNED, 0i64);
        let x = Tensor::from_f32(Shape::vector(1), &[40.0]).unwrap();
        let s = Tensor::scalar_f32(1.0);
        let z = Tensor::scalar_f32(0.0);
        let in_bits = Tensor::scalar_f32(4.0);
        let out_bits = Tensor::scalar_f32(2.0);
        let err = Trunc.eval(&node, &[&x, &s, &z, &in_bits, &out_bits]).unwrap_err();
        assert!(err.is_overflow());
    }
}
