// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `MultiThreshold`.

use crate::registry::{arity, constant_error, eval_arity, operand_error, shape_error, InferInput, OpHandler, TensorType};
use crate::{ExecutionError, InferenceError};
use model_ir::quant::ThresholdAttrs;
use model_ir::Node;
use tensor_core::ops::{self, ThresholdParams};
use tensor_core::{Shape, Tensor};

/// Resolves the node attributes against concrete data and threshold shapes.
fn params(attrs: &ThresholdAttrs, data: &Shape, thresholds: &Shape) -> Result<ThresholdParams, String> {
    if thresholds.rank() != 2 {
        return Err(format!("thresholds must be [channels, steps], got {thresholds}"));
    }
    let channels = thresholds.dims()[0];
    let channel_axis = if channels == 1 {
        data.normalize_axis(attrs.channel_axis).unwrap_or(0)
    } else {
        data.normalize_axis(attrs.channel_axis)
            .ok_or_else(|| format!("channel axis {} out of range for {data}", attrs.channel_axis))?
    };
    if let Some(levels) = attrs.out_dtype {
        let steps = thresholds.dims()[1];
        if steps != levels.threshold_count() {
            return Err(format!(
                "{levels} output needs {} thresholds per channel, got {steps}",
                levels.threshold_count()
            ));
        }
    }
    Ok(ThresholdParams {
        channel_axis,
        out_scale: attrs.out_scale,
        out_bias: attrs.out_bias,
        bipolar: attrs.out_dtype.is_some_and(|t| t.is_bipolar()),
    })
}

/// Finds the first channel whose thresholds are not strictly increasing.
fn non_monotonic_row(thresholds: &Tensor) -> Option<usize> {
    let steps = thresholds.shape().dim(1)?;
    if steps == 0 {
        return None;
    }
    thresholds
        .values()
        .chunks(steps)
        .position(|row| row.windows(2).any(|w| !(w[0] < w[1])))
}

pub(crate) struct MultiThreshold;

impl OpHandler for MultiThreshold {
    fn infer(&self, node: &Node, inputs: &[InferInput<'_>]) -> Result<Vec<TensorType>, InferenceError> {
        arity(node, inputs.len(), 2, 2)?;
        let attrs = ThresholdAttrs::from_node(node)?;
        let (data, thresholds) = (&inputs[0].ty.shape, &inputs[1].ty.shape);
        let p = params(&attrs, data, thresholds).map_err(|d| shape_error(node, d))?;
        let shape = ops::threshold_output_shape(data, thresholds, p.channel_axis)
            .map_err(|e| shape_error(node, e.to_string()))?;
        if let Some(row) = inputs[1].constant.and_then(non_monotonic_row) {
            return Err(constant_error(
                node,
                format!("thresholds of channel {row} are not strictly increasing"),
            ));
        }
        Ok(vec![TensorType::new(ops::real_dtype(inputs[0].ty.dtype), shape)])
    }

    fn eval(&self, node: &Node, inputs: &[&Tensor]) -> Result<Vec<Tensor>, ExecutionError> {
        eval_arity(node, inputs.len(), 2, 2)?;
        let attrs = ThresholdAttrs::from_node(node)?;
        let p = params(&attrs, inputs[0].shape(), inputs[1].shape()).map_err(|d| operand_error(node, d))?;
        let out = ops::multithreshold(inputs[0], inputs[1], &p).map_err(|e| ExecutionError::from_kernel(node, e))?;
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::quant::{LevelType, ThresholdAttrs};
    use model_ir::OpKind;
    use tensor_core::DType;

    fn node(attrs: ThresholdAttrs) -> Node {
        let mut n = Node::new("mt", OpKind::MultiThreshold);
        attrs.apply(&mut n);
        n
    }

    fn operand<'a>(name: &'a str, t: &'a Tensor) -> InferInput<'a> {
        InferInput {
            name,
            ty: TensorType::of(t),
            constant: Some(t),
        }
    }

    #[test]
    fn test_bipolar_scenario() {
        let n = node(ThresholdAttrs {
            out_scale: 0.5,
            out_bias: -0.5,
            out_dtype: Some(LevelType::Bipolar),
            channel_axis: 1,
        });
        let x = Tensor::from_f32(Shape::vector(3), &[-3.2, 0.0, 4.1]).unwrap();
        let th = Tensor::from_f32(Shape::matrix(1, 1), &[0.0]).unwrap();
        let out = MultiThreshold.eval(&n, &[&x, &th]).unwrap();
        assert_eq!(out[0].to_f32_vec(), vec![-0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_threshold_count_must_match_out_dtype() {
        let n = node(ThresholdAttrs {
            out_dtype: Some(LevelType::Int { bits: 2, signed: false }),
            ..Default::default()
        });
        let x = Tensor::zeros(Shape::matrix(1, 4), DType::F32);
        let two = Tensor::from_f32(Shape::matrix(1, 2), &[0.5, 1.5]).unwrap();
        let err = MultiThreshold.infer(&n, &[operand("x", &x), operand("t", &two)]).unwrap_err();
        assert!(matches!(err, InferenceError::ShapeMismatch { .. }));

        let three = Tensor::from_f32(Shape::matrix(1, 3), &[0.5, 1.5, 2.5]).unwrap();
        let out = MultiThreshold.infer(&n, &[operand("x", &x), operand("t", &three)]).unwrap();
        assert_eq!(out[0].shape, Shape::matrix(1, 4));
    }

    #[test]
    fn test_channel_count_must_match() {
        let n = node(ThresholdAttrs::default());
        let x = Tensor::zeros(Shape::matrix(1, 4), DType::F32);
        let th = Tensor::from_f32(Shape::matrix(3, 1), &[0.0, 0.0, 0.0]).unwrap();
        assert!(MultiThreshold.infer(&n, &[operand("x", &x), operand("t", &th)]).is_err());
    }

    #[test]
    fn test_non_monotonic_thresholds_rejected() {
        let n = node(ThresholdAttrs::default());
        let x = Tensor::zeros(Shape::matrix(1, 4), DType::F32);
        let th = Tensor::from_f32(Shape::matrix(1, 3), &[0.5, 0.5, 2.5]).unwrap();
        let err = MultiThreshold.infer(&n, &[operand("x", &x), operand("t", &th)]).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidConstant { .. }));
    }
}
