// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Multi-threshold activation.

use super::elementwise_op::real_dtype;
use crate::{Shape, Tensor, TensorError};

/// Output mapping and channel layout of a multi-threshold node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Axis of the data tensor indexed by the threshold rows.
    pub channel_axis: usize,
    pub out_scale: f64,
    pub out_bias: f64,
    /// Bipolar outputs step by two levels per crossed threshold, so a single
    /// threshold maps onto `{-1, +1}` instead of `{0, 1}`.
    pub bipolar: bool,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            channel_axis: 1,
            out_scale: 1.0,
            out_bias: 0.0,
            bipolar: false,
        }
    }
}

impl ThresholdParams {
    /// Maps a crossed-threshold count onto the output value.
    pub fn output_value(&self, count: usize) -> f64 {
        let level = if self.bipolar {
            2.0 * count as f64
        } else {
            count as f64
        };
        self.out_scale * level + self.out_bias
    }
}

/// Number of thresholds in `row` that `x` reaches (`t <= x`).
///
/// NaN reaches no threshold.
pub fn threshold_count(x: f64, row: &[f64]) -> usize {
    row.iter().filter(|&&t| t <= x).count()
}

/// Checks that a `[C, T]` threshold matrix lines up with `input` and returns
/// the output shape (always the input shape).
///
/// `C` is either 1 (shared by every channel) or the extent of the channel
/// axis of `input`.
pub fn threshold_output_shape(
    input: &Shape,
    thresholds: &Shape,
    channel_axis: usize,
) -> Result<Shape, TensorError> {
    let mismatch = || TensorError::ShapeMismatch {
        op: "multithreshold",
        lhs: input.clone(),
        rhs: thresholds.clone(),
    };
    if thresholds.rank() != 2 {
        return Err(mismatch());
    }
    let channels = thresholds.dim(0).ok_or_else(mismatch)?;
    if channels != 1 && input.dim(channel_axis) != Some(channels) {
        return Err(mismatch());
    }
    Ok(input.clone())
}

/// Counts, per element of `x`, how many thresholds of its channel row are
/// reached, then maps the count through `params`.
///
/// The result keeps the shape of `x` and the real dtype of `x` (integer
/// inputs produce `F32`).
pub fn multithreshold(
    x: &Tensor,
    thresholds: &Tensor,
    params: &ThresholdParams,
) -> Result<Tensor, TensorError> {
    let shape = threshold_output_shape(x.shape(), thresholds.shape(), params.channel_axis)?;
    let channels = thresholds.shape().dim(0).unwrap_or(1);
    let per_row = thresholds.shape().dim(1).unwrap_or(0);
    let rows: Vec<&[f64]> = if per_row == 0 {
        let empty: &[f64] = &[];
        vec![empty; channels]
    } else {
        thresholds.values().chunks(per_row).collect()
    };

    // Elements of one channel repeat every `inner` positions.
    let inner = if channels > 1 {
        shape.dims()[params.channel_axis + 1..].iter().product::<usize>()
    } else {
        1
    };

    let values = x
        .values()
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = if channels > 1 { (i / inner) % channels } else { 0 };
            params.output_value(threshold_count(v, rows[c]))
        })
        .collect();
    Tensor::from_computed("multithreshold", shape, real_dtype(x.dtype()), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_count() {
        assert_eq!(threshold_count(0.5, &[0.5, 1.5, 2.5]), 1);
        assert_eq!(threshold_count(-1.0, &[0.5, 1.5, 2.5]), 0);
        assert_eq!(threshold_count(9.0, &[0.5, 1.5, 2.5]), 3);
        assert_eq!(threshold_count(f64::NAN, &[0.5]), 0);
    }

    #[test]
    fn test_shared_thresholds() {
        let x = Tensor::from_f32(Shape::vector(4), &[0.4, 1.6, 2.9, 3.1]).unwrap();
        let th = Tensor::from_f32(Shape::matrix(1, 3), &[0.5, 1.5, 2.5]).unwrap();
        let params = ThresholdParams {
            channel_axis: 0,
            ..Default::default()
        };
        let y = multithreshold(&x, &th, &params).unwrap();
        assert_eq!(y.to_f32_vec(), vec![0.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_per_channel_thresholds() {
        // NCHW-like [1, 2, 2]: channel 0 has threshold 0, channel 1 has 10.
        let x = Tensor::from_f32(Shape::new(vec![1, 2, 2]), &[1.0, -1.0, 5.0, 11.0]).unwrap();
        let th = Tensor::from_f32(Shape::matrix(2, 1), &[0.0, 10.0]).unwrap();
        let y = multithreshold(&x, &th, &ThresholdParams::default()).unwrap();
        assert_eq!(y.to_f32_vec(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_bipolar_output() {
        let x = Tensor::from_f32(Shape::vector(3), &[-3.2, 0.0, 4.1]).unwrap();
        let th = Tensor::from_f32(Shape::matrix(1, 1), &[0.0]).unwrap();
        let params = ThresholdParams {
            channel_axis: 0,
            out_scale: 0.5,
            out_bias: -0.5,
            bipolar: true,
        };
        let y = multithreshold(&x, &th, &params).unwrap();
        assert_eq!(y.to_f32_vec(), vec![-0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_channel_mismatch() {
        let x = Tensor::from_f32(Shape::matrix(1, 3), &[0.0; 3]).unwrap();
        let th = Tensor::from_f32(Shape::matrix(2, 1), &[0.0, 1.0]).unwrap();
        assert!(multithreshold(&x, &th, &ThresholdParams::default()).is_err());
    }
}
