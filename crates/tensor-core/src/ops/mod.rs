// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor kernels.
//!
//! Every kernel takes its operands by reference and returns a freshly
//! allocated tensor, so graph initializers are never mutated in place.
//! Shape-only helpers (`*_shape`) are shared with static shape inference.

mod elementwise_op;
mod layout_op;
mod matmul_op;
mod quant_op;
mod threshold_op;

pub use elementwise_op::{binary, broadcast_values, real_dtype, relu, BinaryOp};
pub use layout_op::{flatten, flatten_shape, reshape, reshape_shape, transpose, transpose_shape};
pub use matmul_op::matmul;
pub use quant_op::{
    bipolar_level, bipolar_quant, dequantize, quant, quant_level, quant_output_shape, trunc,
    IntRange, RoundingMode, TruncSpec,
};
pub use threshold_op::{multithreshold, threshold_count, threshold_output_shape, ThresholdParams};
