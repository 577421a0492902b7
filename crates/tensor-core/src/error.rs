// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction and kernels.

use crate::{DType, Shape};

/// Errors that can occur during tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of supplied values does not match the shape.
    #[error("element count mismatch: shape needs {expected} values, got {actual}")]
    ElementCountMismatch { expected: usize, actual: usize },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// The requested data type is not supported for this operation.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// An integer result left the range of its type or bit-width.
    #[error("numeric overflow in {op}: {value} does not fit {dtype}")]
    Overflow {
        op: &'static str,
        value: f64,
        dtype: DType,
    },

    /// A quantized integer left the range implied by a bit-width.
    #[error("numeric overflow in {op}: {value} outside the {bits}-bit range [{min}, {max}]")]
    BitWidthOverflow {
        op: &'static str,
        value: f64,
        bits: u32,
        min: f64,
        max: f64,
    },

    /// A numeric computation or parameter is invalid (e.g., zero scale, NaN).
    #[error("numeric error in {op}: {detail}")]
    Numeric { op: &'static str, detail: String },
}

impl TensorError {
    /// Returns `true` for the overflow family, which the interpreter surfaces
    /// as a dedicated error kind.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. } | Self::BitWidthOverflow { .. })
    }
}
