// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise arithmetic with numpy-style broadcasting.

use crate::{DType, Shape, Tensor, TensorError};

/// Binary arithmetic operator applied elementwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }
}

/// Applies `op` to `lhs` and `rhs` after broadcasting them to a common shape.
///
/// The result dtype follows [`DType::promote`]. Integer results are range
/// checked (overflow is an error, never a wrap), integer division truncates
/// toward zero and division by zero is a numeric error.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] for non-broadcastable shapes and
/// [`TensorError::UnsupportedDType`] for mismatched integer types.
pub fn binary(op: BinaryOp, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, TensorError> {
    let name = op.name();
    let out_shape = lhs
        .shape()
        .broadcast(rhs.shape())
        .ok_or_else(|| TensorError::ShapeMismatch {
            op: name,
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        })?;
    let dtype = lhs
        .dtype()
        .promote(rhs.dtype())
        .ok_or(TensorError::UnsupportedDType {
            op: name,
            dtype: rhs.dtype(),
        })?;

    let a = broadcast_values(lhs, &out_shape);
    let b = broadcast_values(rhs, &out_shape);
    let integer = !dtype.is_float();

    let mut values = Vec::with_capacity(a.len());
    for (&x, &y) in a.iter().zip(&b) {
        let v = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div if integer => {
                if y == 0.0 {
                    return Err(TensorError::Numeric {
                        op: name,
                        detail: "integer division by zero".into(),
                    });
                }
                (x / y).trunc()
            }
            BinaryOp::Div => x / y,
        };
        values.push(v);
    }
    Tensor::from_computed(name, out_shape, dtype, values)
}

/// Rectified linear unit: `max(x, 0)`.
pub fn relu(input: &Tensor) -> Result<Tensor, TensorError> {
    let values = input.values().iter().map(|&x| if x > 0.0 { x } else { 0.0 }).collect();
    Tensor::from_computed("relu", input.shape().clone(), input.dtype(), values)
}

/// Expands `t` to `shape` by repeating along broadcast axes.
///
/// `shape` must be a valid broadcast target for `t.shape()`.
pub fn broadcast_values(t: &Tensor, shape: &Shape) -> Vec<f64> {
    if t.shape() == shape {
        return t.values().to_vec();
    }
    let rank = shape.rank();
    let src_strides = t.shape().strides();
    // Stride 0 on broadcast axes so the same source element is reused.
    let strides: Vec<usize> = (0..rank)
        .map(|i| {
            let offset = rank - t.shape().rank();
            if i < offset || t.shape().dims()[i - offset] == 1 {
                0
            } else {
                src_strides[i - offset]
            }
        })
        .collect();

    let n = shape.num_elements();
    let src = t.values();
    let mut out = Vec::with_capacity(n);
    let mut index = vec![0usize; rank];
    for _ in 0..n {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        out.push(src[offset]);
        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < shape.dims()[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

/// Returns `dtype` if it is a float, otherwise [`DType::F32`]; quantizer
/// outputs are always real-valued.
pub fn real_dtype(dtype: DType) -> DType {
    if dtype.is_float() {
        dtype
    } else {
        DType::F32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(dims: Vec<usize>, values: &[f32]) -> Tensor {
        Tensor::from_f32(Shape::new(dims), values).unwrap()
    }

    #[test]
    fn test_add_same_shape() {
        let a = f32_tensor(vec![3], &[1.0, 2.0, 3.0]);
        let b = f32_tensor(vec![3], &[10.0, 20.0, 30.0]);
        let c = binary(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(c.to_f32_vec(), vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_mul_broadcast_row() {
        let a = f32_tensor(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = f32_tensor(vec![3], &[1.0, 0.0, -1.0]);
        let c = binary(BinaryOp::Mul, &a, &b).unwrap();
        assert_eq!(c.shape(), &Shape::matrix(2, 3));
        assert_eq!(c.to_f32_vec(), vec![1.0, 0.0, -3.0, 4.0, 0.0, -6.0]);
    }

    #[test]
    fn test_sub_broadcast_column() {
        let a = f32_tensor(vec![2, 2], &[5.0, 6.0, 7.0, 8.0]);
        let b = f32_tensor(vec![2, 1], &[1.0, 2.0]);
        let c = binary(BinaryOp::Sub, &a, &b).unwrap();
        assert_eq!(c.to_f32_vec(), vec![4.0, 5.0, 5.0, 6.0]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = f32_tensor(vec![3], &[1.0; 3]);
        let b = f32_tensor(vec![2], &[1.0; 2]);
        assert!(matches!(
            binary(BinaryOp::Add, &a, &b),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_integer_overflow_is_error() {
        let a = Tensor::from_i64(Shape::vector(1), DType::I8, &[100]).unwrap();
        let b = Tensor::from_i64(Shape::vector(1), DType::I8, &[100]).unwrap();
        let err = binary(BinaryOp::Add, &a, &b).unwrap_err();
        assert!(err.is_overflow());
    }

    #[test]
    fn test_integer_division() {
        let a = Tensor::from_i64(Shape::vector(2), DType::I32, &[7, -7]).unwrap();
        let b = Tensor::from_i64(Shape::vector(2), DType::I32, &[2, 2]).unwrap();
        let c = binary(BinaryOp::Div, &a, &b).unwrap();
        assert_eq!(c.values(), &[3.0, -3.0]);

        let zero = Tensor::from_i64(Shape::vector(2), DType::I32, &[0, 1]).unwrap();
        assert!(binary(BinaryOp::Div, &a, &zero).is_err());
    }

    #[test]
    fn test_relu() {
        let a = f32_tensor(vec![4], &[-1.0, 0.0, 0.5, 3.0]);
        assert_eq!(relu(&a).unwrap().to_f32_vec(), vec![0.0, 0.0, 0.5, 3.0]);
    }

    #[test]
    fn test_broadcast_scalar() {
        let s = Tensor::scalar_f32(2.0);
        let v = broadcast_values(&s, &Shape::matrix(2, 2));
        assert_eq!(v, vec![2.0; 4]);
    }
}
