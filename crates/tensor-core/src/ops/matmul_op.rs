// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication operation.

use crate::{Tensor, TensorError};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// `lhs` is `[..., M, K]` (or a `[K]` vector) and `rhs` is a `[K, N]`
/// matrix; leading `lhs` dimensions are treated as a batch. Accumulation
/// happens in `f64` and the result is rounded once to the promoted dtype.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
/// Returns [`TensorError::UnsupportedDType`] for mismatched integer types.
pub fn matmul(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, TensorError> {
    let out_shape = lhs
        .shape()
        .matmul(rhs.shape())
        .ok_or_else(|| TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        })?;
    let dtype = lhs
        .dtype()
        .promote(rhs.dtype())
        .ok_or(TensorError::UnsupportedDType {
            op: "matmul",
            dtype: rhs.dtype(),
        })?;

    let k = rhs.shape().dims()[0];
    let n = rhs.shape().dims()[1];
    let m = if k == 0 { 0 } else { lhs.num_elements() / k };

    let mut c = vec![0.0f64; out_shape.num_elements()];
    matmul_generic(lhs.values(), rhs.values(), &mut c, m, k, n);

    Tensor::from_computed("matmul", out_shape, dtype, c)
}

/// Generic (portable) matrix multiplication.
///
/// Uses a simple ikj loop order for better cache locality on the `b` matrix.
fn matmul_generic(a: &[f64], b: &[f64], c: &mut [f64], m: usize, k: usize, n: usize) {
    // ikj loop order: the inner loop is a saxpy on a row of C, which is
    // sequential in memory.
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            let c_row = &mut c[i * n..(i + 1) * n];
            let b_row = &b[p * n..(p + 1) * n];
            for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                *c_ij += a_ip * b_pj;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DType, Shape};

    #[test]
    fn test_matmul_2x3_times_3x2() {
        // A = [[1, 2, 3], [4, 5, 6]]
        // B = [[7, 8], [9, 10], [11, 12]]
        // C = [[58, 64], [139, 154]]
        let a = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b =
            Tensor::from_f32(Shape::matrix(3, 2), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();

        let c = matmul(&a, &b).unwrap();

        assert_eq!(c.shape(), &Shape::matrix(2, 2));
        assert_eq!(c.to_f32_vec(), vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_identity() {
        let a = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let eye = Tensor::from_f32(Shape::matrix(2, 2), &[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(matmul(&a, &eye).unwrap(), a);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
        let b = Tensor::zeros(Shape::matrix(4, 2), DType::F32); // 4 != 3
        assert!(matmul(&a, &b).is_err());
    }

    #[test]
    fn test_matmul_vector_and_batch() {
        let w = Tensor::from_f32(Shape::matrix(2, 1), &[1.0, 2.0]).unwrap();
        let v = Tensor::from_f32(Shape::vector(2), &[3.0, 4.0]).unwrap();
        assert_eq!(matmul(&v, &w).unwrap().to_f32_vec(), vec![11.0]);

        let batch = Tensor::from_f32(Shape::new(vec![2, 1, 2]), &[1.0, 1.0, 2.0, 0.0]).unwrap();
        let out = matmul(&batch, &w).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![2, 1, 1]));
        assert_eq!(out.to_f32_vec(), vec![3.0, 2.0]);
    }

    #[test]
    fn test_matmul_int_overflow() {
        let a = Tensor::from_i64(Shape::matrix(1, 2), DType::I8, &[100, 100]).unwrap();
        let b = Tensor::from_i64(Shape::matrix(2, 1), DType::I8, &[1, 1]).unwrap();
        assert!(matmul(&a, &b).unwrap_err().is_overflow());
    }
}
