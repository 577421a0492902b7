// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape-manipulating operations: reshape, transpose, flatten.
//!
//! The `*_shape` functions are shared with shape inference so that the
//! interpreter and the inferred value infos can never disagree.

use crate::{Shape, Tensor, TensorError};

/// Resolves an ONNX-style reshape target against `input`.
///
/// `0` copies the corresponding input dimension and a single `-1` absorbs
/// the remaining element count.
pub fn reshape_shape(input: &Shape, target: &[i64]) -> Result<Shape, TensorError> {
    let mismatch = || TensorError::ShapeMismatch {
        op: "reshape",
        lhs: input.clone(),
        rhs: Shape::new(target.iter().map(|&d| d.max(0) as usize).collect()),
    };

    let mut dims = Vec::with_capacity(target.len());
    let mut infer_at = None;
    for (i, &d) in target.iter().enumerate() {
        match d {
            -1 if infer_at.is_none() => {
                infer_at = Some(i);
                dims.push(1);
            }
            0 => dims.push(input.dim(i).ok_or_else(mismatch)?),
            d if d > 0 => dims.push(d as usize),
            _ => return Err(mismatch()),
        }
    }

    let known: usize = dims.iter().product();
    if let Some(i) = infer_at {
        if known == 0 || input.num_elements() % known != 0 {
            return Err(mismatch());
        }
        dims[i] = input.num_elements() / known;
    }
    let shape = Shape::new(dims);
    if shape.num_elements() != input.num_elements() {
        return Err(mismatch());
    }
    Ok(shape)
}

/// Reshapes `input` to the resolved `target`.
pub fn reshape(input: &Tensor, target: &[i64]) -> Result<Tensor, TensorError> {
    input.reshaped(reshape_shape(input.shape(), target)?)
}

/// Validates a permutation and returns the permuted shape. An empty `perm`
/// reverses the axes.
pub fn transpose_shape(input: &Shape, perm: &[i64]) -> Result<(Shape, Vec<usize>), TensorError> {
    let rank = input.rank();
    let perm: Vec<usize> = if perm.is_empty() {
        (0..rank).rev().collect()
    } else {
        perm.iter().map(|&p| p.max(0) as usize).collect()
    };

    let mut seen = vec![false; rank];
    let valid = perm.len() == rank
        && perm.iter().all(|&p| p < rank && !std::mem::replace(&mut seen[p], true));
    if !valid {
        return Err(TensorError::Numeric {
            op: "transpose",
            detail: format!("invalid permutation {perm:?} for rank {rank}"),
        });
    }
    let dims = perm.iter().map(|&p| input.dims()[p]).collect();
    Ok((Shape::new(dims), perm))
}

/// Permutes the axes of `input`.
pub fn transpose(input: &Tensor, perm: &[i64]) -> Result<Tensor, TensorError> {
    let (out_shape, perm) = transpose_shape(input.shape(), perm)?;
    let in_strides = input.shape().strides();
    let rank = out_shape.rank();
    let n = out_shape.num_elements();
    let src = input.values();

    let mut values = Vec::with_capacity(n);
    let mut index = vec![0usize; rank];
    for _ in 0..n {
        let offset: usize = (0..rank).map(|i| index[i] * in_strides[perm[i]]).sum();
        values.push(src[offset]);
        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < out_shape.dims()[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    Tensor::from_computed("transpose", out_shape, input.dtype(), values)
}

/// Collapses `input` into a 2-D shape split at `axis`.
pub fn flatten_shape(input: &Shape, axis: i64) -> Result<Shape, TensorError> {
    let rank = input.rank() as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    if !(0..=rank).contains(&axis) {
        return Err(TensorError::Numeric {
            op: "flatten",
            detail: format!("axis {axis} out of range for rank {rank}"),
        });
    }
    let (outer, inner) = input.dims().split_at(axis as usize);
    Ok(Shape::matrix(outer.iter().product(), inner.iter().product()))
}

/// Flattens `input` around `axis`.
pub fn flatten(input: &Tensor, axis: i64) -> Result<Tensor, TensorError> {
    input.reshaped(flatten_shape(input.shape(), axis)?)
}
