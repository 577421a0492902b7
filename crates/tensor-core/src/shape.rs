// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors and dimension utilities.

use std::fmt;

/// Describes the dimensionality of a [`crate::Tensor`].
///
/// An empty dimension list is a scalar. Shapes are immutable once created
/// and provide the stride, broadcasting and axis arithmetic the kernels and
/// shape inference share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// A shape with the given dimensions, outermost first.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![1, 8, 4, 4]);
    /// assert_eq!(s.rank(), 4);
    /// assert_eq!(s.num_elements(), 128);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn scalar() -> Self {
        Self::new(Vec::new())
    }

    pub fn vector(len: usize) -> Self {
        Self::new(vec![len])
    }

    /// `[rows, cols]`; threshold tensors use this layout.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self::new(vec![rows, cols])
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of all dimensions; 1 for a scalar.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Bytes needed to hold this many elements of `dtype`.
    pub fn size_bytes(&self, dtype: super::DType) -> usize {
        self.num_elements() * dtype.size_bytes()
    }

    /// Row-major element strides.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.rank()];
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Returns the numpy-style broadcast of two shapes, or `None` when they
    /// are incompatible.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        let rank = self.rank().max(other.rank());
        let mut dims = vec![0usize; rank];
        for (i, out) in dims.iter_mut().enumerate() {
            let a = self.aligned_dim(i, rank);
            let b = other.aligned_dim(i, rank);
            *out = match (a, b) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => return None,
            };
        }
        Some(Shape::new(dims))
    }

    /// Dimension `i` of this shape when right-aligned into `rank` dimensions;
    /// missing leading dimensions read as 1.
    pub fn aligned_dim(&self, i: usize, rank: usize) -> usize {
        let offset = rank - self.rank();
        if i < offset {
            1
        } else {
            self.dims[i - offset]
        }
    }

    /// Resolves a possibly negative axis against this shape's rank.
    pub fn normalize_axis(&self, axis: i64) -> Option<usize> {
        let rank = self.rank() as i64;
        let resolved = if axis < 0 { axis + rank } else { axis };
        (0..rank).contains(&resolved).then_some(resolved as usize)
    }

    /// Output shape of `self @ other`, where `self` is `[..., M, K]` or `[K]`
    /// and `other` is a `[K, N]` weight matrix.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        if self.rank() == 0 || other.rank() != 2 {
            return None;
        }
        let k = self.dims[self.rank() - 1];
        if k != other.dims[0] {
            return None;
        }
        let mut dims = self.dims[..self.rank() - 1].to_vec();
        dims.push(other.dims[1]);
        Some(Shape::new(dims))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_scalar_is_one_element() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
        assert!(s.strides().is_empty());
        assert_eq!(s.to_string(), "[]");
    }

    #[test]
    fn test_feature_map_strides() {
        let s = Shape::new(vec![1, 8, 4, 4]);
        assert_eq!(s.strides(), vec![128, 16, 4, 1]);
        assert_eq!(Shape::vector(5).strides(), vec![1]);
        assert_eq!(Shape::matrix(3, 15).strides(), vec![15, 1]);
    }

    #[test]
    fn test_broadcast_result() {
        let a = Shape::new(vec![2, 1, 3]);
        let b = Shape::new(vec![4, 1]);
        assert_eq!(a.broadcast(&b), Some(Shape::new(vec![2, 4, 3])));
        assert_eq!(Shape::scalar().broadcast(&b), Some(b.clone()));
        assert_eq!(Shape::vector(3).broadcast(&Shape::vector(2)), None);
    }

    #[test]
    fn test_per_channel_parameter_broadcasts() {
        let data = Shape::new(vec![1, 8, 4, 4]);
        let scale = Shape::new(vec![1, 8, 1, 1]);
        assert_eq!(data.broadcast(&scale).as_ref(), Some(&data));
        assert!(data.broadcast(&Shape::vector(8)).is_none());
        assert_eq!(scale.aligned_dim(1, 4), 8);
        assert_eq!(Shape::vector(8).aligned_dim(0, 4), 1);
    }

    #[test]
    fn test_normalize_axis() {
        let s = Shape::new(vec![1, 8, 4, 4]);
        assert_eq!(s.normalize_axis(1), Some(1));
        assert_eq!(s.normalize_axis(-1), Some(3));
        assert_eq!(s.normalize_axis(4), None);
        assert_eq!(Shape::scalar().normalize_axis(0), None);
    }

    #[test]
    fn test_matmul_shape() {
        let b = Shape::matrix(4, 5);
        assert_eq!(Shape::matrix(3, 4).matmul(&b), Some(Shape::matrix(3, 5)));
        assert_eq!(Shape::new(vec![2, 3, 4]).matmul(&b), Some(Shape::new(vec![2, 3, 5])));
        assert_eq!(Shape::vector(4).matmul(&b), Some(Shape::vector(5)));
        assert_eq!(Shape::matrix(5, 5).matmul(&b), None);
        assert_eq!(Shape::scalar().matmul(&b), None);
    }

    #[test]
    fn test_size_bytes_by_dtype() {
        let s = Shape::matrix(10, 20);
        assert_eq!(s.size_bytes(DType::F64), 1600);
        assert_eq!(s.size_bytes(DType::F16), 400);
        assert_eq!(s.size_bytes(DType::U1), 200);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let s: Shape = vec![2, 3].into();
        assert_eq!(s.to_string(), "[2, 3]");
        assert_eq!(serde_json::to_string(&s).unwrap(), "[2,3]");
    }
}
