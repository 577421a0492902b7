// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type.

use crate::{DType, Shape, TensorError};

/// An owned, n-dimensional tensor stored in contiguous memory.
///
/// `Tensor` is the data carrier for initializers, graph inputs and every
/// intermediate value the interpreter produces. It always owns its buffer,
/// so two graphs never alias each other's constants.
///
/// # Memory Layout
/// Values are stored in row-major (C) order as `f64`, tagged with the
/// declared [`DType`]. Every constructor and kernel passes results through
/// [`DType::canonicalize`], so a `F32` tensor only ever holds values that are
/// exactly representable as `f32`, and an integer tensor only holds
/// in-range integers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "TensorRepr")]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    data: Vec<f64>,
}

/// Unchecked wire form; deserialization goes through [`Tensor::new`].
#[derive(serde::Deserialize)]
struct TensorRepr {
    shape: Shape,
    dtype: DType,
    data: Vec<f64>,
}

impl TryFrom<TensorRepr> for Tensor {
    type Error = TensorError;

    fn try_from(repr: TensorRepr) -> Result<Self, Self::Error> {
        Tensor::new(repr.shape, repr.dtype, repr.data)
    }
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    /// assert_eq!(t.size_bytes(), 24); // 2 * 3 * 4 bytes
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            dtype,
            data: vec![0.0; n],
        }
    }

    /// Creates a tensor from values, canonicalizing each one to `dtype`.
    ///
    /// Returns an error if the value count does not match the shape, or if a
    /// value cannot be represented in an integer `dtype`.
    pub fn new(shape: Shape, dtype: DType, values: Vec<f64>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if values.len() != expected {
            return Err(TensorError::ElementCountMismatch {
                expected,
                actual: values.len(),
            });
        }
        let data = values
            .into_iter()
            .map(|v| dtype.canonicalize("tensor", v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { shape, dtype, data })
    }

    /// Creates a tensor from a slice of `f32` values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.to_f32_vec(), vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        Self::new(shape, DType::F32, values.iter().map(|&v| v as f64).collect())
    }

    /// Creates a `F64` tensor from a slice of `f64` values.
    pub fn from_f64(shape: Shape, values: &[f64]) -> Result<Self, TensorError> {
        Self::new(shape, DType::F64, values.to_vec())
    }

    /// Creates an integer tensor of the given `dtype`.
    pub fn from_i64(shape: Shape, dtype: DType, values: &[i64]) -> Result<Self, TensorError> {
        Self::new(shape, dtype, values.iter().map(|&v| v as f64).collect())
    }

    /// Creates a rank-0 `F32` tensor.
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            shape: Shape::scalar(),
            dtype: DType::F32,
            data: vec![value as f64],
        }
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the element values in row-major order.
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Consumes the tensor and returns its element values.
    pub fn into_values(self) -> Vec<f64> {
        self.data
    }

    /// Returns the number of elements.
    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// Returns the memory footprint of this tensor in its declared dtype.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// Copies the values out as `f32`.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }

    /// Returns the single value of a one-element tensor (any rank).
    pub fn scalar_value(&self) -> Option<f64> {
        match self.data.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Returns the element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.rank() {
            return None;
        }
        let mut offset = 0;
        for ((&i, &d), s) in index
            .iter()
            .zip(self.shape.dims())
            .zip(self.shape.strides())
        {
            if i >= d {
                return None;
            }
            offset += i * s;
        }
        self.data.get(offset).copied()
    }

    /// Returns a copy with a new shape holding the same number of elements.
    pub fn reshaped(&self, shape: Shape) -> Result<Self, TensorError> {
        if shape.num_elements() != self.data.len() {
            return Err(TensorError::ShapeMismatch {
                op: "reshape",
                lhs: self.shape.clone(),
                rhs: shape,
            });
        }
        Ok(Self {
            shape,
            dtype: self.dtype,
            data: self.data.clone(),
        })
    }

    /// Returns `true` when every value is integral (used to validate
    /// zero-points and reshape targets).
    pub fn is_integral(&self) -> bool {
        self.data.iter().all(|v| v.fract() == 0.0)
    }

    /// Largest absolute elementwise difference to `other`, or `None` when
    /// shapes differ. NaN on either side counts as infinitely different
    /// unless both are NaN.
    pub fn max_abs_diff(&self, other: &Tensor) -> Option<f64> {
        if self.shape != other.shape {
            return None;
        }
        let diff = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| match (a.is_nan(), b.is_nan()) {
                (true, true) => 0.0,
                (false, false) if a == b => 0.0,
                (false, false) => (a - b).abs(),
                _ => f64::INFINITY,
            })
            .fold(0.0f64, f64::max);
        Some(diff)
    }

    /// Builds a tensor from already-computed values, canonicalizing them to
    /// `dtype` and attributing any failure to `op`.
    pub(crate) fn from_computed(
        op: &'static str,
        shape: Shape,
        dtype: DType,
        values: Vec<f64>,
    ) -> Result<Self, TensorError> {
        debug_assert_eq!(shape.num_elements(), values.len());
        let data = values
            .into_iter()
            .map(|v| dtype.canonicalize(op, v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { shape, dtype, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
        assert_eq!(t.size_bytes(), 24);
        assert_eq!(t.shape(), &Shape::matrix(2, 3));
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.values().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_f32() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let t = Tensor::from_f32(Shape::matrix(2, 3), &data).unwrap();
        assert_eq!(t.to_f32_vec(), data);
    }

    #[test]
    fn test_new_count_mismatch() {
        let result = Tensor::new(Shape::matrix(2, 3), DType::F32, vec![0.0; 5]);
        assert!(matches!(
            result,
            Err(TensorError::ElementCountMismatch { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_new_rounds_to_dtype() {
        let t = Tensor::new(Shape::vector(1), DType::F32, vec![0.1]).unwrap();
        assert_eq!(t.values()[0], 0.1f32 as f64);
    }

    #[test]
    fn test_int_out_of_range_rejected() {
        let result = Tensor::from_i64(Shape::vector(2), DType::I8, &[1, 200]);
        assert!(result.unwrap_err().is_overflow());
    }

    #[test]
    fn test_get_index() {
        let t = Tensor::from_f32(Shape::matrix(2, 3), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(5.0));
        assert_eq!(t.get(&[0, 1]), Some(1.0));
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0]), None);
    }

    #[test]
    fn test_scalar_value() {
        assert_eq!(Tensor::scalar_f32(2.5).scalar_value(), Some(2.5));
        let one = Tensor::from_f32(Shape::new(vec![1, 1]), &[4.0]).unwrap();
        assert_eq!(one.scalar_value(), Some(4.0));
        let many = Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap();
        assert_eq!(many.scalar_value(), None);
    }

    #[test]
    fn test_is_integral() {
        assert!(Tensor::from_f32(Shape::vector(3), &[-2.0, 0.0, 7.0]).unwrap().is_integral());
        assert!(!Tensor::from_f32(Shape::vector(2), &[1.0, 0.5]).unwrap().is_integral());
        assert!(!Tensor::scalar_f32(f32::NAN).is_integral());
    }

    #[test]
    fn test_reshaped() {
        let t = Tensor::from_f32(Shape::vector(6), &[1.0; 6]).unwrap();
        assert_eq!(t.reshaped(Shape::matrix(2, 3)).unwrap().shape(), &Shape::matrix(2, 3));
        assert!(t.reshaped(Shape::matrix(4, 2)).is_err());
    }

    #[test]
    fn test_max_abs_diff() {
        let a = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
        let b = Tensor::from_f32(Shape::vector(3), &[1.0, 2.5, 3.0]).unwrap();
        assert_eq!(a.max_abs_diff(&b), Some(0.5));
        let c = Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap();
        assert_eq!(a.max_abs_diff(&c), None);
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = Tensor::from_i64(Shape::vector(3), DType::I8, &[-1, 0, 7]).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_deserialize_rejects_bad_count() {
        let json = r#"{"shape":[2],"dtype":"f32","data":[1.0]}"#;
        assert!(serde_json::from_str::<Tensor>(json).is_err());
    }
}
