// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Dense tensors and the reference kernels behind the graph interpreter.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major tensor tagged with a [`DType`].
//! - [`Shape`]: dimension lists with broadcasting and matmul shape rules.
//! - [`DType`]: integer (1 to 64 bit, signed and unsigned) and float types.
//! - Kernels in [`ops`]: arithmetic, matmul, layout changes, fake
//!   quantization and multi-thresholding.
//!
//! # Design Goals
//! - Values are carried as `f64` and canonicalized to the declared dtype
//!   after every kernel, so results are reproducible bit for bit.
//! - Integer overflow is reported, never wrapped.
//! - Clean error types via `thiserror`.

mod dtype;
mod error;
pub mod ops;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::Tensor;
