// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Operator semantics for quantized computation graphs.
//!
//! The runtime provides:
//! - An operator [`registry`] mapping every supported [`model_ir::OpKind`]
//!   to an [`OpHandler`] with an inference rule and an evaluation rule.
//! - Static [`infer_shapes`], which fills in the dtype and shape of every
//!   tensor that reaches a graph output.
//! - A reference [`Interpreter`] used to check that graph rewrites preserve
//!   numeric behavior.
//!
//! # Type-State Pipeline
//! ```text
//! Interpreter<Idle> → Interpreter<Ready<'g>>
//! ```
//! Only a prepared interpreter can run, and a prepared interpreter borrows
//! its graph immutably, so it can be shared across threads.

mod config;
mod engine;
mod error;
mod handlers;
mod infer;
mod metrics;
mod registry;

pub use config::RuntimeConfig;
pub use engine::{execute, EngineState, ExecutionOutput, Idle, Interpreter, Ready, TensorMap};
pub use error::{ExecutionError, InferenceError, RuntimeError};
pub use infer::{infer_shapes, infer_shapes_with_report, InferenceReport};
pub use metrics::{ExecutionMetrics, NodeMetrics};
pub use registry::{registry, InferInput, OpHandler, Registry, TensorType};
