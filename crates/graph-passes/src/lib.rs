// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-passes
//!
//! Graph-to-graph transformations for quantized models.
//!
//! - [`convert`]: replaces `Quant` / `BipolarQuant` / `Trunc` nodes with
//!   bit-exact `MultiThreshold` nodes.
//! - [`Pipeline`]: an ordered list of [`GraphPass`]es, validated after
//!   every stage; [`run_pipeline`] runs the default cleanup.
//! - [`lower`]: cleanup, convert, cleanup, then checks on real inputs that
//!   the lowered graph still computes the same outputs.
//!
//! Every transform takes `&Graph` and returns a new graph; the input is
//! never modified, even on error.
//!
//! # Example
//! ```
//! use graph_passes::{convert, run_pipeline};
//! use model_ir::{Graph, Node, OpKind, ValueInfo};
//! use tensor_core::{DType, Shape, Tensor};
//!
//! let mut graph = Graph::new("binarize");
//! graph.add_input("x", ValueInfo::new(DType::F32, Shape::vector(3))).unwrap();
//! graph.add_initializer("s", Tensor::scalar_f32(0.5)).unwrap();
//! graph
//!     .add_node(Node::new("bq", OpKind::BipolarQuant).with_inputs(["x", "s"]).with_outputs(["y"]))
//!     .unwrap();
//! graph.add_output("y").unwrap();
//!
//! let lowered = run_pipeline(&convert(&graph).unwrap()).unwrap();
//! assert_eq!(lowered.get_node("bq").unwrap().op, OpKind::MultiThreshold);
//! ```

mod config;
pub mod convert;
mod error;
mod pass;
pub mod passes;
mod pipeline;
mod verify;

pub use config::{ConvertConfig, PipelineConfig, VerifyConfig};
pub use convert::{convert, convert_with, convert_with_report, ConversionReport, ConvertQuantToThreshold};
pub use error::{PassError, RewriteError};
pub use pass::GraphPass;
pub use pipeline::{run_pipeline, Pipeline, PipelineReport, StageReport};
pub use verify::{lower, verify_equivalence, LoweringReport, OutputComparison, StageTiming};
