// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The graph intermediate representation for quantized models.
//!
//! - [`Graph`]: owns nodes, initializers, value infos and the graph I/O
//!   lists, and enforces the structural invariants (unique producers, no
//!   dangling references, acyclic).
//! - [`Node`]: one operation, referring to tensors by name.
//! - [`OpKind`]: the closed operator vocabulary.
//! - [`Attribute`]: typed attribute values.
//! - [`quant`]: attribute schemas of the quantizers and `MultiThreshold`.
//!
//! # Example
//! ```
//! use model_ir::{Graph, Node, OpKind, ValueInfo};
//! use tensor_core::{DType, Shape};
//!
//! let mut graph = Graph::new("tiny");
//! graph.add_input("x", ValueInfo::new(DType::F32, Shape::vector(4))).unwrap();
//! graph
//!     .add_node(Node::new("act", OpKind::Relu).with_inputs(["x"]).with_outputs(["y"]))
//!     .unwrap();
//! graph.add_output("y").unwrap();
//! graph.validate().unwrap();
//! println!("{}", graph.summary());
//! ```

mod attribute;
mod error;
pub mod graph;
mod interchange;
mod node;
mod op;
pub mod quant;

pub use attribute::Attribute;
pub use error::ModelError;
pub use graph::{Graph, ValueInfo};
pub use node::Node;
pub use op::OpKind;
