// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cleanup passes run before and after lowering.

pub mod canonical_names;
pub mod dead_nodes;
pub mod fold_constants;
pub mod infer_shapes;

pub use canonical_names::CanonicalizeNames;
pub use dead_nodes::EliminateDeadNodes;
pub use fold_constants::FoldConstants;
pub use infer_shapes::InferShapes;
