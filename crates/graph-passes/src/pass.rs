// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`GraphPass`] trait.

use crate::PassError;
use model_ir::Graph;

/// A whole-graph transformation.
///
/// Passes are pure: they read the input graph and return a new one, so a
/// failing pass never leaves a half-rewritten graph behind. Every pass is
/// expected to be idempotent (running it on its own output changes
/// nothing).
pub trait GraphPass: Send + Sync {
    /// Human-readable name of this pass, as used in configuration files.
    fn name(&self) -> &str;

    /// Produces the transformed graph.
    fn run(&self, graph: &Graph) -> Result<Graph, PassError>;
}
