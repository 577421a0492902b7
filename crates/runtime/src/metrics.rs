// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Interpreter profiling metrics.
//!
//! [`ExecutionMetrics`] collects per-node timing and the memory held by
//! intermediate tensors over one run.

use std::time::Duration;

/// Metrics for a single node evaluation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeMetrics {
    pub node_name: String,
    pub op: String,
    /// Time spent in the operator's kernel.
    pub duration: Duration,
    /// Bytes produced by the node, in the outputs' declared dtypes.
    pub output_bytes: usize,
}

/// Aggregate metrics for one interpreter run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutionMetrics {
    /// Total wall-clock time for the run.
    pub total_duration: Duration,
    /// Sum of per-node kernel time.
    pub total_compute_duration: Duration,
    /// Largest number of bytes held by intermediate tensors at once.
    pub peak_live_bytes: usize,
    /// Intermediate tensors dropped after their last consumer.
    pub released_tensors: usize,
    /// Per-node metrics in execution order.
    pub node_metrics: Vec<NodeMetrics>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one node evaluation.
    pub fn record_node(&mut self, name: String, op: String, duration: Duration, output_bytes: usize) {
        self.total_compute_duration += duration;
        self.node_metrics.push(NodeMetrics {
            node_name: name,
            op,
            duration,
            output_bytes,
        });
    }

    /// Updates the peak with the current live-byte count.
    pub fn observe_live_bytes(&mut self, live: usize) {
        self.peak_live_bytes = self.peak_live_bytes.max(live);
    }

    /// Finalises metrics with the total wall-clock time.
    pub fn finalise(&mut self, total: Duration) {
        self.total_duration = total;
    }

    /// The node that took the longest, if any ran.
    pub fn slowest_node(&self) -> Option<&NodeMetrics> {
        self.node_metrics.iter().max_by_key(|m| m.duration)
    }

    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_live_bytes as f64 / 1024.0;
        format!(
            "Execution: {:.3}ms total, {} nodes, {:.3}ms compute, peak {:.1} KB live, {} tensors released",
            self.total_duration.as_secs_f64() * 1000.0,
            self.node_metrics.len(),
            self.total_compute_duration.as_secs_f64() * 1000.0,
            peak_kb,
            self.released_tensors,
        )
    }
}
