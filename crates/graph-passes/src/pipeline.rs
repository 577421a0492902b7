// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ordered pass pipelines.
//!
//! A [`Pipeline`] is data: a list of boxed [`GraphPass`]es applied in
//! order. After each stage the graph is checked against every structural
//! invariant, so a faulty pass is caught at the stage that broke it.

use crate::passes::{CanonicalizeNames, EliminateDeadNodes, FoldConstants, InferShapes};
use crate::{GraphPass, PassError};
use model_ir::Graph;
use std::time::{Duration, Instant};

/// Timing and size of one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub pass: String,
    pub duration: Duration,
    pub nodes_before: usize,
    pub nodes_after: usize,
}

/// What a pipeline run did, stage by stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|s| format!("{} {}→{}", s.pass, s.nodes_before, s.nodes_after))
            .collect();
        format!(
            "Pipeline: {} stages in {:.3}ms [{}]",
            self.stages.len(),
            self.total_duration().as_secs_f64() * 1000.0,
            stages.join(", ")
        )
    }
}

/// An ordered list of passes.
pub struct Pipeline {
    passes: Vec<Box<dyn GraphPass>>,
    validate_each_stage: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// An empty pipeline that validates after every stage.
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            validate_each_stage: true,
        }
    }

    /// The cleanup pipeline: fold constants, eliminate dead nodes,
    /// canonicalize names, infer shapes.
    pub fn cleanup() -> Self {
        Self::new()
            .with_pass(FoldConstants::new())
            .with_pass(EliminateDeadNodes::new())
            .with_pass(CanonicalizeNames::new())
            .with_pass(InferShapes::new())
    }

    pub fn with_pass(mut self, pass: impl GraphPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn push(&mut self, pass: Box<dyn GraphPass>) {
        self.passes.push(pass);
    }

    pub fn validate_each_stage(mut self, enabled: bool) -> Self {
        self.validate_each_stage = enabled;
        self
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every pass in order.
    pub fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        self.run_with_report(graph).map(|(g, _)| g)
    }

    /// Like [`run`](Self::run), also returning per-stage timings.
    #[tracing::instrument(skip_all, fields(graph = %graph.name, stages = self.passes.len()))]
    pub fn run_with_report(&self, graph: &Graph) -> Result<(Graph, PipelineReport), PassError> {
        graph.validate()?;
        let mut current = graph.clone();
        let mut report = PipelineReport::default();

        for pass in &self.passes {
            let start = Instant::now();
            let next = pass.run(&current)?;
            let duration = start.elapsed();
            if self.validate_each_stage {
                next.validate().map_err(|source| PassError::InvariantViolation {
                    pass: pass.name().to_string(),
                    source,
                })?;
            }
            tracing::debug!(
                pass = pass.name(),
                nodes_before = current.nodes().len(),
                nodes_after = next.nodes().len(),
                elapsed_us = duration.as_micros() as u64,
                "stage complete"
            );
            report.stages.push(StageReport {
                pass: pass.name().to_string(),
                duration,
                nodes_before: current.nodes().len(),
                nodes_after: next.nodes().len(),
            });
            current = next;
        }

        tracing::info!("{}", report.summary());
        Ok((current, report))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.pass_names())
            .field("validate_each_stage", &self.validate_each_stage)
            .finish()
    }
}

/// Runs the default cleanup pipeline.
pub fn run_pipeline(graph: &Graph) -> Result<Graph, PassError> {
    Pipeline::cleanup().run(graph)
}
