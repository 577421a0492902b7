// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! End-to-end lowering with numerical verification.
//!
//! [`lower`] runs the whole flow on one set of input bindings:
//!
//! ```text
//! graph ─cleanup─▶ cleaned ─execute─▶ baseline
//!                     │
//!                  convert ─cleanup─▶ lowered ─execute─▶ outputs ─compare─▶ report
//! ```
//!
//! The lowered outputs must match the baseline within
//! `|a - b| <= abs_tolerance + rel_tolerance * |a|` element-wise, and keep
//! their shapes.

use crate::convert::{convert_with_report, ConversionReport};
use crate::pipeline::PipelineReport;
use crate::{PassError, PipelineConfig, VerifyConfig};
use model_ir::Graph;
use runtime::{ExecutionMetrics, Interpreter, RuntimeConfig, TensorMap};
use std::time::{Duration, Instant};
use tensor_core::Tensor;

/// Largest deviation of one graph output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputComparison {
    pub name: String,
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
}

/// Wall-clock time of one lowering stage.
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: String,
    pub duration: Duration,
}

/// Everything [`lower`] produced.
#[derive(Debug, Clone)]
pub struct LoweringReport {
    /// Input graph after the first cleanup pipeline.
    pub cleaned: Graph,
    /// Converted graph after the second cleanup pipeline.
    pub lowered: Graph,
    /// Outputs of `cleaned`.
    pub baseline: TensorMap,
    /// Outputs of `lowered`.
    pub outputs: TensorMap,
    pub comparisons: Vec<OutputComparison>,
    pub timings: Vec<StageTiming>,
    pub conversion: ConversionReport,
    /// Interpreter metrics of the lowered run, when profiling is enabled.
    pub metrics: Option<ExecutionMetrics>,
}

impl LoweringReport {
    pub fn total_duration(&self) -> Duration {
        self.timings.iter().map(|t| t.duration).sum()
    }

    /// Largest relative deviation over every output.
    pub fn max_rel_diff(&self) -> f64 {
        self.comparisons.iter().map(|c| c.max_rel_diff).fold(0.0, f64::max)
    }

    /// Returns a human-readable one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "Lowering: {} → {} nodes, {} converted, {} folded, {} outputs within tolerance \
             (max rel diff {:e}), {:.3}ms",
            self.cleaned.nodes().len(),
            self.lowered.nodes().len(),
            self.conversion.converted.len(),
            self.conversion.folded.len(),
            self.comparisons.len(),
            self.max_rel_diff(),
            self.total_duration().as_secs_f64() * 1000.0
        )
    }
}

/// Cleans, converts and re-cleans `graph`, checking on `inputs` that the
/// lowered graph computes the same outputs.
#[tracing::instrument(skip_all, fields(graph = %graph.name))]
pub fn lower(graph: &Graph, inputs: &TensorMap, config: &PipelineConfig) -> Result<LoweringReport, PassError> {
    let pipeline = config.create_pipeline()?;
    let mut timings = Vec::new();

    let (cleaned, report) = pipeline.run_with_report(graph)?;
    push_stages(&mut timings, "cleanup", &report);

    let start = Instant::now();
    let (baseline, _) = run(&cleaned, inputs, &config.runtime)?;
    timings.push(StageTiming {
        stage: "baseline".into(),
        duration: start.elapsed(),
    });

    let start = Instant::now();
    let (converted, conversion) = convert_with_report(&cleaned, &config.convert)?;
    timings.push(StageTiming {
        stage: "convert".into(),
        duration: start.elapsed(),
    });

    let (lowered, report) = pipeline.run_with_report(&converted)?;
    push_stages(&mut timings, "post-cleanup", &report);

    let start = Instant::now();
    let (outputs, metrics) = run(&lowered, inputs, &config.runtime)?;
    timings.push(StageTiming {
        stage: "lowered".into(),
        duration: start.elapsed(),
    });

    let comparisons = compare_outputs(graph.outputs(), &baseline, &outputs, &config.verify)?;
    let report = LoweringReport {
        cleaned,
        lowered,
        baseline,
        outputs,
        comparisons,
        timings,
        conversion,
        metrics,
    };
    tracing::info!("{}", report.summary());
    Ok(report)
}

/// Executes both graphs on `inputs` and compares every output of
/// `reference` against the same-named output of `candidate`.
pub fn verify_equivalence(
    reference: &Graph,
    candidate: &Graph,
    inputs: &TensorMap,
    tolerance: &VerifyConfig,
) -> Result<Vec<OutputComparison>, PassError> {
    let config = RuntimeConfig::default();
    let (expected, _) = run(reference, inputs, &config)?;
    let (actual, _) = run(candidate, inputs, &config)?;
    compare_outputs(reference.outputs(), &expected, &actual, tolerance)
}

fn push_stages(timings: &mut Vec<StageTiming>, prefix: &str, report: &PipelineReport) {
    timings.extend(report.stages.iter().map(|s| StageTiming {
        stage: format!("{prefix}/{}", s.pass),
        duration: s.duration,
    }));
}

fn run(
    graph: &Graph,
    inputs: &TensorMap,
    config: &RuntimeConfig,
) -> Result<(TensorMap, Option<ExecutionMetrics>), PassError> {
    let interpreter = Interpreter::new(config.clone()).prepare(graph)?;
    let out = interpreter.run(inputs)?;
    Ok((out.outputs, out.metrics))
}

fn compare_outputs(
    names: &[String],
    expected: &TensorMap,
    actual: &TensorMap,
    tolerance: &VerifyConfig,
) -> Result<Vec<OutputComparison>, PassError> {
    let mut comparisons = Vec::with_capacity(names.len());
    for name in names {
        let missing = |side| PassError::MissingOutput {
            output: name.clone(),
            side,
        };
        let a = expected.get(name).ok_or_else(|| missing("reference"))?;
        let b = actual.get(name).ok_or_else(|| missing("candidate"))?;
        let comparison = compare(name, a, b, tolerance)?;
        tracing::debug!(
            output = %name,
            max_abs = comparison.max_abs_diff,
            max_rel = comparison.max_rel_diff,
            "output compared"
        );
        comparisons.push(comparison);
    }
    Ok(comparisons)
}

fn compare(name: &str, a: &Tensor, b: &Tensor, tolerance: &VerifyConfig) -> Result<OutputComparison, PassError> {
    if a.shape() != b.shape() {
        return Err(PassError::OutputShapeChanged {
            output: name.to_string(),
            reference: a.shape().clone(),
            candidate: b.shape().clone(),
        });
    }
    let (mut max_abs, mut max_rel, mut within) = (0.0f64, 0.0f64, true);
    for (&x, &y) in a.values().iter().zip(b.values()) {
        if x.is_nan() && y.is_nan() {
            continue;
        }
        let diff = if x == y { 0.0 } else { (x - y).abs() };
        let diff = if diff.is_nan() { f64::INFINITY } else { diff };
        let rel = if diff == 0.0 { 0.0 } else { diff / x.abs().max(f64::MIN_POSITIVE) };
        within &= diff <= tolerance.abs_tolerance + tolerance.rel_tolerance * x.abs();
        max_abs = max_abs.max(diff);
        max_rel = max_rel.max(rel);
    }
    if !within {
        return Err(PassError::NotEquivalent {
            output: name.to_string(),
            max_abs,
            max_rel,
        });
    }
    Ok(OutputComparison {
        name: name.to_string(),
        max_abs_diff: max_abs,
        max_rel_diff: max_rel,
    })
}
