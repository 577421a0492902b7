// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quant → MultiThreshold lowering.
//!
//! Every reachable `Quant`, `BipolarQuant` and `Trunc` node is replaced by a
//! `MultiThreshold` node that keeps its name, data input and output name
//! and reads a freshly synthesized `<node>_thresholds` initializer.
//!
//! ```text
//! x ─Quant(s, z, b)─▶ y        x ─MultiThreshold(<node>_thresholds)─▶ y
//!                        ⇒         out_scale = s, out_bias = qmin·s − z·s
//! ```
//!
//! A `Trunc` whose only input is a matching `Quant` is folded into that
//! quantizer's thresholds. Per-channel parameters produce per-channel
//! threshold rows; their scale and offset cannot be carried by the scalar
//! `out_scale` / `out_bias` attributes, so they are applied by a trailing
//! `Sub` / `Mul` pair over constants.
//!
//! The rewrite is transactional: it runs on a copy, re-infers every type,
//! and returns an error (leaving the input untouched) if any rewritten
//! output changed dtype or shape.

mod descriptor;
mod step;

use crate::{ConvertConfig, GraphPass, PassError, RewriteError};
use descriptor::QuantDescriptor;
use model_ir::quant::ThresholdAttrs;
use model_ir::{Graph, Node, OpKind};
use std::collections::HashSet;
use tensor_core::ops::real_dtype;
use tensor_core::{Shape, Tensor};

/// What a conversion did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Names of the quantizer nodes now carried by `MultiThreshold` nodes.
    pub converted: Vec<String>,
    /// `Trunc` nodes folded into the quantizer that feeds them.
    pub folded: Vec<String>,
    /// Quantizers left alone because they do not reach a graph output.
    pub skipped: Vec<String>,
}

/// Converts with the default [`ConvertConfig`].
pub fn convert(graph: &Graph) -> Result<Graph, RewriteError> {
    convert_with(graph, &ConvertConfig::default())
}

pub fn convert_with(graph: &Graph, config: &ConvertConfig) -> Result<Graph, RewriteError> {
    convert_with_report(graph, config).map(|(g, _)| g)
}

/// Converts every reachable quantizer. A graph with none is returned
/// unchanged.
#[tracing::instrument(skip_all, fields(graph = %graph.name))]
pub fn convert_with_report(graph: &Graph, config: &ConvertConfig) -> Result<(Graph, ConversionReport), RewriteError> {
    graph.validate()?;
    let mut report = ConversionReport::default();
    if !graph.nodes().iter().any(|n| n.op.is_quantizer()) {
        tracing::debug!("no quantizers to convert");
        return Ok((graph.clone(), report));
    }

    let typed = runtime::infer_shapes(graph)?;
    let live = typed.live_indices();
    let mut plans: Vec<QuantDescriptor> = Vec::new();
    let mut folded: HashSet<String> = HashSet::new();

    for idx in typed.topo_indices()? {
        let node = &typed.nodes()[idx];
        if !node.op.is_quantizer() || folded.contains(&node.name) {
            continue;
        }
        if !live.contains(&idx) {
            tracing::debug!(node = %node.name, "quantizer does not reach an output; skipped");
            report.skipped.push(node.name.clone());
            continue;
        }
        let desc = QuantDescriptor::parse(&typed, node, config.max_bit_width)?;
        let desc = match config.fold_trunc.then(|| foldable_trunc(&typed, &desc, config)).flatten() {
            Some(merged) => {
                let trunc = merged.replaced[1].clone();
                tracing::debug!(node = %desc.node, trunc = %trunc, "folding trunc into quantizer");
                folded.insert(trunc.clone());
                report.folded.push(trunc);
                merged
            }
            None => desc,
        };
        plans.push(desc);
    }
    if plans.is_empty() {
        return Ok((graph.clone(), report));
    }

    let mut work = typed.clone();
    for desc in &plans {
        splice(&mut work, desc)?;
        report.converted.push(desc.node.clone());
    }

    let rewritten = runtime::infer_shapes(&work)?;
    for desc in &plans {
        check_type_preserved(&typed, &rewritten, &desc.node, &desc.output)?;
    }
    for output in graph.outputs() {
        check_type_preserved(&typed, &rewritten, "<graph>", output)?;
    }

    tracing::info!(
        converted = report.converted.len(),
        folded = report.folded.len(),
        "quantizers lowered to thresholds"
    );
    Ok((rewritten, report))
}

/// The merged descriptor when `desc` is a `Quant` read only by a `Trunc`
/// with the same parameters.
fn foldable_trunc(graph: &Graph, desc: &QuantDescriptor, config: &ConvertConfig) -> Option<QuantDescriptor> {
    if !desc.is_quant() || graph.is_output(&desc.output) {
        return None;
    }
    let consumers = graph.consumers(&desc.output);
    let [consumer] = consumers.as_slice() else {
        return None;
    };
    let reads_once = consumer.inputs.iter().filter(|i| **i == desc.output).count() == 1;
    if consumer.op != OpKind::Trunc || consumer.inputs.first() != Some(&desc.output) || !reads_once {
        return None;
    }
    let trunc = QuantDescriptor::parse(graph, consumer, config.max_bit_width).ok()?;
    desc.fold(&trunc)
}

fn check_type_preserved(before: &Graph, after: &Graph, node: &str, tensor: &str) -> Result<(), RewriteError> {
    let (old, new) = (before.value_info(tensor), after.value_info(tensor));
    if old != new {
        return Err(RewriteError::RewriteInvariant {
            node: node.to_string(),
            tensor: tensor.to_string(),
            detail: format!(
                "type changed from {} to {}",
                old.unwrap_or_default(),
                new.unwrap_or_default()
            ),
        });
    }
    Ok(())
}

/// A name not yet used by any tensor or node.
fn fresh_name(graph: &Graph, base: &str) -> String {
    let taken = |n: &str| graph.has_tensor(n) || graph.get_node(n).is_some();
    let mut candidate = base.to_string();
    let mut i = 1;
    while taken(&candidate) {
        candidate = format!("{base}_{i}");
        i += 1;
    }
    candidate
}

/// Replaces the nodes of `desc` by their threshold form.
fn splice(work: &mut Graph, desc: &QuantDescriptor) -> Result<(), RewriteError> {
    let rows = desc.thresholds()?;
    let steps = rows.first().map_or(0, Vec::len);
    let thresholds_name = fresh_name(work, &format!("{}_thresholds", desc.node));
    let thresholds = Tensor::new(
        Shape::matrix(rows.len(), steps),
        desc.threshold_dtype(),
        rows.concat(),
    )
    .map_err(|e| RewriteError::RewriteInvariant {
        node: desc.node.clone(),
        tensor: thresholds_name.clone(),
        detail: e.to_string(),
    })?;
    work.add_initializer(thresholds_name.clone(), thresholds)?;

    let replaced: Vec<&str> = desc.replaced.iter().map(String::as_str).collect();
    let levels = Some(desc.level_type());

    let Some(axis) = desc.axis else {
        let (factor, offset) = desc.rescale(0);
        let attrs = ThresholdAttrs {
            out_scale: factor,
            out_bias: desc.level_min() * factor - offset * factor,
            out_dtype: levels,
            ..Default::default()
        };
        let mut mt = Node::new(desc.node.clone(), OpKind::MultiThreshold)
            .with_inputs([desc.data.as_str(), thresholds_name.as_str()])
            .with_outputs([desc.output.as_str()]);
        attrs.apply(&mut mt);
        tracing::debug!(node = %desc.node, thresholds = steps, "converted to MultiThreshold");
        work.splice_nodes(&replaced, vec![mt])?;
        return Ok(());
    };

    // Per-channel: integer levels, then `(level - offset) * factor`.
    let attrs = ThresholdAttrs {
        out_scale: 1.0,
        out_bias: desc.level_min(),
        out_dtype: levels,
        channel_axis: axis as i64,
    };
    let channels = desc.channels();
    let (factors, offsets): (Vec<f64>, Vec<f64>) = (0..channels).map(|c| desc.rescale(c)).unzip();
    let const_dtype = real_dtype(desc.data_dtype);
    let constant = |values: Vec<f64>| -> Result<Tensor, RewriteError> {
        Tensor::new(desc.param_shape.clone(), const_dtype, values).map_err(|e| RewriteError::RewriteInvariant {
            node: desc.node.clone(),
            tensor: desc.output.clone(),
            detail: e.to_string(),
        })
    };

    let levels_name = fresh_name(work, &format!("{}_levels", desc.node));
    let mut mt = Node::new(desc.node.clone(), OpKind::MultiThreshold)
        .with_inputs([desc.data.as_str(), thresholds_name.as_str()])
        .with_outputs([levels_name.as_str()]);
    attrs.apply(&mut mt);
    let mut nodes = vec![mt];

    let mut scaled_input = levels_name;
    if offsets.iter().any(|o| *o != 0.0) {
        let offset_name = fresh_name(work, &format!("{}_offset", desc.node));
        work.add_initializer(offset_name.clone(), constant(offsets)?)?;
        let centered = fresh_name(work, &format!("{}_centered", desc.node));
        nodes.push(
            Node::new(fresh_name(work, &format!("{}_sub_offset", desc.node)), OpKind::Sub)
                .with_inputs([scaled_input.as_str(), offset_name.as_str()])
                .with_outputs([centered.as_str()]),
        );
        scaled_input = centered;
    }
    let factor_name = fresh_name(work, &format!("{}_factor", desc.node));
    work.add_initializer(factor_name.clone(), constant(factors)?)?;
    nodes.push(
        Node::new(fresh_name(work, &format!("{}_rescale", desc.node)), OpKind::Mul)
            .with_inputs([scaled_input.as_str(), factor_name.as_str()])
            .with_outputs([desc.output.as_str()]),
    );

    tracing::debug!(node = %desc.node, channels, thresholds = steps, axis, "converted to per-channel MultiThreshold");
    work.splice_nodes(&replaced, nodes)?;
    Ok(())
}

/// [`convert_with`] as a pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct ConvertQuantToThreshold {
    config: ConvertConfig,
}

impl ConvertQuantToThreshold {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }
}

impl GraphPass for ConvertQuantToThreshold {
    fn name(&self) -> &str {
        "convert-quant-to-threshold"
    }

    fn run(&self, graph: &Graph) -> Result<Graph, PassError> {
        Ok(convert_with(graph, &self.config)?)
    }
}
