// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantizer descriptors: everything the rewrite needs to know about one
//! `Quant`, `BipolarQuant` or `Trunc` node, read from a type-inferred graph.

use super::step;
use crate::RewriteError;
use model_ir::quant::{LevelType, QuantAttrs};
use model_ir::{Graph, Node, OpKind};
use tensor_core::ops::{self, IntRange, RoundingMode, TruncSpec};
use tensor_core::{DType, Shape, Tensor};

/// The scalar level function of a quantizer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Quantizer {
    Quant { range: IntRange, rounding: RoundingMode },
    /// Levels `0` (negative) and `1` (non-negative), mapped onto `∓s`.
    Bipolar,
    Trunc(TruncSpec),
    /// A `Quant` whose only reader is a matching `Trunc`. `dtype` is the
    /// dtype of the intermediate tensor between them.
    QuantTrunc {
        range: IntRange,
        rounding: RoundingMode,
        trunc: TruncSpec,
        dtype: DType,
    },
}

/// How a quantizer parameter lines up with the data tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// All zeros: compatible with any granularity.
    Zero,
    PerTensor,
    /// One value per index of data axis `axis`.
    PerChannel { axis: usize, channels: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct QuantDescriptor {
    /// Name of the anchor node (kept by the rewritten node).
    pub node: String,
    /// Nodes replaced by the rewrite: the anchor, plus a folded `Trunc`.
    pub replaced: Vec<String>,
    pub data: String,
    pub output: String,
    pub data_dtype: DType,
    pub quantizer: Quantizer,
    /// Per-channel (or single) scale values.
    pub scale: Vec<f64>,
    /// Per-channel (or single) zero-points.
    pub zero_point: Vec<f64>,
    /// Data axis the parameters vary along, if any.
    pub axis: Option<usize>,
    /// Shape of the scale tensor, reused for per-channel rescale constants.
    pub param_shape: Shape,
}

impl QuantDescriptor {
    /// Reads a quantizer node. `graph` must have inferred value info for the
    /// node's data input.
    pub fn parse(graph: &Graph, node: &Node, max_bit_width: u32) -> Result<Self, RewriteError> {
        let unsupported = |detail: String| RewriteError::unsupported(&node.name, detail);
        let arity = match node.op {
            OpKind::Quant => 4,
            OpKind::BipolarQuant => 2,
            OpKind::Trunc => 5,
            _ => return Err(unsupported(format!("{} is not a quantizer", node.op))),
        };
        if node.inputs.len() != arity || node.outputs.len() != 1 {
            return Err(unsupported(format!(
                "{} expects {arity} inputs and 1 output, got {} and {}",
                node.op,
                node.inputs.len(),
                node.outputs.len()
            )));
        }

        let data = node.inputs[0].clone();
        let info = graph.value_info(&data).unwrap_or_default();
        let (Some(data_dtype), Some(data_shape)) = (info.dtype, info.shape) else {
            return Err(unsupported(format!("data input '{data}' has no inferred type")));
        };
        let scale = constant(graph, node, 1, "scale")?;
        if let Some(bad) = scale.values().iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(unsupported(format!("scale must be finite and positive, got {bad}")));
        }
        let zero_point = match node.op {
            OpKind::BipolarQuant => None,
            _ => Some(constant(graph, node, 2, "zero-point")?),
        };
        // A fractional zero-point splits levels off the integer grid.
        if let Some(z) = zero_point.filter(|z| !z.is_integral()) {
            return Err(unsupported(format!(
                "zero-point must hold whole numbers, got {:?}",
                z.values()
            )));
        }
        for param in std::iter::once(scale).chain(zero_point) {
            if data_shape.broadcast(param.shape()).as_ref() != Some(&data_shape) {
                return Err(unsupported(format!(
                    "parameter of shape {} does not broadcast into data of shape {data_shape}",
                    param.shape()
                )));
            }
        }

        let attrs = match node.op {
            OpKind::BipolarQuant => None,
            _ => Some(QuantAttrs::from_node(node).map_err(|e| unsupported(e.to_string()))?),
        };
        let range = |index: usize, role: &str, signed: bool| -> Result<IntRange, RewriteError> {
            let bits = bit_width(constant(graph, node, index, role)?, max_bit_width).map_err(&unsupported)?;
            IntRange::new(bits, signed).map_err(|e| unsupported(e.to_string()))
        };
        let quantizer = match (node.op.clone(), attrs) {
            (OpKind::Quant, Some(a)) => Quantizer::Quant {
                range: range(3, "bit-width", a.signed)?,
                rounding: a.rounding,
            },
            (OpKind::Trunc, Some(a)) => Quantizer::Trunc(
                TruncSpec::new(
                    range(3, "input bit-width", a.signed)?,
                    range(4, "output bit-width", a.signed)?,
                    a.rounding,
                )
                .map_err(|e| unsupported(e.to_string()))?,
            ),
            _ => Quantizer::Bipolar,
        };

        let scale_layout = layout(scale, &data_shape).map_err(&unsupported)?;
        let zero_layout = match zero_point {
            None => Layout::Zero,
            Some(z) if z.values().iter().all(|v| *v == 0.0) => Layout::Zero,
            Some(z) => layout(z, &data_shape).map_err(&unsupported)?,
        };
        let axis = match (scale_layout, zero_layout) {
            (Layout::PerTensor, Layout::Zero | Layout::PerTensor) => None,
            (Layout::PerChannel { axis, .. }, Layout::Zero) => Some(axis),
            (Layout::PerChannel { axis, channels }, Layout::PerChannel { axis: za, channels: zc })
                if axis == za && channels == zc =>
            {
                Some(axis)
            }
            (s, z) => {
                return Err(unsupported(format!(
                    "scale and zero-point granularity differ ({s:?} vs {z:?})"
                )))
            }
        };
        let zero_values = match (zero_point, zero_layout) {
            (Some(z), Layout::PerTensor | Layout::PerChannel { .. }) => z.values().to_vec(),
            _ => vec![0.0],
        };

        Ok(Self {
            node: node.name.clone(),
            replaced: vec![node.name.clone()],
            data,
            output: node.outputs[0].clone(),
            data_dtype,
            quantizer,
            scale: scale.values().to_vec(),
            zero_point: zero_values,
            axis,
            param_shape: scale.shape().clone(),
        })
    }

    /// Number of threshold rows.
    pub fn channels(&self) -> usize {
        self.scale.len().max(self.zero_point.len())
    }

    fn scale_at(&self, c: usize) -> f64 {
        self.scale[if self.scale.len() == 1 { 0 } else { c }]
    }

    fn zero_point_at(&self, c: usize) -> f64 {
        self.zero_point[if self.zero_point.len() == 1 { 0 } else { c }]
    }

    pub fn is_quant(&self) -> bool {
        matches!(self.quantizer, Quantizer::Quant { .. })
    }

    /// Merges a `Trunc` reading this `Quant` into one descriptor, if both
    /// are per-tensor with identical parameters.
    pub fn fold(&self, trunc: &QuantDescriptor) -> Option<QuantDescriptor> {
        let (Quantizer::Quant { range, rounding }, Quantizer::Trunc(spec)) = (self.quantizer, trunc.quantizer) else {
            return None;
        };
        let matching = self.axis.is_none()
            && trunc.axis.is_none()
            && trunc.data == self.output
            && self.scale == trunc.scale
            && self.zero_point == trunc.zero_point
            && spec.input == range;
        if !matching {
            return None;
        }
        let mut replaced = self.replaced.clone();
        replaced.push(trunc.node.clone());
        Some(QuantDescriptor {
            replaced,
            output: trunc.output.clone(),
            quantizer: Quantizer::QuantTrunc {
                range,
                rounding,
                trunc: spec,
                dtype: ops::real_dtype(self.data_dtype),
            },
            ..self.clone()
        })
    }

    /// Inclusive level range searched by threshold synthesis.
    fn search_range(&self) -> (f64, f64) {
        match &self.quantizer {
            Quantizer::Quant { range, .. } => (range.min(), range.max()),
            Quantizer::Bipolar => (0.0, 1.0),
            Quantizer::Trunc(spec) | Quantizer::QuantTrunc { trunc: spec, .. } => {
                (spec.output.min(), spec.output.max())
            }
        }
    }

    /// Smallest output level, as emitted by the threshold node.
    pub fn level_min(&self) -> f64 {
        match self.quantizer {
            Quantizer::Bipolar => -1.0,
            _ => self.search_range().0,
        }
    }

    pub fn level_type(&self) -> LevelType {
        match &self.quantizer {
            Quantizer::Quant { range, .. } => LevelType::Int {
                bits: range.bits(),
                signed: range.signed(),
            },
            Quantizer::Bipolar => LevelType::Bipolar,
            Quantizer::Trunc(spec) | Quantizer::QuantTrunc { trunc: spec, .. } => LevelType::Int {
                bits: spec.output.bits(),
                signed: spec.output.signed(),
            },
        }
    }

    /// Level of `x` in channel `c`.
    fn level(&self, c: usize, x: f64) -> f64 {
        let (s, z) = (self.scale_at(c), self.zero_point_at(c));
        match &self.quantizer {
            Quantizer::Quant { range, rounding } => ops::quant_level(x, s, z, range, *rounding),
            Quantizer::Bipolar => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Quantizer::Trunc(spec) => spec.level_saturating(x, s, z),
            Quantizer::QuantTrunc {
                range,
                rounding,
                trunc,
                dtype,
            } => {
                let y = ops::dequantize(ops::quant_level(x, s, z, range, *rounding), s, z);
                let y = dtype.canonicalize("quant", y).unwrap_or(y);
                trunc.level_saturating(y, s, z)
            }
        }
    }

    /// Analytic position of the boundary to level `min + k` in channel `c`.
    fn estimate(&self, c: usize, k: u64) -> f64 {
        let (s, z) = (self.scale_at(c), self.zero_point_at(c));
        match &self.quantizer {
            Quantizer::Quant { range, rounding } => step::analytic_threshold(s, z, range.min(), k, *rounding),
            Quantizer::Bipolar => 0.0,
            Quantizer::Trunc(spec) | Quantizer::QuantTrunc { trunc: spec, .. } => {
                let step = 2f64.powi(spec.shift() as i32);
                step::analytic_threshold(s * step, z / step, spec.output.min(), k, spec.rounding)
            }
        }
    }

    /// Output of channel `c` is `(level - offset) * factor`; returns
    /// `(factor, offset)`.
    pub fn rescale(&self, c: usize) -> (f64, f64) {
        let (s, z) = (self.scale_at(c), self.zero_point_at(c));
        match &self.quantizer {
            Quantizer::Quant { .. } => (s, z),
            Quantizer::Bipolar => (s, 0.0),
            Quantizer::Trunc(spec) | Quantizer::QuantTrunc { trunc: spec, .. } => {
                let step = 2f64.powi(spec.shift() as i32);
                (s * step, z / step)
            }
        }
    }

    /// Dtype of the synthesized threshold tensor.
    pub fn threshold_dtype(&self) -> DType {
        if self.data_dtype.is_float() {
            self.data_dtype
        } else {
            DType::F64
        }
    }

    /// One strictly increasing threshold row per channel.
    pub fn thresholds(&self) -> Result<Vec<Vec<f64>>, RewriteError> {
        let (min, max) = self.search_range();
        let expected = self.level_type().threshold_count();
        let invariant = |detail: String| RewriteError::RewriteInvariant {
            node: self.node.clone(),
            tensor: format!("{}_thresholds", self.node),
            detail,
        };

        let mut rows = Vec::with_capacity(self.channels());
        for c in 0..self.channels() {
            let row = step::synthesize(|x| self.level(c, x), min, max, self.data_dtype, |k| self.estimate(c, k))
                .map_err(|d| invariant(format!("channel {c}: {d}")))?;
            if row.len() != expected {
                return Err(invariant(format!(
                    "channel {c} has {} thresholds, {} needs {expected}",
                    row.len(),
                    self.level_type()
                )));
            }
            if !step::strictly_increasing(&row) {
                return Err(invariant(format!(
                    "thresholds of channel {c} are not strictly increasing; the scale is too fine for {}",
                    self.data_dtype
                )));
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Input `index` of `node`, which must be an initializer.
fn constant<'g>(graph: &'g Graph, node: &Node, index: usize, role: &str) -> Result<&'g Tensor, RewriteError> {
    let name = &node.inputs[index];
    graph
        .get_tensor(name)
        .ok_or_else(|| RewriteError::unsupported(&node.name, format!("{role} '{name}' is not an initializer")))
}

/// Reads a bit-width constant: one integer in `1..=max`.
fn bit_width(bits: &Tensor, max: u32) -> Result<u32, String> {
    let value = bits
        .scalar_value()
        .ok_or_else(|| format!("bit-width must be a single value, got shape {}", bits.shape()))?;
    if value.fract() != 0.0 || value < 1.0 || value > max as f64 {
        return Err(format!("bit-width {value} is outside the supported range 1..={max}"));
    }
    Ok(value as u32)
}

/// Classifies a parameter tensor against the data shape it broadcasts into.
fn layout(param: &Tensor, data: &Shape) -> Result<Layout, String> {
    let non_unit: Vec<usize> = param
        .shape()
        .dims()
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d != 1)
        .map(|(i, _)| i)
        .collect();
    match non_unit.as_slice() {
        [] => Ok(Layout::PerTensor),
        [j] => {
            let axis = data.rank() - param.shape().rank() + j;
            let channels = param.shape().dims()[*j];
            if data.dim(axis) != Some(channels) {
                return Err(format!(
                    "parameter of shape {} does not line up with data of shape {data}",
                    param.shape()
                ));
            }
            Ok(Layout::PerChannel { axis, channels })
        }
        _ => Err(format!(
            "parameter of shape {} varies along more than one axis",
            param.shape()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::quant::attr;
    use model_ir::ValueInfo;

    fn graph_with(scale: Tensor, zero_point: Tensor, bits: i64) -> Graph {
        let mut g = Graph::new("q");
        g.add_input("x", ValueInfo::new(DType::F32, Shape::new(vec![1, 3, 2]))).unwrap();
        g.add_initializer("s", scale).unwrap();
        g.add_initializer("z", zero_point).unwrap();
        g.add_initializer("b", Tensor::from_i64(Shape::scalar(), DType::I64, &[bits]).unwrap())
            .unwrap();
        g.add_node(
            Node::new("q", OpKind::Quant)
                .with_inputs(["x", "s", "z", "b"])
                .with_outputs(["y"])
                .with_attr(attr::SIGNED, 0i64),
        )
        .unwrap();
        g.add_output("y").unwrap();
        g
    }

    fn parse(g: &Graph) -> Result<QuantDescriptor, RewriteError> {
        QuantDescriptor::parse(g, g.get_node("q").unwrap(), 16)
    }

    fn per_channel(values: &[f32]) -> Tensor {
        Tensor::from_f32(Shape::new(vec![1, 3, 1]), values).unwrap()
    }

    #[test]
    fn test_per_tensor() {
        let d = parse(&graph_with(Tensor::scalar_f32(0.5), Tensor::scalar_f32(1.0), 2)).unwrap();
        assert_eq!(d.axis, None);
        assert_eq!(d.channels(), 1);
        assert_eq!(d.level_type(), LevelType::Int { bits: 2, signed: false });
        assert_eq!(d.rescale(0), (0.5, 1.0));
    }

    #[test]
    fn test_per_channel_scale_with_zero_zero_point() {
        let d = parse(&graph_with(per_channel(&[0.5, 1.0, 2.0]), Tensor::scalar_f32(0.0), 3)).unwrap();
        assert_eq!(d.axis, Some(1));
        assert_eq!(d.channels(), 3);
        assert_eq!(d.thresholds().unwrap().len(), 3);
    }

    #[test]
    fn test_mixed_granularity_rejected() {
        let err = parse(&graph_with(Tensor::scalar_f32(0.5), per_channel(&[0.0, 1.0, 2.0]), 2)).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedQuantConfig { .. }));

        let err = parse(&graph_with(per_channel(&[0.5, 1.0, 2.0]), Tensor::scalar_f32(1.0), 2)).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedQuantConfig { .. }));
    }

    #[test]
    fn test_two_varying_axes_rejected() {
        let scale = Tensor::from_f32(Shape::new(vec![1, 3, 2]), &[1.0; 6]).unwrap();
        assert!(parse(&graph_with(scale, Tensor::scalar_f32(0.0), 2)).is_err());
    }

    #[test]
    fn test_fractional_zero_point_rejected() {
        let err = parse(&graph_with(Tensor::scalar_f32(1.0), Tensor::scalar_f32(0.5), 2)).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedQuantConfig { .. }));

        let err = parse(&graph_with(per_channel(&[0.5, 1.0, 2.0]), per_channel(&[0.0, 1.25, 2.0]), 3)).unwrap_err();
        assert!(matches!(err, RewriteError::UnsupportedQuantConfig { .. }));
    }

    #[test]
    fn test_bit_width_limits() {
        assert!(parse(&graph_with(Tensor::scalar_f32(1.0), Tensor::scalar_f32(0.0), 17)).is_err());
        assert!(parse(&graph_with(Tensor::scalar_f32(1.0), Tensor::scalar_f32(0.0), 0)).is_err());
    }

    #[test]
    fn test_two_bit_thresholds() {
        let d = parse(&graph_with(Tensor::scalar_f32(1.0), Tensor::scalar_f32(0.0), 2)).unwrap();
        let rows = d.thresholds().unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.len(), 3);
        // 0.5 rounds down to 0, 1.5 rounds up to 2, 2.5 rounds down to 2.
        assert!(row[0] > 0.5 && row[0] < 0.5001);
        assert_eq!(row[1], 1.5);
        assert!(row[2] > 2.5 && row[2] < 2.5001);
    }

    #[test]
    fn test_level_matches_kernel_across_inputs() {
        let d = parse(&graph_with(Tensor::scalar_f32(0.25), Tensor::scalar_f32(2.0), 3)).unwrap();
        let rows = d.thresholds().unwrap();
        let range = IntRange::new(3, false).unwrap();
        for i in -200..200 {
            let x = (i as f32 * 0.0125) as f64;
            let count = ops::threshold_count(x, &rows[0]);
            let q = ops::quant_level(x, 0.25, 2.0, &range, RoundingMode::Round);
            assert_eq!(range.min() + count as f64, q, "x = {x}");
        }
    }
}
