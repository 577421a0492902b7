// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Attribute schemas of the quantization family and of `MultiThreshold`.
//!
//! Quantizer parameters that are tensors (scale, zero-point, bit-widths)
//! travel as node inputs; only the flags below are attributes.

use crate::{Attribute, ModelError, Node, OpKind};
use tensor_core::ops::RoundingMode;

/// Attribute names.
pub mod attr {
    pub const SIGNED: &str = "signed";
    pub const NARROW: &str = "narrow";
    pub const ROUNDING_MODE: &str = "rounding_mode";
    pub const OUT_SCALE: &str = "out_scale";
    pub const OUT_BIAS: &str = "out_bias";
    pub const OUT_DTYPE: &str = "out_dtype";
    pub const AXIS: &str = "axis";
    pub const PERM: &str = "perm";
}

/// Flags of a `Quant` or `Trunc` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantAttrs {
    pub signed: bool,
    pub rounding: RoundingMode,
}

impl QuantAttrs {
    /// Reads the flags of a `Quant` (default rounding `ROUND`) or `Trunc`
    /// (default rounding `FLOOR`) node. Both default to signed.
    pub fn from_node(node: &Node) -> Result<Self, ModelError> {
        let default_rounding = match node.op {
            OpKind::Trunc => RoundingMode::Floor,
            _ => RoundingMode::Round,
        };
        let signed = flag(node, attr::SIGNED, true)?;
        if flag(node, attr::NARROW, false)? {
            return Err(ModelError::InvalidAttribute {
                node: node.name.clone(),
                attribute: attr::NARROW.into(),
                detail: "narrow-range quantization is not supported".into(),
            });
        }
        let rounding = match node.str_attr(attr::ROUNDING_MODE)? {
            None => default_rounding,
            Some(s) => RoundingMode::from_str_loose(s).ok_or_else(|| ModelError::InvalidAttribute {
                node: node.name.clone(),
                attribute: attr::ROUNDING_MODE.into(),
                detail: format!("unknown rounding mode '{s}'"),
            })?,
        };
        Ok(Self { signed, rounding })
    }
}

fn flag(node: &Node, name: &str, default: bool) -> Result<bool, ModelError> {
    match node.int_attr(name, default as i64)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ModelError::InvalidAttribute {
            node: node.name.clone(),
            attribute: name.to_string(),
            detail: format!("expected 0 or 1, got {other}"),
        }),
    }
}

/// Integer level type produced by a `MultiThreshold` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelType {
    /// `{-1, +1}`, one threshold.
    Bipolar,
    /// `bits`-bit integer levels, `2^bits - 1` thresholds.
    Int { bits: u32, signed: bool },
}

impl LevelType {
    /// Parses `BIPOLAR`, `BINARY`, `INT<n>` or `UINT<n>` (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let upper = s.to_uppercase();
        let (signed, digits) = match upper.as_str() {
            "BIPOLAR" => return Some(LevelType::Bipolar),
            "BINARY" => return Some(LevelType::Int { bits: 1, signed: false }),
            u if u.starts_with("UINT") => (false, &u[4..]),
            u if u.starts_with("INT") => (true, &u[3..]),
            _ => return None,
        };
        match digits.parse::<u32>() {
            Ok(bits) if (1..=32).contains(&bits) => Some(LevelType::Int { bits, signed }),
            _ => None,
        }
    }

    /// Number of thresholds per channel this level type requires.
    pub fn threshold_count(&self) -> usize {
        match self {
            LevelType::Bipolar => 1,
            LevelType::Int { bits, .. } => (1usize << bits) - 1,
        }
    }

    pub fn is_bipolar(&self) -> bool {
        matches!(self, LevelType::Bipolar)
    }
}

impl std::fmt::Display for LevelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelType::Bipolar => f.write_str("BIPOLAR"),
            LevelType::Int { bits, signed: true } => write!(f, "INT{bits}"),
            LevelType::Int { bits, signed: false } => write!(f, "UINT{bits}"),
        }
    }
}

/// Attributes of a `MultiThreshold` node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdAttrs {
    pub out_scale: f64,
    pub out_bias: f64,
    /// Declared level type; when absent the threshold count is unconstrained.
    pub out_dtype: Option<LevelType>,
    /// Axis of the data input indexed by threshold rows (may be negative).
    pub channel_axis: i64,
}

impl Default for ThresholdAttrs {
    fn default() -> Self {
        Self {
            out_scale: 1.0,
            out_bias: 0.0,
            out_dtype: None,
            channel_axis: 1,
        }
    }
}

impl ThresholdAttrs {
    pub fn from_node(node: &Node) -> Result<Self, ModelError> {
        let defaults = Self::default();
        let out_dtype = match node.str_attr(attr::OUT_DTYPE)? {
            None => None,
            Some(s) => Some(LevelType::from_str_loose(s).ok_or_else(|| {
                ModelError::InvalidAttribute {
                    node: node.name.clone(),
                    attribute: attr::OUT_DTYPE.into(),
                    detail: format!("unknown level type '{s}'"),
                }
            })?),
        };
        Ok(Self {
            out_scale: node.float_attr(attr::OUT_SCALE, defaults.out_scale)?,
            out_bias: node.float_attr(attr::OUT_BIAS, defaults.out_bias)?,
            out_dtype,
            channel_axis: node.int_attr(attr::AXIS, defaults.channel_axis)?,
        })
    }

    /// Writes these attributes onto `node`, replacing previous values.
    pub fn apply(&self, node: &mut Node) {
        node.attributes
            .insert(attr::OUT_SCALE.into(), Attribute::Float(self.out_scale));
        node.attributes
            .insert(attr::OUT_BIAS.into(), Attribute::Float(self.out_bias));
        node.attributes
            .insert(attr::AXIS.into(), Attribute::Int(self.channel_axis));
        match self.out_dtype {
            Some(t) => {
                node.attributes
                    .insert(attr::OUT_DTYPE.into(), Attribute::String(t.to_string()));
            }
            None => {
                node.attributes.remove(attr::OUT_DTYPE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant_attrs_defaults() {
        let q = Node::new("q", OpKind::Quant);
        let a = QuantAttrs::from_node(&q).unwrap();
        assert!(a.signed);
        assert_eq!(a.rounding, RoundingMode::Round);

        let t = Node::new("t", OpKind::Trunc).with_attr(attr::SIGNED, 0i64);
        let a = QuantAttrs::from_node(&t).unwrap();
        assert!(!a.signed);
        assert_eq!(a.rounding, RoundingMode::Floor);
    }

    #[test]
    fn test_quant_attrs_rejects_bad_values() {
        let bad_flag = Node::new("q", OpKind::Quant).with_attr(attr::SIGNED, 2i64);
        assert!(QuantAttrs::from_node(&bad_flag).is_err());
        let narrow = Node::new("q", OpKind::Quant).with_attr(attr::NARROW, 1i64);
        assert!(QuantAttrs::from_node(&narrow).is_err());
        let mode = Node::new("q", OpKind::Quant).with_attr(attr::ROUNDING_MODE, "STOCHASTIC");
        assert!(QuantAttrs::from_node(&mode).is_err());
    }

    #[test]
    fn test_level_type_parse() {
        assert_eq!(LevelType::from_str_loose("BIPOLAR"), Some(LevelType::Bipolar));
        assert_eq!(
            LevelType::from_str_loose("uint2"),
            Some(LevelType::Int { bits: 2, signed: false })
        );
        assert_eq!(
            LevelType::from_str_loose("INT4"),
            Some(LevelType::Int { bits: 4, signed: true })
        );
        assert_eq!(LevelType::from_str_loose("FLOAT32"), None);
        assert_eq!(LevelType::from_str_loose("INT0"), None);
        assert_eq!(LevelType::Int { bits: 3, signed: true }.threshold_count(), 7);
        assert_eq!(LevelType::Bipolar.threshold_count(), 1);
    }

    #[test]
    fn test_threshold_attrs_roundtrip_through_node() {
        let attrs = ThresholdAttrs {
            out_scale: 0.5,
            out_bias: -0.5,
            out_dtype: Some(LevelType::Bipolar),
            channel_axis: 1,
        };
        let mut node = Node::new("mt", OpKind::MultiThreshold);
        attrs.apply(&mut node);
        assert_eq!(ThresholdAttrs::from_node(&node).unwrap(), attrs);
        assert_eq!(node.str_attr(attr::OUT_DTYPE).unwrap(), Some("BIPOLAR"));
    }
}
