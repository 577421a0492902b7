// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator vocabulary.

/// The kind of computation a node performs.
///
/// The vocabulary is closed: every registered kind has exactly one
/// inference and evaluation handler in the runtime. Names read from a model
/// file that match no registered kind are kept verbatim in
/// [`OpKind::Other`] so the graph can still be inspected and rewritten,
/// but such nodes cannot be inferred or executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpKind {
    Identity,
    Add,
    Sub,
    Mul,
    Div,
    MatMul,
    Relu,
    Reshape,
    Transpose,
    Flatten,
    /// Fake quantization `[x, scale, zero_point, bit_width]`.
    Quant,
    /// Binarization `[x, scale]`.
    BipolarQuant,
    /// Bit-width reduction `[x, scale, zero_point, in_bits, out_bits]`.
    Trunc,
    /// Threshold counting `[x, thresholds]`.
    MultiThreshold,
    /// An operator name outside the registered vocabulary.
    Other(String),
}

impl OpKind {
    /// Every registered kind, in a stable order.
    pub const REGISTERED: [OpKind; 14] = [
        OpKind::Identity,
        OpKind::Add,
        OpKind::Sub,
        OpKind::Mul,
        OpKind::Div,
        OpKind::MatMul,
        OpKind::Relu,
        OpKind::Reshape,
        OpKind::Transpose,
        OpKind::Flatten,
        OpKind::Quant,
        OpKind::BipolarQuant,
        OpKind::Trunc,
        OpKind::MultiThreshold,
    ];

    /// Resolves an operator name. Matching is exact first, then
    /// case-insensitive; anything else becomes [`OpKind::Other`].
    pub fn from_name(name: &str) -> Self {
        Self::REGISTERED
            .iter()
            .find(|k| k.as_str() == name)
            .or_else(|| {
                Self::REGISTERED
                    .iter()
                    .find(|k| k.as_str().eq_ignore_ascii_case(name))
            })
            .cloned()
            .unwrap_or_else(|| OpKind::Other(name.to_string()))
    }

    /// Returns the canonical operator name.
    pub fn as_str(&self) -> &str {
        match self {
            OpKind::Identity => "Identity",
            OpKind::Add => "Add",
            OpKind::Sub => "Sub",
            OpKind::Mul => "Mul",
            OpKind::Div => "Div",
            OpKind::MatMul => "MatMul",
            OpKind::Relu => "Relu",
            OpKind::Reshape => "Reshape",
            OpKind::Transpose => "Transpose",
            OpKind::Flatten => "Flatten",
            OpKind::Quant => "Quant",
            OpKind::BipolarQuant => "BipolarQuant",
            OpKind::Trunc => "Trunc",
            OpKind::MultiThreshold => "MultiThreshold",
            OpKind::Other(name) => name,
        }
    }

    pub fn is_registered(&self) -> bool {
        !matches!(self, OpKind::Other(_))
    }

    /// `Quant`, `BipolarQuant` or `Trunc`.
    pub fn is_quantizer(&self) -> bool {
        matches!(self, OpKind::Quant | OpKind::BipolarQuant | OpKind::Trunc)
    }
}

impl From<String> for OpKind {
    fn from(name: String) -> Self {
        OpKind::from_name(&name)
    }
}

impl From<OpKind> for String {
    fn from(kind: OpKind) -> Self {
        match kind {
            OpKind::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
