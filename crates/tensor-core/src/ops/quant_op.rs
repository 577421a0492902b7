// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fake-quantization kernels: `Quant`, `BipolarQuant` and `Trunc`.
//!
//! Each kernel is split into a scalar level function (exposed so the
//! threshold rewrite can reproduce it exactly) and a tensor wrapper that
//! handles broadcasting, parameter validation and dtype rounding.

use super::elementwise_op::{broadcast_values, real_dtype};
use crate::{Shape, Tensor, TensorError};

/// How a real quotient is mapped onto the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    #[default]
    Round,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceil,
}

impl RoundingMode {
    /// Applies the rounding to `v`.
    pub fn apply(self, v: f64) -> f64 {
        match self {
            RoundingMode::Round => v.round_ties_even(),
            RoundingMode::Floor => v.floor(),
            RoundingMode::Ceil => v.ceil(),
        }
    }

    /// Parses the rounding-mode attribute as found in model files.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ROUND" | "HALF_EVEN" | "ROUND_HALF_EVEN" => Some(RoundingMode::Round),
            "FLOOR" => Some(RoundingMode::Floor),
            "CEIL" | "CEILING" => Some(RoundingMode::Ceil),
            _ => None,
        }
    }

    /// Returns the canonical attribute spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            RoundingMode::Round => "ROUND",
            RoundingMode::Floor => "FLOOR",
            RoundingMode::Ceil => "CEIL",
        }
    }
}

/// Inclusive integer range implied by a bit-width and signedness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntRange {
    bits: u32,
    signed: bool,
    min: f64,
    max: f64,
}

impl IntRange {
    /// Widest bit-width whose levels are all exactly representable as `f64`.
    pub const MAX_BITS: u32 = 53;

    /// Builds the range for `bits` bits. Signed ranges are two's complement:
    /// `[-2^(b-1), 2^(b-1) - 1]`; unsigned ranges are `[0, 2^b - 1]`.
    pub fn new(bits: u32, signed: bool) -> Result<Self, TensorError> {
        if bits == 0 {
            return Err(TensorError::Numeric {
                op: "quant",
                detail: "bit-width must be at least 1".into(),
            });
        }
        if bits > Self::MAX_BITS {
            return Err(TensorError::BitWidthOverflow {
                op: "quant",
                value: 2f64.powi(bits as i32),
                bits,
                min: 0.0,
                max: 2f64.powi(Self::MAX_BITS as i32),
            });
        }
        let (min, max) = if signed {
            let half = 2f64.powi(bits as i32 - 1);
            (-half, half - 1.0)
        } else {
            (0.0, 2f64.powi(bits as i32) - 1.0)
        };
        Ok(Self {
            bits,
            signed,
            min,
            max,
        })
    }

    /// Parses a bit-width tensor (a single non-negative integer) into a range.
    pub fn from_tensor(bits: &Tensor, signed: bool) -> Result<Self, TensorError> {
        let value = bits.scalar_value().ok_or_else(|| TensorError::Numeric {
            op: "quant",
            detail: format!("bit-width must be a single value, got shape {}", bits.shape()),
        })?;
        if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
            return Err(TensorError::Numeric {
                op: "quant",
                detail: format!("bit-width must be a non-negative integer, got {value}"),
            });
        }
        Self::new(value as u32, signed)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn signed(&self) -> bool {
        self.signed
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Number of distinct levels, `2^bits`.
    pub fn num_levels(&self) -> u64 {
        1u64 << self.bits
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn clip(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

/// Clipped integer level of `x`: `clip(round(x / scale) + zero_point)`.
pub fn quant_level(x: f64, scale: f64, zero_point: f64, range: &IntRange, mode: RoundingMode) -> f64 {
    range.clip(mode.apply(x / scale) + zero_point)
}

/// Maps an integer level back to the real line: `q * scale - zero_point * scale`.
pub fn dequantize(q: f64, scale: f64, zero_point: f64) -> f64 {
    q * scale - zero_point * scale
}

/// `scale * sign(x)` with `sign(0) = +1`.
pub fn bipolar_level(x: f64, scale: f64) -> f64 {
    if x >= 0.0 {
        scale
    } else {
        -scale
    }
}

/// Bit-width reduction performed by `Trunc`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncSpec {
    pub input: IntRange,
    pub output: IntRange,
    pub rounding: RoundingMode,
}

impl TruncSpec {
    /// Validates that the output is not wider than the input.
    pub fn new(input: IntRange, output: IntRange, rounding: RoundingMode) -> Result<Self, TensorError> {
        if output.bits() > input.bits() {
            return Err(TensorError::Numeric {
                op: "trunc",
                detail: format!(
                    "output bit-width {} exceeds input bit-width {}",
                    output.bits(),
                    input.bits()
                ),
            });
        }
        Ok(Self {
            input,
            output,
            rounding,
        })
    }

    /// Number of low bits dropped.
    pub fn shift(&self) -> u32 {
        self.input.bits() - self.output.bits()
    }

    fn divisor(&self) -> f64 {
        2f64.powi(self.shift() as i32)
    }

    /// Integer representation `round_even(x / scale) + zero_point` of a
    /// value already on the input grid.
    pub fn input_level(x: f64, scale: f64, zero_point: f64) -> f64 {
        (x / scale).round_ties_even() + zero_point
    }

    /// Truncated level of `x`. Fails when the input representation does not
    /// fit the declared input bit-width.
    pub fn level(&self, x: f64, scale: f64, zero_point: f64) -> Result<f64, TensorError> {
        let q = Self::input_level(x, scale, zero_point);
        if !self.input.contains(q) {
            return Err(TensorError::BitWidthOverflow {
                op: "trunc",
                value: q,
                bits: self.input.bits(),
                min: self.input.min(),
                max: self.input.max(),
            });
        }
        Ok(self.shifted(q))
    }

    /// Like [`level`](Self::level) but saturates out-of-range inputs instead
    /// of failing; identical on every in-range input.
    pub fn level_saturating(&self, x: f64, scale: f64, zero_point: f64) -> f64 {
        self.shifted(self.input.clip(Self::input_level(x, scale, zero_point)))
    }

    fn shifted(&self, q: f64) -> f64 {
        self.output.clip(self.rounding.apply(q / self.divisor()))
    }

    /// Rescales a truncated level: `t * scale * 2^shift - zero_point * scale`.
    pub fn output_value(&self, t: f64, scale: f64, zero_point: f64) -> f64 {
        t * (scale * self.divisor()) - zero_point * scale
    }
}

/// Validates that every scale is finite and strictly positive.
fn check_scales(op: &'static str, scale: &Tensor) -> Result<(), TensorError> {
    match scale.values().iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        Some(bad) => Err(TensorError::Numeric {
            op,
            detail: format!("scale must be finite and positive, got {bad}"),
        }),
        None => Ok(()),
    }
}

fn check_finite(op: &'static str, values: &[f64]) -> Result<(), TensorError> {
    if values.iter().any(|v| v.is_nan()) {
        return Err(TensorError::Numeric {
            op,
            detail: "input contains NaN".into(),
        });
    }
    Ok(())
}

fn broadcast_all(op: &'static str, tensors: &[&Tensor]) -> Result<Shape, TensorError> {
    let shapes: Vec<&Shape> = tensors.iter().map(|t| t.shape()).collect();
    quant_output_shape(op, &shapes)
}

/// Output shape of `Quant` / `Trunc`: the broadcast of data and parameters.
pub fn quant_output_shape(op: &'static str, shapes: &[&Shape]) -> Result<Shape, TensorError> {
    let mut shape = shapes[0].clone();
    for s in &shapes[1..] {
        shape = shape.broadcast(s).ok_or_else(|| TensorError::ShapeMismatch {
            op,
            lhs: shape.clone(),
            rhs: (*s).clone(),
        })?;
    }
    Ok(shape)
}

/// Fake-quantizes `x`:
/// `clip(round(x / scale) + zero_point, qmin, qmax) * scale - zero_point * scale`.
pub fn quant(
    x: &Tensor,
    scale: &Tensor,
    zero_point: &Tensor,
    bit_width: &Tensor,
    signed: bool,
    rounding: RoundingMode,
) -> Result<Tensor, TensorError> {
    let range = IntRange::from_tensor(bit_width, signed)?;
    check_scales("quant", scale)?;
    check_finite("quant", x.values())?;
    let shape = broadcast_all("quant", &[x, scale, zero_point])?;
    let xs = broadcast_values(x, &shape);
    let ss = broadcast_values(scale, &shape);
    let zs = broadcast_values(zero_point, &shape);

    let values = xs
        .iter()
        .zip(&ss)
        .zip(&zs)
        .map(|((&x, &s), &z)| dequantize(quant_level(x, s, z, &range, rounding), s, z))
        .collect();
    Tensor::from_computed("quant", shape, real_dtype(x.dtype()), values)
}

/// Binarizes `x` to `±scale` with `sign(0) = +1`.
pub fn bipolar_quant(x: &Tensor, scale: &Tensor) -> Result<Tensor, TensorError> {
    check_scales("bipolar_quant", scale)?;
    check_finite("bipolar_quant", x.values())?;
    let shape = broadcast_all("bipolar_quant", &[x, scale])?;
    let xs = broadcast_values(x, &shape);
    let ss = broadcast_values(scale, &shape);
    let values = xs.iter().zip(&ss).map(|(&x, &s)| bipolar_level(x, s)).collect();
    Tensor::from_computed("bipolar_quant", shape, real_dtype(x.dtype()), values)
}

/// Drops `in_bits - out_bits` low bits of the quantized representation of
/// `x`, rounding with `rounding`, then rescales onto the coarser grid.
#[allow(clippy::too_many_arguments)]
pub fn trunc(
    x: &Tensor,
    scale: &Tensor,
    zero_point: &Tensor,
    in_bits: &Tensor,
    out_bits: &Tensor,
    signed: bool,
    rounding: RoundingMode,
) -> Result<Tensor, TensorError> {
    let spec = TruncSpec::new(
        IntRange::from_tensor(in_bits, signed)?,
        IntRange::from_tensor(out_bits, signed)?,
        rounding,
    )?;
    check_scales("trunc", scale)?;
    check_finite("trunc", x.values())?;
    let shape = broadcast_all("trunc", &[x, scale, zero_point])?;
    let xs = broadcast_values(x, &shape);
    let ss = broadcast_values(scale, &shape);
    let zs = broadcast_values(zero_point, &shape);

    let mut values = Vec::with_capacity(xs.len());
    for ((&x, &s), &z) in xs.iter().zip(&ss).zip(&zs) {
        let t = spec.level(x, s, z)?;
        values.push(spec.output_value(t, s, z));
    }
    Tensor::from_computed("trunc", shape, real_dtype(x.dtype()), values)
}
