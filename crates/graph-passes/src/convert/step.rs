// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Threshold synthesis.
//!
//! A quantizer is a monotone step function of its input. Its `k`-th
//! threshold is the smallest input value whose level reaches `min + k`.
//! The analytic boundary `s * (qmin + k - δ) - z * s` is only an estimate:
//! rounding ties, the division `x / s` and the data dtype all move the
//! exact step by a few ulps. So the estimate only seeds a bisection over
//! the totally ordered bit patterns of `f64`, evaluated with the exact
//! scalar level function the interpreter uses, and the result is then
//! rounded up onto the data dtype's grid.
//!
//! ```text
//! level(x)
//!   qmax ┤            ┌──────
//!        │        ┌───┘
//!        │    ┌───┘
//!   qmin ┼────┘
//!        └────┴───┴───┴────── x
//!            t_1 t_2 t_3
//! ```

use tensor_core::ops::RoundingMode;
use tensor_core::DType;

/// Maps an `f64` onto a `u64` whose integer order matches the float order
/// (`-inf < … < -0.0 < 0.0 < … < +inf`).
fn order_key(x: f64) -> u64 {
    let bits = x.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn from_order_key(key: u64) -> f64 {
    if key >> 63 == 1 {
        f64::from_bits(key & !(1 << 63))
    } else {
        f64::from_bits(!key)
    }
}

/// Smallest `x` with `level(x) >= target`, or `None` when no input (or
/// every input) reaches it. `level` must be non-decreasing.
pub(crate) fn boundary(level: impl Fn(f64) -> f64, target: f64, estimate: f64) -> Option<f64> {
    let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);
    if level(hi) < target || level(lo) >= target {
        return None;
    }
    if estimate.is_finite() {
        if level(estimate) >= target {
            hi = estimate;
        } else {
            lo = estimate;
        }
    }

    // Invariant: level(lo) < target <= level(hi).
    let (mut lo_key, mut hi_key) = (order_key(lo), order_key(hi));
    while hi_key - lo_key > 1 {
        let mid = lo_key + (hi_key - lo_key) / 2;
        if level(from_order_key(mid)) >= target {
            hi_key = mid;
        } else {
            lo_key = mid;
        }
    }
    Some(from_order_key(hi_key))
}

/// Offset of the level boundary inside one quantization step.
pub(crate) fn step_offset(rounding: RoundingMode) -> f64 {
    match rounding {
        RoundingMode::Round => 0.5,
        RoundingMode::Floor => 0.0,
        RoundingMode::Ceil => 1.0,
    }
}

/// Analytic threshold for level `qmin + k`: `s * (qmin + k - δ) - z * s`.
pub(crate) fn analytic_threshold(scale: f64, zero_point: f64, qmin: f64, k: u64, rounding: RoundingMode) -> f64 {
    scale * (qmin + k as f64 - step_offset(rounding)) - zero_point * scale
}

/// Smallest value representable in `dtype` that is `>= v`. Integer dtypes
/// round up to the next integer. `-0.0` becomes `0.0`.
pub(crate) fn ceil_to_dtype(v: f64, dtype: DType) -> f64 {
    let snapped = match dtype {
        DType::F64 => v,
        DType::F32 => {
            let f = v as f32;
            let f = if (f as f64) < v { next_up_f32(f) } else { f };
            f as f64
        }
        DType::F16 => {
            let h = half::f16::from_f64(v);
            let h = if h.to_f64() < v { next_up_f16(h) } else { h };
            h.to_f64()
        }
        _ => v.ceil(),
    };
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

fn next_up_f32(f: f32) -> f32 {
    if f.is_nan() || f == f32::INFINITY {
        return f;
    }
    if f == 0.0 {
        return f32::from_bits(1);
    }
    let bits = f.to_bits();
    if f > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

fn next_up_f16(h: half::f16) -> half::f16 {
    if h.is_nan() || h == half::f16::INFINITY {
        return h;
    }
    if h.to_f64() == 0.0 {
        return half::f16::from_bits(1);
    }
    let bits = h.to_bits();
    if h.to_f64() > 0.0 {
        half::f16::from_bits(bits + 1)
    } else {
        half::f16::from_bits(bits - 1)
    }
}

/// Synthesizes the thresholds of one channel: for every level
/// `min + 1 ..= max` the smallest `dtype` value reaching it.
///
/// `estimate(k)` seeds the search for level `min + k`.
pub(crate) fn synthesize(
    level: impl Fn(f64) -> f64,
    min: f64,
    max: f64,
    dtype: DType,
    estimate: impl Fn(u64) -> f64,
) -> Result<Vec<f64>, String> {
    let steps = (max - min) as u64;
    let mut row = Vec::with_capacity(steps as usize);
    for k in 1..=steps {
        let target = min + k as f64;
        let t = boundary(&level, target, estimate(k))
            .ok_or_else(|| format!("level {target} is never reached"))?;
        row.push(ceil_to_dtype(t, dtype));
    }
    Ok(row)
}

/// `true` when every value is strictly greater than the one before it.
pub(crate) fn strictly_increasing(row: &[f64]) -> bool {
    row.windows(2).all(|w| w[0] < w[1])
}
