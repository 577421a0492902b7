// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

use crate::TensorError;

/// Enumerates the numeric types a [`crate::Tensor`] can hold.
///
/// Element values are carried as `f64` regardless of the declared type;
/// `DType` decides how a computed value is rounded (floats) or range-checked
/// (integers) before it is stored. Integer types wider than 53 bits are
/// therefore only exact up to `2^53`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 1-bit signed integer, range `[-1, 0]`.
    I1,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 1-bit unsigned integer (boolean), range `[0, 1]`.
    U1,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 64-bit IEEE 754 floating point.
    F64,
}

impl DType {
    /// Returns the width of a single element in bits.
    pub fn bits(self) -> u32 {
        match self {
            DType::I1 | DType::U1 => 1,
            DType::I8 | DType::U8 => 8,
            DType::I16 | DType::U16 | DType::F16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::U64 | DType::F64 => 64,
        }
    }

    /// Returns the size of a single element in bytes (1-bit types occupy a byte).
    pub fn size_bytes(self) -> usize {
        (self.bits() as usize).div_ceil(8)
    }

    /// Returns `true` for the floating-point types.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    /// Returns `true` for the signed integer types.
    pub fn is_signed_int(self) -> bool {
        matches!(self, DType::I1 | DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    /// Returns the inclusive value range of an integer type, or `None` for floats.
    pub fn int_bounds(self) -> Option<(f64, f64)> {
        if self.is_float() {
            return None;
        }
        let bits = self.bits() as i32;
        if self.is_signed_int() {
            let half = 2f64.powi(bits - 1);
            Some((-half, half - 1.0))
        } else {
            Some((0.0, 2f64.powi(bits) - 1.0))
        }
    }

    /// Rounds or range-checks `value` so it is representable in this type.
    ///
    /// Floats are rounded to the nearest representable value (non-finite
    /// values pass through). Integers must be integral and inside
    /// [`int_bounds`](Self::int_bounds); anything else is an overflow, never
    /// a silent wrap.
    pub fn canonicalize(self, op: &'static str, value: f64) -> Result<f64, TensorError> {
        match self {
            DType::F64 => Ok(value),
            DType::F32 => Ok(value as f32 as f64),
            DType::F16 => Ok(half::f16::from_f64(value).to_f64()),
            _ => {
                let (lo, hi) = self.int_bounds().unwrap_or((f64::MIN, f64::MAX));
                if value.fract() != 0.0 || !value.is_finite() {
                    return Err(TensorError::Numeric {
                        op,
                        detail: format!("{value} is not an integer value for {self}"),
                    });
                }
                if value < lo || value > hi {
                    return Err(TensorError::Overflow {
                        op,
                        value,
                        dtype: self,
                    });
                }
                Ok(value)
            }
        }
    }

    /// Result type of an elementwise binary operation.
    ///
    /// Floats absorb integers and the wider float wins; two integers must
    /// agree exactly. Returns `None` for mismatched integer types.
    pub fn promote(self, other: DType) -> Option<DType> {
        match (self.is_float(), other.is_float()) {
            (true, true) => Some(if self.bits() >= other.bits() { self } else { other }),
            (true, false) => Some(self),
            (false, true) => Some(other),
            (false, false) if self == other => Some(self),
            (false, false) => None,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::I1 => "int1",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U1 => "uint1",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::F16 => "float16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }

    /// Parses a data type from a string.
    ///
    /// Accepts the canonical names (`"float32"`) and the short aliases
    /// common in model files (`"f32"`, `"i8"`, `"bool"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "int1" | "i1" => Some(DType::I1),
            "int8" | "i8" => Some(DType::I8),
            "int16" | "i16" => Some(DType::I16),
            "int32" | "i32" => Some(DType::I32),
            "int64" | "i64" => Some(DType::I64),
            "uint1" | "u1" | "bool" => Some(DType::U1),
            "uint8" | "u8" => Some(DType::U8),
            "uint16" | "u16" => Some(DType::U16),
            "uint32" | "u32" => Some(DType::U32),
            "uint64" | "u64" => Some(DType::U64),
            "float16" | "f16" | "half" => Some(DType::F16),
            "float32" | "f32" | "float" => Some(DType::F32),
            "float64" | "f64" | "double" => Some(DType::F64),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bounds() {
        assert_eq!(DType::I8.int_bounds(), Some((-128.0, 127.0)));
        assert_eq!(DType::U8.int_bounds(), Some((0.0, 255.0)));
        assert_eq!(DType::I1.int_bounds(), Some((-1.0, 0.0)));
        assert_eq!(DType::U1.int_bounds(), Some((0.0, 1.0)));
        assert_eq!(DType::F32.int_bounds(), None);
    }

    #[test]
    fn test_canonicalize_float_rounds() {
        let v = DType::F32.canonicalize("test", 0.1).unwrap();
        assert_eq!(v, 0.1f32 as f64);
        assert_eq!(DType::F64.canonicalize("test", 0.1).unwrap(), 0.1);
        let h = DType::F16.canonicalize("test", 1.0 / 3.0).unwrap();
        assert!((h - 1.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_canonicalize_int_overflow() {
        assert!(matches!(
            DType::I8.canonicalize("add", 128.0),
            Err(TensorError::Overflow { .. })
        ));
        assert!(matches!(
            DType::U8.canonicalize("sub", -1.0),
            Err(TensorError::Overflow { .. })
        ));
        assert!(DType::I8.canonicalize("div", 1.5).is_err());
        assert_eq!(DType::I16.canonicalize("mul", -300.0).unwrap(), -300.0);
    }

    #[test]
    fn test_promote() {
        assert_eq!(DType::F16.promote(DType::F32), Some(DType::F32));
        assert_eq!(DType::I8.promote(DType::F32), Some(DType::F32));
        assert_eq!(DType::I8.promote(DType::I8), Some(DType::I8));
        assert_eq!(DType::I8.promote(DType::U8), None);
    }

    #[test]
    fn test_from_str_loose() {
        assert_eq!(DType::from_str_loose("f32"), Some(DType::F32));
        assert_eq!(DType::from_str_loose("FLOAT32"), Some(DType::F32));
        assert_eq!(DType::from_str_loose("uint8"), Some(DType::U8));
        assert_eq!(DType::from_str_loose("bool"), Some(DType::U1));
        assert_eq!(DType::from_str_loose("bf16"), None);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&DType::F32).unwrap(), "\"f32\"");
    }
}
