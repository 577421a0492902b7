// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Interpreter configuration loaded from TOML or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! enable_profiling = true
//! keep_intermediates = false
//! ```

use crate::RuntimeError;
use std::path::Path;

/// Options for the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Record per-node timing and live-memory metrics.
    pub enable_profiling: bool,
    /// Keep every intermediate tensor and return it with the outputs
    /// instead of dropping it after its last consumer.
    pub keep_intermediates: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str).map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert!(!c.enable_profiling);
        assert!(!c.keep_intermediates);
    }

    #[test]
    fn test_from_toml_partial() {
        let c = RuntimeConfig::from_toml("enable_profiling = true\n").unwrap();
        assert!(c.enable_profiling);
        assert!(!c.keep_intermediates);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            RuntimeConfig::from_toml("enable_profiling = \"yes\""),
            Err(RuntimeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            enable_profiling: true,
            keep_intermediates: true,
        };
        let back = RuntimeConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
