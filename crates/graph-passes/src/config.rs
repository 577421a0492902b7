// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! passes = ["fold-constants", "eliminate-dead-nodes", "canonicalize-names", "infer-shapes"]
//! validate_each_stage = true
//!
//! [convert]
//! max_bit_width = 16
//! fold_trunc = true
//!
//! [verify]
//! rel_tolerance = 1e-5
//! abs_tolerance = 1e-6
//!
//! [runtime]
//! enable_profiling = false
//! ```

use crate::passes::{CanonicalizeNames, EliminateDeadNodes, FoldConstants, InferShapes};
use crate::{ConvertQuantToThreshold, PassError, Pipeline};
use runtime::RuntimeConfig;
use std::path::Path;

/// Options of the Quant→MultiThreshold conversion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Widest quantizer (in bits) that is expanded into thresholds. A
    /// `b`-bit quantizer needs `2^b - 1` thresholds per channel.
    pub max_bit_width: u32,
    /// Merge a `Trunc` into the `Quant` that feeds it.
    pub fold_trunc: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_bit_width: 16,
            fold_trunc: true,
        }
    }
}

/// Numerical tolerance of the equivalence check.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub rel_tolerance: f64,
    pub abs_tolerance: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            rel_tolerance: 1e-5,
            abs_tolerance: 1e-6,
        }
    }
}

/// Configuration of the whole lowering flow.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cleanup passes by name, run before and after conversion.
    pub passes: Vec<String>,
    /// Validate the graph after every stage.
    pub validate_each_stage: bool,
    pub convert: ConvertConfig,
    pub verify: VerifyConfig,
    /// Interpreter options for the baseline and lowered runs.
    pub runtime: RuntimeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: Pipeline::cleanup().pass_names().into_iter().map(String::from).collect(),
            validate_each_stage: true,
            convert: ConvertConfig::default(),
            verify: VerifyConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PassError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PassError::ConfigError(format!("cannot read config '{}': {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PassError> {
        toml::from_str(toml_str).map_err(|e| PassError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PassError> {
        toml::to_string_pretty(self).map_err(|e| PassError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Builds the cleanup pipeline named by `passes`.
    pub fn create_pipeline(&self) -> Result<Pipeline, PassError> {
        let mut pipeline = Pipeline::new().validate_each_stage(self.validate_each_stage);
        for name in &self.passes {
            pipeline.push(self.create_pass(name)?);
        }
        Ok(pipeline)
    }

    fn create_pass(&self, name: &str) -> Result<Box<dyn crate::GraphPass>, PassError> {
        match name.to_lowercase().as_str() {
            "fold-constants" | "fold" => Ok(Box::new(FoldConstants::new())),
            "eliminate-dead-nodes" | "dead-nodes" | "dce" => Ok(Box::new(EliminateDeadNodes::new())),
            "canonicalize-names" | "canonical-names" => Ok(Box::new(CanonicalizeNames::new())),
            "infer-shapes" | "shape-inference" => Ok(Box::new(InferShapes::new())),
            "convert-quant-to-threshold" | "convert" => {
                Ok(Box::new(ConvertQuantToThreshold::new(self.convert.clone())))
            }
            other => Err(PassError::ConfigError(format!(
                "unknown pass '{other}'; expected 'fold-constants', 'eliminate-dead-nodes', \
                 'canonicalize-names', 'infer-shapes', or 'convert-quant-to-threshold'"
            ))),
        }
    }
}
