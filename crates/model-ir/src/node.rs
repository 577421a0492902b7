// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes.
//!
//! A [`Node`] does not own any tensor data. Inputs and outputs are tensor
//! *names*, resolved against the owning [`crate::Graph`].

use crate::{Attribute, ModelError, OpKind};
use std::collections::BTreeMap;

/// A single operation instance in the graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique, non-empty node name.
    pub name: String,
    /// Operator kind.
    pub op: OpKind,
    /// Ordered input tensor names.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Ordered output tensor names.
    pub outputs: Vec<String>,
    /// Attribute map, ordered by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Node {
    /// Creates a node with no inputs, outputs or attributes.
    pub fn new(name: impl Into<String>, op: OpKind) -> Self {
        Self {
            name: name.into(),
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Attribute>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns the `i`-th input name, if present.
    pub fn input(&self, i: usize) -> Option<&str> {
        self.inputs.get(i).map(String::as_str)
    }

    /// Returns the `i`-th output name, if present.
    pub fn output(&self, i: usize) -> Option<&str> {
        self.outputs.get(i).map(String::as_str)
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    // ── Typed attribute lookup ─────────────────────────────────────

    /// Reads an integer attribute, falling back to `default` when absent.
    pub fn int_attr(&self, name: &str, default: i64) -> Result<i64, ModelError> {
        match self.attr(name) {
            None => Ok(default),
            Some(a) => a.as_int().ok_or_else(|| self.wrong_kind(name, "int", a)),
        }
    }

    /// Reads a float attribute (ints are accepted), falling back to `default`.
    pub fn float_attr(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        match self.attr(name) {
            None => Ok(default),
            Some(a) => a.as_float().ok_or_else(|| self.wrong_kind(name, "float", a)),
        }
    }

    /// Reads a string attribute, if present.
    pub fn str_attr(&self, name: &str) -> Result<Option<&str>, ModelError> {
        match self.attr(name) {
            None => Ok(None),
            Some(a) => a
                .as_str()
                .map(Some)
                .ok_or_else(|| self.wrong_kind(name, "string", a)),
        }
    }

    /// Reads an integer-list attribute, if present.
    pub fn ints_attr(&self, name: &str) -> Result<Option<&[i64]>, ModelError> {
        match self.attr(name) {
            None => Ok(None),
            Some(a) => a
                .as_ints()
                .map(Some)
                .ok_or_else(|| self.wrong_kind(name, "ints", a)),
        }
    }

    /// Checks the input count against an inclusive range.
    pub fn expect_inputs(&self, min: usize, max: usize) -> Result<(), ModelError> {
        let n = self.inputs.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(ModelError::InvalidNode {
                node: self.name.clone(),
                detail: format!("{} expects {expected} inputs, got {n}", self.op),
            });
        }
        Ok(())
    }

    fn wrong_kind(&self, name: &str, expected: &str, found: &Attribute) -> ModelError {
        ModelError::InvalidAttribute {
            node: self.name.clone(),
            attribute: name.to_string(),
            detail: format!("expected {expected}, found {}", found.kind()),
        }
    }

    /// One-line description, e.g. `q0: Quant(x, s, z, b) -> (y)`.
    pub fn summary(&self) -> String {
        format!(
            "{}: {}({}) -> ({})",
            self.name,
            self.op,
            self.inputs.join(", "),
            self.outputs.join(", ")
        )
    }
}
