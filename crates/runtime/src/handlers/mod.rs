// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in operator handlers, grouped by family.

pub(crate) mod arith;
pub(crate) mod quant;
pub(crate) mod shape;
pub(crate) mod threshold;
