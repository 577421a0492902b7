// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end lowering.
//!
//! These tests exercise the complete flow from graph construction →
//! cleanup → Quant→MultiThreshold conversion → execution, checking that
//! the lowered graphs compute what the fake-quantized graphs computed.

use graph_passes::{
    convert, convert_with_report, lower, run_pipeline, verify_equivalence, ConvertConfig, PassError,
    PipelineConfig, RewriteError, VerifyConfig,
};
use model_ir::quant::{attr, LevelType, ThresholdAttrs};
use model_ir::{Graph, Node, OpKind, ValueInfo};
use proptest::prelude::*;
use runtime::{execute, TensorMap};
use tensor_core::{DType, Shape, Tensor};

// ── Helpers ────────────────────────────────────────────────────

fn bits(b: i64) -> Tensor {
    Tensor::from_i64(Shape::scalar(), DType::I64, &[b]).unwrap()
}

fn bind(name: &str, shape: Shape, values: &[f32]) -> TensorMap {
    let mut m = TensorMap::new();
    m.insert(name.into(), Tensor::from_f32(shape, values).unwrap());
    m
}

/// A two-layer quantized MLP: MatMul → per-channel Quant → Relu → MatMul →
/// BipolarQuant, with a dead branch hanging off the first activation.
fn quantized_mlp() -> Graph {
    let mut g = Graph::new("qmlp");
    g.add_input("x", ValueInfo::new(DType::F32, Shape::matrix(2, 4))).unwrap();
    g.add_initializer(
        "w1",
        Tensor::from_f32(
            Shape::matrix(4, 3),
            &[0.5, -1.0, 0.25, 1.5, 0.75, -0.5, -0.25, 1.0, 2.0, 1.0, 0.5, -1.5],
        )
        .unwrap(),
    )
    .unwrap();
    g.add_initializer("w2", Tensor::from_f32(Shape::matrix(3, 2), &[1.0, -0.5, -2.0, 0.25, 0.5, 1.0]).unwrap())
        .unwrap();
    g.add_initializer("s1", Tensor::from_f32(Shape::matrix(1, 3), &[0.25, 0.5, 0.125]).unwrap())
        .unwrap();
    g.add_initializer("z1", Tensor::scalar_f32(0.0)).unwrap();
    g.add_initializer("b1", bits(4)).unwrap();
    g.add_initializer("s2", Tensor::scalar_f32(1.5)).unwrap();

    g.add_node(Node::new("fc1", OpKind::MatMul).with_inputs(["x", "w1"]).with_outputs(["h1"]))
        .unwrap();
    g.add_node(
        Node::new("q1", OpKind::Quant)
            .with_inputs(["h1", "s1", "z1", "b1"])
            .with_outputs(["h1q"])
            .with_attr(attr::SIGNED, 1i64),
    )
    .unwrap();
    g.add_node(Node::new("act", OpKind::Relu).with_inputs(["h1q"]).with_outputs(["a1"]))
        .unwrap();
    g.add_node(Node::new("fc2", OpKind::MatMul).with_inputs(["a1", "w2"]).with_outputs(["h2"]))
        .unwrap();
    g.add_node(Node::new("bq", OpKind::BipolarQuant).with_inputs(["h2", "s2"]).with_outputs(["y"]))
        .unwrap();
    g.add_node(Node::new("probe", OpKind::Relu).with_inputs(["h1"]).with_outputs(["unused"]))
        .unwrap();
    g.add_output("y").unwrap();
    g
}

fn mlp_inputs() -> TensorMap {
    bind("x", Shape::matrix(2, 4), &[0.3, -1.2, 2.5, 0.7, -0.9, 0.05, 1.1, -2.2])
}

fn single_quant(width: i64, signed: bool, rounding: &str, scale: f32, zero_point: f32, len: usize) -> Graph {
    let mut g = Graph::new("single");
    g.add_input("x", ValueInfo::new(DType::F32, Shape::vector(len))).unwrap();
    g.add_initializer("s", Tensor::scalar_f32(scale)).unwrap();
    g.add_initializer("z", Tensor::scalar_f32(zero_point)).unwrap();
    g.add_initializer("b", bits(width)).unwrap();
    g.add_node(
        Node::new("q", OpKind::Quant)
            .with_inputs(["x", "s", "z", "b"])
            .with_outputs(["y"])
            .with_attr(attr::SIGNED, signed as i64)
            .with_attr(attr::ROUNDING_MODE, rounding),
    )
    .unwrap();
    g.add_output("y").unwrap();
    g
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_bipolar_scenario_end_to_end() {
    let mut g = Graph::new("bipolar");
    g.add_input("x", ValueInfo::new(DType::F32, Shape::vector(3))).unwrap();
    g.add_initializer("s", Tensor::scalar_f32(0.5)).unwrap();
    g.add_node(Node::new("bq", OpKind::BipolarQuant).with_inputs(["x", "s"]).with_outputs(["y"]))
        .unwrap();
    g.add_output("y").unwrap();

    let lowered = run_pipeline(&convert(&g).unwrap()).unwrap();
    let node = lowered.get_node("bq").unwrap();
    assert_eq!(node.op, OpKind::MultiThreshold);
    let attrs = ThresholdAttrs::from_node(node).unwrap();
    assert_eq!((attrs.out_scale, attrs.out_bias), (0.5, -0.5));
    assert_eq!(attrs.out_dtype, Some(LevelType::Bipolar));
    assert_eq!(lowered.get_tensor("bq_thresholds").unwrap().values(), &[0.0]);

    let out = execute(&lowered, &bind("x", Shape::vector(3), &[-3.2, 0.0, 4.1])).unwrap();
    assert_eq!(out["y"].to_f32_vec(), vec![-0.5, 0.5, 0.5]);
}

#[test]
fn test_two_bit_unsigned_scenario_end_to_end() {
    let g = single_quant(2, false, "ROUND", 1.0, 0.0, 4);
    let inputs = bind("x", Shape::vector(4), &[0.4, 1.6, 2.9, 3.1]);
    let report = lower(&g, &inputs, &PipelineConfig::default()).unwrap();
    assert_eq!(report.outputs["y"].to_f32_vec(), vec![0.0, 2.0, 3.0, 3.0]);
    assert_eq!(report.baseline, report.outputs);
    let thresholds = report.lowered.get_tensor("q_thresholds").unwrap();
    assert_eq!(thresholds.shape(), &Shape::matrix(1, 3));
}

#[test]
fn test_mlp_lowering_preserves_outputs() {
    let report = lower(&quantized_mlp(), &mlp_inputs(), &PipelineConfig::default()).unwrap();
    assert_eq!(report.conversion.converted, vec!["q1".to_string(), "bq".to_string()]);
    assert!(report.lowered.get_node("probe").is_none());
    assert!(report
        .lowered
        .nodes()
        .iter()
        .all(|n| !n.op.is_quantizer()));
    assert_eq!(report.lowered.get_node("q1").unwrap().op, OpKind::MultiThreshold);
    assert_eq!(report.comparisons.len(), 1);
    assert!(report.comparisons[0].max_rel_diff <= 1e-5);
}

#[test]
fn test_verify_equivalence_of_converted_mlp() {
    let cleaned = run_pipeline(&quantized_mlp()).unwrap();
    let converted = convert(&cleaned).unwrap();
    let cmp = verify_equivalence(&cleaned, &converted, &mlp_inputs(), &VerifyConfig::default()).unwrap();
    assert_eq!(cmp[0].name, "y");
}

// ── Structural properties ──────────────────────────────────────

#[test]
fn test_pipeline_idempotent_on_lowered_graph() {
    let once = run_pipeline(&convert(&quantized_mlp()).unwrap()).unwrap();
    assert_eq!(run_pipeline(&once).unwrap(), once);
}

#[test]
fn test_convert_idempotent() {
    let once = convert(&quantized_mlp()).unwrap();
    assert_eq!(convert(&once).unwrap(), once);
}

#[test]
fn test_convert_does_not_touch_input() {
    let g = quantized_mlp();
    let before = g.clone();
    let _ = convert(&g).unwrap();
    assert_eq!(g, before);
}

#[test]
fn test_threshold_counts_and_monotonicity() {
    for (b, signed) in [(1, false), (2, true), (3, false), (5, true), (8, true)] {
        let g = single_quant(b, signed, "ROUND", 0.1, 0.0, 2);
        let out = convert(&g).unwrap();
        let t = out.get_tensor("q_thresholds").unwrap();
        let expected = (1usize << b) - 1;
        assert_eq!(t.shape(), &Shape::matrix(1, expected), "bits {b}");
        assert!(t.values().windows(2).all(|w| w[0] < w[1]), "bits {b}");
    }
}

#[test]
fn test_per_channel_rows() {
    let out = convert(&quantized_mlp()).unwrap();
    let t = out.get_tensor("q1_thresholds").unwrap();
    assert_eq!(t.shape(), &Shape::matrix(3, 15));
    for row in t.values().chunks(15) {
        assert!(row.windows(2).all(|w| w[0] < w[1]));
    }
    let attrs = ThresholdAttrs::from_node(out.get_node("q1").unwrap()).unwrap();
    assert_eq!(attrs.channel_axis, 1);
}

#[test]
fn test_dead_quantizer_is_skipped() {
    let mut g = single_quant(2, false, "ROUND", 1.0, 0.0, 4);
    g.add_node(Node::new("dead_q", OpKind::BipolarQuant).with_inputs(["x", "s"]).with_outputs(["d"]))
        .unwrap();
    let (out, report) = convert_with_report(&g, &ConvertConfig::default()).unwrap();
    assert_eq!(report.skipped, vec!["dead_q".to_string()]);
    assert_eq!(out.get_node("dead_q").unwrap().op, OpKind::BipolarQuant);
}

#[test]
fn test_converted_graph_survives_json() {
    let out = convert(&quantized_mlp()).unwrap();
    let json = out.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let ops: Vec<&str> = value["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["op"].as_str())
        .collect();
    assert!(ops.contains(&"MultiThreshold"));
    assert_eq!(Graph::from_json(&json).unwrap(), out);
}

// ── Rejections ─────────────────────────────────────────────────

#[test]
fn test_mixed_granularity_rejected() {
    let mut g = quantized_mlp();
    g.set_tensor("z1", Tensor::scalar_f32(1.0)).unwrap();
    let err = convert(&g).unwrap_err();
    assert!(matches!(err, RewriteError::UnsupportedQuantConfig { ref node, .. } if node == "q1"));
}

#[test]
fn test_bit_width_limit() {
    let g = single_quant(12, true, "ROUND", 0.5, 0.0, 2);
    let config = ConvertConfig {
        max_bit_width: 8,
        ..Default::default()
    };
    let err = convert_with_report(&g, &config).unwrap_err();
    assert!(matches!(err, RewriteError::UnsupportedQuantConfig { .. }));
}

#[test]
fn test_fractional_zero_point_rejected() {
    // Levels {0, 0.5, 1.5, 2.5, 3} do not fit three thresholds.
    let g = single_quant(2, false, "ROUND", 1.0, 0.5, 4);
    let before = execute(&g, &bind("x", Shape::vector(4), &[0.0, 1.0, 2.0, 3.0])).unwrap();
    assert_eq!(before["y"].to_f32_vec(), vec![0.0, 1.0, 2.0, 2.5]);

    let err = convert(&g).unwrap_err();
    assert!(matches!(err, RewriteError::UnsupportedQuantConfig { ref node, .. } if node == "q"));
    assert_eq!(g.get_node("q").unwrap().op, OpKind::Quant);
}

#[test]
fn test_fractional_zero_point_rejected_for_trunc() {
    let mut g = Graph::new("trunc");
    g.add_input("x", ValueInfo::new(DType::F32, Shape::vector(4))).unwrap();
    g.add_initializer("s", Tensor::scalar_f32(0.25)).unwrap();
    g.add_initializer("z", Tensor::scalar_f32(1.5)).unwrap();
    g.add_initializer("b8", bits(8)).unwrap();
    g.add_initializer("b4", bits(4)).unwrap();
    g.add_node(Node::new("t", OpKind::Trunc).with_inputs(["x", "s", "z", "b8", "b4"]).with_outputs(["y"]))
        .unwrap();
    g.add_output("y").unwrap();

    let err = convert(&g).unwrap_err();
    assert!(matches!(err, RewriteError::UnsupportedQuantConfig { ref node, .. } if node == "t"));
}

#[test]
fn test_lower_reports_bad_pass_name() {
    let config = PipelineConfig {
        passes: vec!["nope".into()],
        ..Default::default()
    };
    let err = lower(&quantized_mlp(), &mlp_inputs(), &config).unwrap_err();
    assert!(matches!(err, PassError::ConfigError(_)));
}

// ── Property tests ─────────────────────────────────────────────

fn rounding() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("ROUND"), Just("FLOOR"), Just("CEIL")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_quant_lowering_is_equivalent(
        b in 1i64..=6,
        signed in any::<bool>(),
        mode in rounding(),
        mantissa in prop_oneof![Just(1.0f32), Just(0.75f32), Just(0.3f32)],
        exponent in -4i32..=2,
        zero_point in -3i32..=3,
        xs in prop::collection::vec(-40.0f32..40.0, 8),
    ) {
        let scale = mantissa * 2f32.powi(exponent);
        let g = single_quant(b, signed, mode, scale, zero_point as f32, xs.len());
        let lowered = run_pipeline(&convert(&g).unwrap()).unwrap();
        let inputs = bind("x", Shape::vector(xs.len()), &xs);
        prop_assert!(verify_equivalence(&g, &lowered, &inputs, &VerifyConfig::default()).is_ok());
    }

    #[test]
    fn prop_bipolar_lowering_matches_sign(
        scale in 0.01f32..10.0,
        xs in prop::collection::vec(-5.0f32..5.0, 1..16),
    ) {
        let mut g = Graph::new("bipolar");
        g.add_input("x", ValueInfo::new(DType::F32, Shape::vector(xs.len()))).unwrap();
        g.add_initializer("s", Tensor::scalar_f32(scale)).unwrap();
        g.add_node(Node::new("bq", OpKind::BipolarQuant).with_inputs(["x", "s"]).with_outputs(["y"]))
            .unwrap();
        g.add_output("y").unwrap();
        let inputs = bind("x", Shape::vector(xs.len()), &xs);
        let expected = execute(&g, &inputs).unwrap();
        let actual = execute(&convert(&g).unwrap(), &inputs).unwrap();
        prop_assert_eq!(&expected["y"], &actual["y"]);
    }
}
