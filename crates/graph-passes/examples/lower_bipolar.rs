// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: Lower a small binarized network to MultiThreshold form.
//!
//! Builds a MatMul → Quant → MatMul → BipolarQuant graph, runs the full
//! lowering flow on one input batch and prints what changed.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p graph-passes --example lower_bipolar
//! ```

use graph_passes::{lower, PipelineConfig};
use model_ir::quant::attr;
use model_ir::{Graph, Node, OpKind, ValueInfo};
use runtime::TensorMap;
use tensor_core::{DType, Shape, Tensor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let graph = build_graph()?;
    println!("Input:   {}\n", graph.summary());

    let mut inputs = TensorMap::new();
    inputs.insert(
        "x".into(),
        Tensor::from_f32(Shape::matrix(1, 4), &[0.8, -1.3, 0.05, 2.4])?,
    );

    let mut config = PipelineConfig::default();
    config.runtime.enable_profiling = true;
    let report = lower(&graph, &inputs, &config)?;

    println!("Lowered: {}\n", report.lowered.summary());
    println!("{:<28} {:>10}", "Stage", "Time (µs)");
    println!("{}", "-".repeat(40));
    for t in &report.timings {
        println!("{:<28} {:>10}", t.stage, t.duration.as_micros());
    }
    println!();
    for (name, tensor) in &report.outputs {
        println!("{name} = {:?}  (baseline {:?})", tensor.to_f32_vec(), report.baseline[name].to_f32_vec());
    }
    if let Some(metrics) = &report.metrics {
        println!("\n{}", metrics.summary());
    }
    println!("\n{}", report.summary());
    Ok(())
}

fn build_graph() -> Result<Graph, Box<dyn std::error::Error>> {
    let mut g = Graph::new("binarized-mlp");
    g.add_input("x", ValueInfo::new(DType::F32, Shape::matrix(1, 4)))?;
    g.add_initializer(
        "w1",
        Tensor::from_f32(
            Shape::matrix(4, 4),
            &[
                0.5, -0.25, 1.0, 0.75, -1.5, 0.5, 0.25, -0.5, 1.0, 1.25, -0.75, 0.5, 0.25, -1.0, 0.5, 1.5,
            ],
        )?,
    )?;
    g.add_initializer("s1", Tensor::scalar_f32(0.125))?;
    g.add_initializer("z1", Tensor::scalar_f32(0.0))?;
    g.add_initializer("b1", Tensor::from_i64(Shape::scalar(), DType::I64, &[3])?)?;
    g.add_initializer(
        "w2",
        Tensor::from_f32(Shape::matrix(4, 2), &[1.0, -1.0, 0.5, 0.5, -0.25, 1.0, 2.0, -0.5])?,
    )?;
    g.add_initializer("s2", Tensor::scalar_f32(1.0))?;

    g.add_node(Node::new("fc1", OpKind::MatMul).with_inputs(["x", "w1"]).with_outputs(["h1"]))?;
    g.add_node(
        Node::new("act_quant", OpKind::Quant)
            .with_inputs(["h1", "s1", "z1", "b1"])
            .with_outputs(["a1"])
            .with_attr(attr::SIGNED, 0i64),
    )?;
    g.add_node(Node::new("fc2", OpKind::MatMul).with_inputs(["a1", "w2"]).with_outputs(["h2"]))?;
    g.add_node(Node::new("sign", OpKind::BipolarQuant).with_inputs(["h2", "s2"]).with_outputs(["y"]))?;
    g.add_output("y")?;
    Ok(g)
}
