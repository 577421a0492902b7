// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The reference interpreter with a type-state–enforced pipeline.
//!
//! ```text
//! Interpreter<Idle>
//!     │  .prepare(&graph)
//!     ▼
//! Interpreter<Ready<'g>>
//!     │  .run(&bindings)   (any number of times, from any thread)
//!     ▼
//!   ExecutionOutput
//! ```
//!
//! `prepare` validates the graph, fixes the execution order and resolves
//! every operator handler once, so `run` cannot hit an unsupported operator
//! halfway through.

use crate::registry::{registry, OpHandler};
use crate::{ExecutionError, ExecutionMetrics, RuntimeConfig};
use model_ir::{Graph, Node};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tensor_core::Tensor;

/// Named tensors, ordered by name.
pub type TensorMap = BTreeMap<String, Tensor>;

// ── Type-state markers ─────────────────────────────────────────

/// No graph attached yet.
#[derive(Debug)]
pub struct Idle;

/// Bound to a validated graph with a fixed schedule.
#[derive(Debug)]
pub struct Ready<'g> {
    graph: &'g Graph,
    steps: Vec<Step<'g>>,
}

/// Sealed trait for interpreter states.
pub trait EngineState: std::fmt::Debug {}
impl EngineState for Idle {}
impl EngineState for Ready<'_> {}

/// One scheduled node and the intermediates that die after it.
struct Step<'g> {
    node: &'g Node,
    handler: &'static dyn OpHandler,
    release: Vec<&'g str>,
}

impl std::fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("node", &self.node.name)
            .field("release", &self.release)
            .finish()
    }
}

// ── Output ─────────────────────────────────────────────────────

/// The result of one run.
#[derive(Debug)]
pub struct ExecutionOutput {
    /// Graph outputs by name.
    pub outputs: TensorMap,
    /// Every other computed tensor, when `keep_intermediates` is set.
    pub intermediates: TensorMap,
    /// Per-node metrics, when `enable_profiling` is set.
    pub metrics: Option<ExecutionMetrics>,
}

// ── Interpreter ────────────────────────────────────────────────

/// Executes a graph on concrete inputs.
///
/// # Example
/// ```
/// use model_ir::{Graph, Node, OpKind, ValueInfo};
/// use runtime::{Interpreter, RuntimeConfig, TensorMap};
/// use tensor_core::{DType, Shape, Tensor};
///
/// let mut graph = Graph::new("relu");
/// graph.add_input("x", ValueInfo::new(DType::F32, Shape::vector(2))).unwrap();
/// graph
///     .add_node(Node::new("act", OpKind::Relu).with_inputs(["x"]).with_outputs(["y"]))
///     .unwrap();
/// graph.add_output("y").unwrap();
///
/// let interpreter = Interpreter::new(RuntimeConfig::default()).prepare(&graph).unwrap();
/// let mut inputs = TensorMap::new();
/// inputs.insert("x".into(), Tensor::from_f32(Shape::vector(2), &[-1.0, 2.0]).unwrap());
/// let out = interpreter.run(&inputs).unwrap();
/// assert_eq!(out.outputs["y"].to_f32_vec(), vec![0.0, 2.0]);
/// ```
pub struct Interpreter<S: EngineState = Idle> {
    config: RuntimeConfig,
    state: S,
}

// ── Idle → Ready ───────────────────────────────────────────────

impl Interpreter<Idle> {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config, state: Idle }
    }

    /// Validates `graph`, orders the nodes that reach a graph output and
    /// resolves their handlers. Transitions to the `Ready` state.
    ///
    /// # Errors
    /// Structural errors from validation, and
    /// [`ExecutionError::UnsupportedOp`] for a reachable node whose kind
    /// has no handler.
    #[tracing::instrument(skip_all, fields(graph = %graph.name))]
    pub fn prepare(self, graph: &Graph) -> Result<Interpreter<Ready<'_>>, ExecutionError> {
        graph.validate()?;
        let order = graph.topo_indices()?;
        let live = graph.live_indices();
        let registry = registry();

        let mut steps = Vec::with_capacity(live.len());
        for idx in order.into_iter().filter(|i| live.contains(i)) {
            let node = &graph.nodes()[idx];
            let handler = registry
                .get(&node.op)
                .ok_or_else(|| ExecutionError::UnsupportedOp {
                    node: node.name.clone(),
                    op: node.op.to_string(),
                })?;
            steps.push(Step {
                node,
                handler,
                release: Vec::new(),
            });
        }

        if !self.config.keep_intermediates {
            schedule_releases(graph, &mut steps);
        }

        tracing::debug!(
            steps = steps.len(),
            skipped = graph.nodes().len() - steps.len(),
            "interpreter prepared"
        );
        Ok(Interpreter {
            config: self.config,
            state: Ready { graph, steps },
        })
    }
}

/// Marks each intermediate for release after the last step that reads it
/// (or after its producer, if nothing reads it). Graph outputs are kept.
fn schedule_releases<'g>(graph: &'g Graph, steps: &mut [Step<'g>]) {
    let mut last_use: HashMap<&'g str, usize> = HashMap::new();
    for (pos, step) in steps.iter().enumerate() {
        for out in &step.node.outputs {
            last_use.insert(out.as_str(), pos);
        }
    }
    for (pos, step) in steps.iter().enumerate() {
        for input in &step.node.inputs {
            if let Some(last) = last_use.get_mut(input.as_str()) {
                *last = (*last).max(pos);
            }
        }
    }
    for (name, pos) in last_use {
        if !graph.is_output(name) {
            steps[pos].release.push(name);
        }
    }
    for step in steps.iter_mut() {
        step.release.sort_unstable();
    }
}

// ── Ready: run ─────────────────────────────────────────────────

impl<'g> Interpreter<Ready<'g>> {
    pub fn graph(&self) -> &'g Graph {
        self.state.graph
    }

    /// Names of the scheduled nodes in execution order.
    pub fn execution_order(&self) -> Vec<&'g str> {
        self.state.steps.iter().map(|s| s.node.name.as_str()).collect()
    }

    /// Executes the graph on `bindings` (graph-input name → tensor).
    ///
    /// # Errors
    /// - [`ExecutionError::MissingInput`] / [`ExecutionError::UnknownInput`]
    ///   / [`ExecutionError::InputMismatch`] for bad bindings.
    /// - [`ExecutionError::NumericOverflow`] when an integer result leaves
    ///   its range.
    /// - [`ExecutionError::Kernel`] for any other kernel failure.
    pub fn run(&self, bindings: &TensorMap) -> Result<ExecutionOutput, ExecutionError> {
        let run_start = Instant::now();
        let graph = self.state.graph;
        self.check_bindings(bindings)?;

        let profiling = self.config.enable_profiling;
        let mut metrics = ExecutionMetrics::new();
        let mut env: HashMap<&'g str, Tensor> = HashMap::new();
        let mut live_bytes = 0usize;

        for step in &self.state.steps {
            let node = step.node;
            let (outputs, elapsed) = {
                let mut inputs = Vec::with_capacity(node.inputs.len());
                for name in &node.inputs {
                    let t = resolve(&env, bindings, graph, name).ok_or_else(|| ExecutionError::MissingValue {
                        node: node.name.clone(),
                        tensor: name.clone(),
                    })?;
                    inputs.push(t);
                }
                let start = Instant::now();
                let outputs = step.handler.eval(node, &inputs)?;
                (outputs, start.elapsed())
            };
            if outputs.len() != node.outputs.len() {
                return Err(ExecutionError::InvalidOperands {
                    node: node.name.clone(),
                    op: node.op.to_string(),
                    detail: format!(
                        "operator produced {} outputs, node declares {}",
                        outputs.len(),
                        node.outputs.len()
                    ),
                });
            }

            let produced: usize = outputs.iter().map(Tensor::size_bytes).sum();
            tracing::debug!(node = %node.name, op = %node.op, bytes = produced, "evaluated");
            live_bytes += produced;
            for (name, tensor) in node.outputs.iter().zip(outputs) {
                env.insert(name.as_str(), tensor);
            }
            if profiling {
                metrics.record_node(node.name.clone(), node.op.to_string(), elapsed, produced);
                metrics.observe_live_bytes(live_bytes);
            }

            for name in &step.release {
                if let Some(t) = env.remove(name) {
                    live_bytes -= t.size_bytes();
                    metrics.released_tensors += 1;
                }
            }
        }

        let mut outputs = TensorMap::new();
        for name in graph.outputs() {
            if outputs.contains_key(name) {
                continue;
            }
            let tensor = match env.remove(name.as_str()) {
                Some(t) => t,
                None => resolve(&env, bindings, graph, name)
                    .cloned()
                    .ok_or_else(|| ExecutionError::MissingValue {
                        node: "<graph output>".into(),
                        tensor: name.clone(),
                    })?,
            };
            outputs.insert(name.clone(), tensor);
        }

        let intermediates = if self.config.keep_intermediates {
            env.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
        } else {
            TensorMap::new()
        };

        let metrics = profiling.then(|| {
            metrics.finalise(run_start.elapsed());
            tracing::info!("{}", metrics.summary());
            metrics
        });
        Ok(ExecutionOutput {
            outputs,
            intermediates,
            metrics,
        })
    }

    fn check_bindings(&self, bindings: &TensorMap) -> Result<(), ExecutionError> {
        let graph = self.state.graph;
        if let Some(extra) = bindings.keys().find(|k| !graph.is_input(k)) {
            return Err(ExecutionError::UnknownInput { input: extra.clone() });
        }
        for name in graph.inputs() {
            let tensor = bindings
                .get(name)
                .ok_or_else(|| ExecutionError::MissingInput { input: name.clone() })?;
            let declared = graph.value_info(name).unwrap_or_default();
            if let Some(dtype) = declared.dtype {
                if dtype != tensor.dtype() {
                    return Err(ExecutionError::InputMismatch {
                        input: name.clone(),
                        detail: format!("declared {dtype}, bound {}", tensor.dtype()),
                    });
                }
            }
            if let Some(shape) = declared.shape {
                if &shape != tensor.shape() {
                    return Err(ExecutionError::InputMismatch {
                        input: name.clone(),
                        detail: format!("declared shape {shape}, bound {}", tensor.shape()),
                    });
                }
            }
        }
        Ok(())
    }
}

fn resolve<'a>(
    env: &'a HashMap<&str, Tensor>,
    bindings: &'a TensorMap,
    graph: &'a Graph,
    name: &str,
) -> Option<&'a Tensor> {
    env.get(name)
        .or_else(|| bindings.get(name))
        .or_else(|| graph.get_tensor(name))
}

impl<S: EngineState> std::fmt::Debug for Interpreter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

/// Executes `graph` once with the default configuration and returns its
/// outputs.
pub fn execute(graph: &Graph, bindings: &TensorMap) -> Result<TensorMap, ExecutionError> {
    let interpreter = Interpreter::new(RuntimeConfig::default()).prepare(graph)?;
    Ok(interpreter.run(bindings)?.outputs)
}
