//! The `Model` aggregate: owns the monotonic id allocators for operators,
//! tensors and layers (`spec.md` §5, §9 "Global mutable id allocators"), the
//! compiled tensor table, and drives the end-to-end compile pipeline.

use std::collections::HashMap;

use rand::SeedableRng;
use tracing::info;

use crate::assign::Assignment;
use crate::catalog::OpKind;
use crate::config::{ComputationMode, FlexFlowConfig};
use crate::error::FlexFlowError;
use crate::fusion;
use crate::lift::{self, LayerGraph, LayerId};
use crate::mapper;
use crate::pcg::{OperatorId, Pcg};
use crate::search::{self, SearchParams, SearchResult};
use crate::serializer::{self, SerializedPcg};
use crate::simulator::{AnalyticalSimulator, Simulator};
use crate::tensor::{ParallelTensor, RegionHandle, SyncMode, TensorId};

/// Monotonic id allocators threaded through every constructor, per the
/// "Global mutable id allocators" design note — never process-wide statics.
#[derive(Debug, Default)]
pub struct Model {
    next_operator_id: u64,
    next_tensor_id: u64,
    next_layer_id: u64,
    pub tensors: HashMap<TensorId, ParallelTensor>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn alloc_operator(&mut self) -> OperatorId {
        let id = OperatorId(self.next_operator_id);
        self.next_operator_id += 1;
        id
    }

    pub fn alloc_tensor(&mut self) -> TensorId {
        let id = TensorId(self.next_tensor_id);
        self.next_tensor_id += 1;
        id
    }

    pub fn alloc_layer(&mut self) -> LayerId {
        let id = LayerId(self.next_layer_id);
        self.next_layer_id += 1;
        id
    }
}

/// A fully compiled model: the final PCG, its parallel-config assignment,
/// and the serialized byte buffer handed to the task runtime.
pub struct CompiledModel {
    pub pcg: Pcg,
    pub assignment: Assignment,
    pub serialized: SerializedPcg,
    pub metrics: HashMap<String, f64>,
}

/// External collaborator boundary (`spec.md` §1, §6): the actual distributed
/// task runtime is out of scope. The core provides this trait and a no-op
/// test double, not a real implementation.
pub trait TaskRuntime {
    fn forward(&mut self, model: &CompiledModel, seq_length: u64);
    fn backward(&mut self, model: &CompiledModel, seq_length: u64);
    fn update(&mut self, model: &CompiledModel);
    fn zero_gradients(&mut self, model: &CompiledModel);
}

/// A runtime double that performs no launches; useful for tests and for
/// driving the compile pipeline without a real cluster.
#[derive(Debug, Default)]
pub struct NoopTaskRuntime;

impl TaskRuntime for NoopTaskRuntime {
    fn forward(&mut self, _model: &CompiledModel, _seq_length: u64) {}
    fn backward(&mut self, _model: &CompiledModel, _seq_length: u64) {}
    fn update(&mut self, _model: &CompiledModel) {}
    fn zero_gradients(&mut self, _model: &CompiledModel) {}
}

impl CompiledModel {
    pub fn forward(&self, runtime: &mut dyn TaskRuntime, seq_length: u64) {
        runtime.forward(self, seq_length);
    }

    pub fn backward(&self, runtime: &mut dyn TaskRuntime, seq_length: u64) {
        runtime.backward(self, seq_length);
    }

    pub fn update(&self, runtime: &mut dyn TaskRuntime) {
        runtime.update(self);
    }

    pub fn zero_gradients(&self, runtime: &mut dyn TaskRuntime) {
        runtime.zero_gradients(self);
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.clear();
    }

    pub fn get_metrics(&self) -> &HashMap<String, f64> {
        &self.metrics
    }
}

/// Run the full compile pipeline: lift → search → fusion → map → serialize
/// (`spec.md` §2 "Control flow at compile time").
pub fn compile(
    model: &mut Model,
    layers: &LayerGraph,
    config: &FlexFlowConfig,
) -> Result<CompiledModel, FlexFlowError> {
    let device_count = config
        .num_nodes
        .map(|n| n as u64 * config.workers_per_node.max(1) as u64)
        .unwrap_or(1)
        .max(1);

    info!(device_count, "lifting layer graph into PCG");
    let weight_sync_mode = if config.enable_control_replication {
        SyncMode::Collective
    } else {
        SyncMode::ParameterServer
    };
    let mut pcg = Pcg::new();
    lift::lift(
        layers,
        model,
        &mut pcg,
        device_count,
        config.only_data_parallel,
        weight_sync_mode,
    )?;

    let shapes: HashMap<OperatorId, crate::tensor::ParallelTensorShape> = pcg
        .operators
        .iter()
        .filter_map(|op| {
            let tid = *op.outputs.first()?;
            model.tensors.get(&tid).map(|t| (op.id, t.shape.clone()))
        })
        .collect();

    let initial = Assignment::initial(&pcg, &shapes, device_count);

    let search_shapes: HashMap<OperatorId, Vec<crate::tensor::ParallelTensorShape>> = pcg
        .operators
        .iter()
        .map(|op| {
            let out_shapes = op
                .outputs
                .iter()
                .filter_map(|tid| model.tensors.get(tid).map(|t| t.shape.clone()))
                .collect();
            (op.id, out_shapes)
        })
        .collect();
    let simulator = AnalyticalSimulator::new(search_shapes);

    let budget = config.search_budget.unwrap_or(0);
    let result: SearchResult = if budget > 0 {
        info!(budget, alpha = config.search_alpha, "running MCMC search");
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        let stop = std::sync::atomic::AtomicBool::new(false);
        search::search(
            &pcg,
            &shapes,
            &simulator,
            initial.clone(),
            SearchParams {
                budget,
                alpha: config.search_alpha,
                device_count,
                mode: config.computation_mode,
            },
            &mut rng,
            &stop,
        )
    } else {
        let cost = simulator.simulate_runtime(&pcg, &initial, config.computation_mode);
        SearchResult {
            best: initial.clone(),
            best_cost: cost,
            best_cost_trace: vec![cost],
        }
    };

    // Lower the searched assignment into each operator's machine view before
    // in-place marking / fusion / mapping, all of which key off it (§2
    // control flow: "best PCG fed to fusion -> mapping" carries the search's
    // chosen assignment, not the lifter's placeholder `None`).
    for op in pcg.operators.iter_mut() {
        if let Some(cfg) = result.best.get(op.id) {
            op.machine_view = Some(cfg.to_machine_view());
        }
    }
    fusion::mark_inplace(&mut pcg);

    if config.perform_fusion {
        info!("running fusion pass");
        fusion::fuse_to_fixpoint(&mut pcg)?;
    }

    info!("mapping parallel tensors to regions");
    let training = config.computation_mode == ComputationMode::Training;
    for tensor in model.tensors.values_mut() {
        let task_space_rank = tensor.shape.rank().max(1);
        let owner_kind = pcg.get(tensor.owner_op).map(|op| op.kind);
        let sync_mode = tensor.weight_meta.as_ref().map(|w| w.sync_mode);

        match (owner_kind, sync_mode) {
            (Some(OpKind::Linear), Some(sync_mode)) => {
                mapper::map_linear_weight(tensor.id, &tensor.shape, task_space_rank, sync_mode)?;
            }
            (Some(OpKind::Conv2D), Some(sync_mode)) if tensor.shape.rank() == 4 => {
                mapper::map_conv_weight(tensor.id, &tensor.shape, sync_mode)?;
            }
            _ => {
                mapper::map_tensor(tensor.id, &tensor.shape, task_space_rank, None)?;
            }
        }
        tensor.region = Some(RegionHandle {
            region_id: tensor.id.0,
            partition_id: 0,
        });

        if training && tensor.create_gradient {
            mapper::map_shadow(tensor.id, &tensor.shape, task_space_rank)?;
            tensor.shadow_region = Some(RegionHandle {
                region_id: tensor.id.0,
                partition_id: 1,
            });
        }
    }

    let serialized = serializer::encode(&pcg)?;
    let serialized = serializer::decode(&serialized)?;

    let mut metrics = HashMap::new();
    metrics.insert("best_cost".to_string(), result.best_cost);

    Ok(CompiledModel {
        pcg,
        assignment: result.best,
        serialized,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Activation, LinearAttrs, OpAttrs, OpKind};
    use crate::lift::Layer;

    #[test]
    fn compiles_single_linear_layer() {
        let mut model = Model::new();
        let input_id = model.alloc_layer();
        let linear_id = model.alloc_layer();

        let layers = LayerGraph {
            layers: vec![
                Layer {
                    id: input_id,
                    kind: OpKind::Input,
                    attrs: OpAttrs::Input,
                    inputs: vec![],
                    logical_shape: vec![64, 128],
                    data_type: crate::tensor::DataType::Float,
                },
                Layer {
                    id: linear_id,
                    kind: OpKind::Linear,
                    attrs: OpAttrs::Linear(LinearAttrs {
                        out_channels: 64,
                        activation: Activation::Relu,
                        use_bias: true,
                    }),
                    inputs: vec![crate::lift::LayerTensorRef {
                        producer: input_id,
                        slot: 0,
                    }],
                    logical_shape: vec![64, 64],
                    data_type: crate::tensor::DataType::Float,
                },
            ],
        };

        let mut config = FlexFlowConfig::default();
        config.num_nodes = Some(4);
        config.workers_per_node = 1;
        config.only_data_parallel = true;

        let compiled = compile(&mut model, &layers, &config).unwrap();
        assert!(compiled.pcg.operators.len() >= 3);
    }
}
