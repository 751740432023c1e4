//! flexflow-pcg — Parallel Computation Graph construction, rewriting, and
//! cost-driven search engine for distributed deep-learning compilation.
//!
//! This crate implements the hardest, most design-dense subsystem of a
//! FlexFlow-style compiler: turning a logical layer graph into a Parallel
//! Computation Graph, searching for a good device assignment via simulated
//! annealing, fusing compatible operators, and mapping the result onto
//! index-space-partitioned regions for a task-based distributed runtime.
//!
//! # Example
//!
//! ```rust
//! use flexflow_pcg::catalog::{Activation, LinearAttrs, OpAttrs, OpKind};
//! use flexflow_pcg::config::FlexFlowConfig;
//! use flexflow_pcg::lift::{Layer, LayerGraph, LayerId, LayerTensorRef};
//! use flexflow_pcg::model::{compile, Model};
//! use flexflow_pcg::tensor::DataType;
//!
//! let mut model = Model::new();
//! let input_id = LayerId(0);
//! let linear_id = LayerId(1);
//! let layers = LayerGraph {
//!     layers: vec![
//!         Layer {
//!             id: input_id,
//!             kind: OpKind::Input,
//!             attrs: OpAttrs::Input,
//!             inputs: vec![],
//!             logical_shape: vec![64, 128],
//!             data_type: DataType::Float,
//!         },
//!         Layer {
//!             id: linear_id,
//!             kind: OpKind::Linear,
//!             attrs: OpAttrs::Linear(LinearAttrs {
//!                 out_channels: 64,
//!                 activation: Activation::Relu,
//!                 use_bias: true,
//!             }),
//!             inputs: vec![LayerTensorRef { producer: input_id, slot: 0 }],
//!             logical_shape: vec![64, 64],
//!             data_type: DataType::Float,
//!         },
//!     ],
//! };
//!
//! let mut config = FlexFlowConfig::default();
//! config.num_nodes = Some(4);
//! config.workers_per_node = 1;
//! config.only_data_parallel = true;
//!
//! let compiled = compile(&mut model, &layers, &config).unwrap();
//! assert!(!compiled.pcg.operators.is_empty());
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Layer graph  │  user-built DAG of logical layers
//! └──────┬───────┘
//!        │ lift (C3)
//!        ▼
//! ┌──────────────┐
//! │     PCG      │  operator DAG over parallel tensors (C4)
//! └──────┬───────┘
//!        │ MCMC search (C7), scored by the simulator (C6)
//!        ▼
//! ┌──────────────┐
//! │ best PCG     │
//! └──────┬───────┘
//!        │ fusion (C9) → region mapping (C8)
//!        ▼
//! ┌──────────────┐
//! │ serialized   │  handed to the external task runtime (C10)
//! └──────────────┘
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod assign;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fusion;
pub mod lift;
pub mod mapper;
pub mod model;
pub mod pcg;
pub mod search;
pub mod serializer;
pub mod simulator;
pub mod tensor;

pub use catalog::{infer, is_valid, params_of, OpAttrs, OpKind};
pub use config::{ComputationMode, FlexFlowConfig};
pub use error::FlexFlowError;
pub use lift::{lift, Layer, LayerGraph, LayerId, LayerTensorRef};
pub use model::{compile, CompiledModel, Model, NoopTaskRuntime, TaskRuntime};
pub use pcg::{MachineView, Operator, OperatorId, Pcg};
pub use tensor::{DataType, ParallelTensor, ParallelTensorShape, TensorId};
