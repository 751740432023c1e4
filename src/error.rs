//! Crate-wide error types.
//!
//! Each component owns a narrow error enum naming the offending operator or
//! tensor; [`FlexFlowError`] aggregates them for callers that drive the full
//! compile pipeline and don't care which stage failed.

use thiserror::Error;

use crate::catalog::OpKind;
use crate::tensor::TensorId;

/// Errors raised while constructing or validating a [`crate::tensor::ParallelTensorShape`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TensorError {
    #[error("dimension {dim} has size {size} not divisible by degree {degree}")]
    NotDivisible { dim: usize, size: u64, degree: u64 },

    #[error("parallel_idx {idx} used by more than one dimension")]
    DuplicateParallelIdx { idx: i32 },

    #[error("dimension {dim} has degree {degree} > 1 but parallel_idx < 0")]
    MissingParallelIdx { dim: usize },

    #[error("product of degrees {product} exceeds device count {device_count}")]
    TooManyDevices { product: u64, device_count: u64 },
}

/// Errors raised by the operator catalog (C2).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("operator {kind:?} rejected its inputs: {reason}")]
    InvalidInputs { kind: OpKind, reason: String },

    #[error("operator {kind:?} has no attribute record to extract parameters from")]
    NoParams { kind: OpKind },

    #[error("operator {kind:?} expected {expected} inputs, got {actual}")]
    WrongArity {
        kind: OpKind,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised while lifting a logical layer graph into a PCG (C3).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LiftError {
    #[error("layer references output tensor {0:?} that was never produced")]
    UnknownTensor(TensorId),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// Errors raised while assigning or mutating `ParallelConfig`s (C5).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssignError {
    #[error("parallel config for operator {op:?} has {got} dims, operator requires {want}")]
    DimMismatch {
        op: crate::pcg::OperatorId,
        got: usize,
        want: usize,
    },

    #[error("device id count {got} does not equal product of degrees {want}")]
    DeviceCountMismatch { got: usize, want: usize },

    #[error("degree {degree} does not divide tensor size {size} on dim {dim}")]
    DegreeNotDivisible { dim: usize, size: u64, degree: u64 },

    #[error("no eligible operator to mutate in a PCG with {0} operators")]
    NothingToMutate(usize),
}

/// Errors raised while mapping parallel tensors to regions (C8).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapperError {
    #[error("partition for tensor {0:?} is not disjoint")]
    NotDisjoint(TensorId),

    #[error("partition for tensor {0:?} is not complete")]
    NotComplete(TensorId),

    #[error("conv-weight mapping requires num_par_c == 1, got {0}")]
    ChannelPartitioned(u64),
}

/// Errors raised by the fusion pass (C9). Always a bug, never bad user input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FusionError {
    #[error("integrity check failed: operator {0:?} present in old list is missing from new list")]
    MissingOperator(crate::pcg::OperatorId),

    #[error("fused operator {0:?} exposes a tensor slot whose region does not match its sub-op's")]
    RegionMismatch(crate::pcg::OperatorId),

    #[error("fused operator would exceed bounded slot counts: {0}")]
    SlotOverflow(String),
}

/// Errors raised by the graph serializer (C10).
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("bincode encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

/// Aggregate error type for the full compile pipeline.
#[derive(Debug, Error)]
pub enum FlexFlowError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Lift(#[from] LiftError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Fusion(#[from] FusionError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
