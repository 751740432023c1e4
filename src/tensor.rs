//! Parallel Tensor Model (C1).
//!
//! Shapes, partition descriptors, ownership and the region/partition handles
//! later populated by the region mapper (C8).

use serde::{Deserialize, Serialize};

use crate::error::TensorError;
use crate::pcg::OperatorId;

/// Closed set of element types a tensor may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Half,
    Float,
    Double,
    Int32,
    Int64,
}

impl DataType {
    /// Size in bytes of a single element.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Half => 2,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::Int32 => 4,
            DataType::Int64 => 8,
        }
    }
}

/// Globally unique id for a parallel tensor, allocated from [`crate::model::Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId(pub u64);

/// A single dimension of a [`ParallelTensorShape`]: `(size, degree, parallel_idx, is_replica)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelDim {
    pub size: u64,
    pub degree: u64,
    pub parallel_idx: i32,
    pub is_replica: bool,
}

impl ParallelDim {
    /// An unsplit dimension of the given size.
    pub fn unsplit(size: u64) -> Self {
        ParallelDim {
            size,
            degree: 1,
            parallel_idx: -1,
            is_replica: false,
        }
    }

    /// A replica dimension of logical size 1, used for batch replication at `OP_INPUT`.
    pub fn replica() -> Self {
        ParallelDim {
            size: 1,
            degree: 1,
            parallel_idx: -1,
            is_replica: true,
        }
    }

    /// A dimension split `degree`-ways along machine axis `parallel_idx`.
    pub fn split(size: u64, degree: u64, parallel_idx: i32) -> Self {
        ParallelDim {
            size,
            degree,
            parallel_idx,
            is_replica: false,
        }
    }
}

/// Ordered sequence of parallel dimensions plus a data type.
///
/// Invariants (checked by [`ParallelTensorShape::validate`]):
/// (a) the product of `degree` across dims ≤ total device count;
/// (b) every non-negative `parallel_idx` appears on at most one dimension;
/// (c) a dimension with `degree > 1` has `parallel_idx >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelTensorShape {
    pub dims: Vec<ParallelDim>,
    pub data_type: DataType,
}

impl ParallelTensorShape {
    pub fn new(dims: Vec<ParallelDim>, data_type: DataType) -> Self {
        ParallelTensorShape { dims, data_type }
    }

    /// Logical rank, excluding nothing — replica dims still occupy a dimension slot.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Logical shape with replica dimensions dropped, for comparing against an
    /// unparallelized layer output shape (invariant 3, `spec.md` §8).
    pub fn logical_dims(&self) -> Vec<u64> {
        self.dims
            .iter()
            .filter(|d| !d.is_replica)
            .map(|d| d.size)
            .collect()
    }

    /// Total number of devices this shape is sharded across.
    pub fn degree_product(&self) -> u64 {
        self.dims.iter().map(|d| d.degree).product()
    }

    pub fn validate(&self, device_count: u64) -> Result<(), TensorError> {
        let product = self.degree_product();
        if product > device_count {
            return Err(TensorError::TooManyDevices {
                product,
                device_count,
            });
        }

        let mut seen_idx = std::collections::HashSet::new();
        for (dim, d) in self.dims.iter().enumerate() {
            if !d.is_replica && d.degree > 1 && d.size % d.degree != 0 {
                return Err(TensorError::NotDivisible {
                    dim,
                    size: d.size,
                    degree: d.degree,
                });
            }
            if d.degree > 1 && d.parallel_idx < 0 {
                return Err(TensorError::MissingParallelIdx { dim });
            }
            if d.parallel_idx >= 0 && !seen_idx.insert(d.parallel_idx) {
                return Err(TensorError::DuplicateParallelIdx { idx: d.parallel_idx });
            }
        }
        Ok(())
    }
}

/// Where a weight tensor's values come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Zero,
    Constant(f64),
    Uniform { lo: f64, hi: f64 },
    Normal { mean: f64, stddev: f64 },
    GlorotUniform,
    Kaiming,
}

/// How a weight tensor's gradient updates are synchronized across replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    ParameterServer,
    Collective,
}

/// A region handle populated by the region mapper (C8). Plain data: the task
/// runtime's actual region objects are an external collaborator, so this core
/// only tracks enough to answer "same region?" / "disjoint?" queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionHandle {
    pub region_id: u64,
    pub partition_id: u64,
}

/// Extra fields present only on weight tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightMeta {
    pub initializer: Initializer,
    pub sync_mode: SyncMode,
}

/// A parallel tensor: a shape plus identity, ownership, and (post-mapping)
/// region handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelTensor {
    pub id: TensorId,
    pub shape: ParallelTensorShape,
    pub owner_op: OperatorId,
    pub owner_idx: usize,
    pub create_gradient: bool,
    pub region: Option<RegionHandle>,
    pub shadow_region: Option<RegionHandle>,
    pub weight_meta: Option<WeightMeta>,
}

impl ParallelTensor {
    pub fn is_weight(&self) -> bool {
        self.weight_meta.is_some()
    }
}
