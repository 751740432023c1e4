//! Region Mapper (C8): materializes parallel tensors into partitioned
//! regions for task launches (`spec.md` §4.6).

use serde::{Deserialize, Serialize};

use crate::error::MapperError;
use crate::tensor::{ParallelTensorShape, SyncMode, TensorId};

/// An `N`-dimensional axis-aligned rectangle `[0, size_i)` per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub extents: Vec<u64>,
}

/// An `N x T` transform matrix mapping task-space points to tile origins:
/// `transform[i][j] = ext_i` if `parallel_idx_i == j`, else `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rows: Vec<Vec<u64>>,
}

/// The result of mapping one tensor: its index space rect, tile extents, the
/// transform, and whether disjointness was relaxed on a named dimension
/// ("aliased partition").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMapping {
    pub tensor: TensorId,
    pub rect: Rect,
    pub tile_extents: Vec<u64>,
    pub transform: Transform,
    pub aliased_dim: Option<usize>,
}

impl RegionMapping {
    pub fn is_disjoint(&self) -> bool {
        self.aliased_dim.is_none()
    }
}

/// Map a parallel tensor onto a `task_space_rank`-dimensional task index
/// space. Steps 1-4 of `spec.md` §4.6.
pub fn map_tensor(
    tensor: TensorId,
    shape: &ParallelTensorShape,
    task_space_rank: usize,
    aliased_dim: Option<usize>,
) -> Result<RegionMapping, MapperError> {
    let extents: Vec<u64> = shape.dims.iter().map(|d| d.size).collect();
    let rect = Rect {
        extents: extents.clone(),
    };

    let tile_extents: Vec<u64> = shape
        .dims
        .iter()
        .map(|d| (d.size + d.degree - 1) / d.degree)
        .collect();

    let mut rows = vec![vec![0u64; task_space_rank]; shape.rank()];
    for (i, d) in shape.dims.iter().enumerate() {
        if d.parallel_idx >= 0 {
            let j = d.parallel_idx as usize;
            if j < task_space_rank {
                rows[i][j] = tile_extents[i];
            }
        }
    }
    let transform = Transform { rows };

    let mapping = RegionMapping {
        tensor,
        rect,
        tile_extents,
        transform,
        aliased_dim,
    };

    if mapping.is_disjoint() {
        assert_disjoint(shape, &mapping)?;
    }
    assert_complete(shape, &mapping)?;

    Ok(mapping)
}

fn assert_complete(shape: &ParallelTensorShape, mapping: &RegionMapping) -> Result<(), MapperError> {
    for (i, d) in shape.dims.iter().enumerate() {
        let covered = mapping.tile_extents[i] * d.degree;
        if covered < d.size {
            return Err(MapperError::NotComplete(mapping.tensor));
        }
    }
    Ok(())
}

fn assert_disjoint(shape: &ParallelTensorShape, mapping: &RegionMapping) -> Result<(), MapperError> {
    for (i, d) in shape.dims.iter().enumerate() {
        if mapping.tile_extents[i] * d.degree > d.size && d.size % d.degree != 0 {
            return Err(MapperError::NotDisjoint(mapping.tensor));
        }
    }
    Ok(())
}

/// If the tensor carries gradients and training is active, build a shadow
/// mapping over the same index space (step 5).
pub fn map_shadow(
    tensor: TensorId,
    shape: &ParallelTensorShape,
    task_space_rank: usize,
) -> Result<RegionMapping, MapperError> {
    map_tensor(tensor, shape, task_space_rank, None)
}

/// Linear-weight mapping: the output-channel dimension is split across the
/// first task axis. Under collective sync the region is enlarged by the
/// product of the remaining task-axis degrees so each shard owns a private
/// copy.
pub fn map_linear_weight(
    tensor: TensorId,
    shape: &ParallelTensorShape,
    task_space_rank: usize,
    sync_mode: SyncMode,
) -> Result<RegionMapping, MapperError> {
    let mut mapping = map_tensor(tensor, shape, task_space_rank, None)?;
    if sync_mode == SyncMode::Collective {
        let replication_factor: u64 = shape
            .dims
            .iter()
            .filter(|d| d.parallel_idx != 0)
            .map(|d| d.degree)
            .product::<u64>()
            .max(1);
        if let Some(first) = mapping.tile_extents.first_mut() {
            *first *= replication_factor;
        }
    }
    Ok(mapping)
}

/// Conv-weight mapping: four-dimensional task space `(N, C, H, W)`;
/// partitioning the channel axis is disallowed. Under collective sync a
/// per-(N, H, W) replica is allocated.
pub fn map_conv_weight(
    tensor: TensorId,
    shape: &ParallelTensorShape,
    sync_mode: SyncMode,
) -> Result<RegionMapping, MapperError> {
    if shape.rank() != 4 {
        return Err(MapperError::NotComplete(tensor));
    }
    let channel_degree = shape.dims[1].degree;
    if channel_degree != 1 {
        return Err(MapperError::ChannelPartitioned(channel_degree));
    }
    let mut mapping = map_tensor(tensor, shape, 4, None)?;
    if sync_mode == SyncMode::Collective {
        let replication: u64 = [0usize, 2, 3]
            .iter()
            .map(|&i| shape.dims[i].degree)
            .product::<u64>()
            .max(1);
        mapping.tile_extents[1] *= replication;
    }
    Ok(mapping)
}
