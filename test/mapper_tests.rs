//! Region Mapper integration tests: disjointness/completeness edge cases and
//! the specialized weight-mapping variants.

use flexflow_pcg::mapper::{map_conv_weight, map_linear_weight, map_shadow, map_tensor};
use flexflow_pcg::tensor::{DataType, ParallelDim, ParallelTensorShape, SyncMode, TensorId};

#[test]
fn non_divisible_split_without_aliasing_is_rejected() {
    // size=7 split 2 ways has no exact tiling: ceil(7/2)=4, 4*2=8 > 7.
    let shape = ParallelTensorShape::new(
        vec![ParallelDim::split(7, 2, 0)],
        DataType::Float,
    );
    let err = map_tensor(TensorId(0), &shape, 1, None).unwrap_err();
    assert_eq!(
        err,
        flexflow_pcg::error::MapperError::NotDisjoint(TensorId(0))
    );
}

#[test]
fn aliased_dim_relaxes_the_disjointness_check() {
    let shape = ParallelTensorShape::new(
        vec![ParallelDim::split(7, 2, 0)],
        DataType::Float,
    );
    let mapping = map_tensor(TensorId(0), &shape, 1, Some(0)).unwrap();
    assert!(!mapping.is_disjoint());
    assert_eq!(mapping.aliased_dim, Some(0));
}

#[test]
fn shadow_mapping_mirrors_the_primary_index_space() {
    let shape = ParallelTensorShape::new(
        vec![ParallelDim::split(16, 4, 0), ParallelDim::unsplit(8)],
        DataType::Float,
    );
    let primary = map_tensor(TensorId(1), &shape, 2, None).unwrap();
    let shadow = map_shadow(TensorId(1), &shape, 2).unwrap();
    assert_eq!(primary.rect, shadow.rect);
    assert_eq!(primary.tile_extents, shadow.tile_extents);
}

#[test]
fn conv_weight_replicates_noncompute_axes_under_collective_sync() {
    let shape = ParallelTensorShape::new(
        vec![
            ParallelDim::split(2, 2, 0),
            ParallelDim::unsplit(16),
            ParallelDim::unsplit(3),
            ParallelDim::split(3, 1, 2),
        ],
        DataType::Float,
    );
    let solo = map_conv_weight(TensorId(0), &shape, SyncMode::ParameterServer).unwrap();
    let collective = map_conv_weight(TensorId(0), &shape, SyncMode::Collective).unwrap();
    assert!(collective.tile_extents[1] >= solo.tile_extents[1]);
}
