//! Operator catalog tests: shape inference, validity, and the parameter
//! round-trip invariant (invariant 8).

use flexflow_pcg::catalog::{
    infer, is_valid, params_of, Activation, AggregateAttrs, ConcatAttrs, Conv2DAttrs,
    ElementBinaryAttrs, ElementBinaryOp, LinearAttrs, OpAttrs, OpKind, ReshapeAttrs,
};
use flexflow_pcg::pcg::{Operator, OperatorId};
use flexflow_pcg::tensor::{DataType, ParallelDim, ParallelTensorShape, TensorId};

fn shape(dims: Vec<u64>) -> ParallelTensorShape {
    ParallelTensorShape::new(dims.into_iter().map(ParallelDim::unsplit).collect(), DataType::Float)
}

// ============================================================================
// Shape inference
// ============================================================================

#[test]
fn conv2d_infers_spatial_dims() {
    let input = shape(vec![1, 3, 32, 32]);
    let attrs = OpAttrs::Conv2D(Conv2DAttrs {
        out_channels: 16,
        kernel_h: 3,
        kernel_w: 3,
        stride_h: 1,
        stride_w: 1,
        padding_h: 1,
        padding_w: 1,
        groups: 1,
        activation: Activation::Relu,
        use_bias: true,
    });
    let out = infer(OpKind::Conv2D, &[input], &attrs).unwrap();
    let dims: Vec<u64> = out[0].dims.iter().map(|d| d.size).collect();
    assert_eq!(dims, vec![1, 16, 32, 32]);
}

#[test]
fn concat_sums_axis_dim() {
    let a = shape(vec![4, 8]);
    let b = shape(vec![4, 16]);
    let attrs = OpAttrs::Concat(ConcatAttrs { axis: 1 });
    let out = infer(OpKind::Concat, &[a, b], &attrs).unwrap();
    assert_eq!(out[0].dims[1].size, 24);
}

#[test]
fn element_binary_rejects_mismatched_shapes() {
    let a = shape(vec![4, 8]);
    let b = shape(vec![4, 9]);
    let attrs = OpAttrs::ElementBinary(ElementBinaryAttrs {
        op: ElementBinaryOp::Add,
    });
    assert!(!is_valid(OpKind::ElementBinary, &[a, b], &attrs));
}

#[test]
fn reshape_rejects_non_divisible_inferred_dim() {
    let input = shape(vec![2, 3]); // 6 elements total
    let attrs = OpAttrs::Reshape(ReshapeAttrs {
        shape: vec![4, -1],
    });
    assert!(infer(OpKind::Reshape, &[input], &attrs).is_err());
}

// ============================================================================
// Aggregate (S2)
// ============================================================================

#[test]
fn aggregate_attrs_are_equal_to_reconstructed_copy() {
    let attrs = AggregateAttrs {
        n: 3,
        lambda_bal: 0.1,
    };
    let reconstructed = AggregateAttrs { ..attrs };
    assert_eq!(attrs, reconstructed);
}

// ============================================================================
// Invariant 8: parameter round-trip
// ============================================================================

#[test]
fn param_round_trip_holds_for_linear() {
    let attrs = OpAttrs::Linear(LinearAttrs {
        out_channels: 32,
        activation: Activation::Gelu,
        use_bias: false,
    });
    let op = Operator {
        id: OperatorId(0),
        kind: OpKind::Linear,
        attrs: attrs.clone(),
        inputs: vec![],
        needs_gradient: vec![],
        outputs: vec![TensorId(0)],
        weights: vec![],
        machine_view: None,
        in_place: false,
    };
    let extracted = params_of(&op).expect("linear participates in rewrites");
    let reconstructed = flexflow_pcg::catalog::construct(extracted);
    assert_eq!(reconstructed, attrs);
}

#[test]
fn non_participating_kinds_return_no_params() {
    let op = Operator {
        id: OperatorId(0),
        kind: OpKind::Noop,
        attrs: OpAttrs::Noop,
        inputs: vec![],
        needs_gradient: vec![],
        outputs: vec![TensorId(0)],
        weights: vec![],
        machine_view: None,
        in_place: false,
    };
    assert!(params_of(&op).is_none());
}
