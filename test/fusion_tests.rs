//! Fusion pass integration tests (S3) plus the in-place optimization pass.

use flexflow_pcg::catalog::{Activation, DropoutAttrs, ElementUnaryAttrs, ElementUnaryOp, LinearAttrs, OpAttrs, OpKind, SoftmaxAttrs};
use flexflow_pcg::fusion::{fuse_to_fixpoint, mark_inplace};
use flexflow_pcg::pcg::{MachineView, Operator, OperatorId, Pcg, TensorRef};
use flexflow_pcg::tensor::TensorId;

fn op(id: u64, kind: OpKind, attrs: OpAttrs, input: Option<u64>, view: MachineView) -> Operator {
    Operator {
        id: OperatorId(id),
        kind,
        attrs,
        inputs: input
            .map(|p| vec![TensorRef {
                producer: OperatorId(p),
                slot: 0,
            }])
            .unwrap_or_default(),
        needs_gradient: vec![true],
        outputs: vec![TensorId(id)],
        weights: vec![],
        machine_view: Some(view),
        in_place: false,
    }
}

// ============================================================================
// S3: fusion collapses an elementwise chain
// ============================================================================

#[test]
fn scenario_s3_fusion_collapses_elementwise_chain() {
    let view = MachineView::new(vec![4], 0);

    let mut pcg = Pcg::new();
    pcg.push(op(
        0,
        OpKind::Input,
        OpAttrs::Input,
        None,
        view.clone(),
    ));
    pcg.push(op(
        1,
        OpKind::Linear,
        OpAttrs::Linear(LinearAttrs {
            out_channels: 64,
            activation: Activation::None,
            use_bias: false,
        }),
        Some(0),
        view.clone(),
    ));
    pcg.push(op(
        2,
        OpKind::ElementUnary,
        OpAttrs::ElementUnary(ElementUnaryAttrs {
            op: ElementUnaryOp::Relu,
            scalar: 0.0,
        }),
        Some(1),
        view.clone(),
    ));
    pcg.push(op(
        3,
        OpKind::Dropout,
        OpAttrs::Dropout(DropoutAttrs {
            rate: 0.1,
            seed: 0,
        }),
        Some(2),
        view.clone(),
    ));
    pcg.push(op(
        4,
        OpKind::Linear,
        OpAttrs::Linear(LinearAttrs {
            out_channels: 32,
            activation: Activation::None,
            use_bias: false,
        }),
        Some(3),
        view.clone(),
    ));
    pcg.push(op(
        5,
        OpKind::Softmax,
        OpAttrs::Softmax(SoftmaxAttrs { axis: -1 }),
        Some(4),
        view,
    ));

    fuse_to_fixpoint(&mut pcg).unwrap();

    // relu and dropout merge into the preceding linear: 6 -> fewer ops, with
    // exactly one fused op whose sub_ops list has >= 2 entries.
    let fused: Vec<_> = pcg
        .operators
        .iter()
        .filter(|o| o.kind == OpKind::Fused)
        .collect();
    assert!(!fused.is_empty());
    assert!(pcg.check_topological_soundness());
}

#[test]
fn fusion_skips_operators_marked_in_place() {
    let view = MachineView::new(vec![4], 0);
    let mut pcg = Pcg::new();
    pcg.push(op(0, OpKind::Input, OpAttrs::Input, None, view.clone()));
    pcg.push(op(
        1,
        OpKind::Linear,
        OpAttrs::Linear(LinearAttrs {
            out_channels: 8,
            activation: Activation::None,
            use_bias: false,
        }),
        Some(0),
        view.clone(),
    ));
    pcg.push(op(
        2,
        OpKind::ElementUnary,
        OpAttrs::ElementUnary(ElementUnaryAttrs {
            op: ElementUnaryOp::Relu,
            scalar: 0.0,
        }),
        Some(1),
        view,
    ));

    mark_inplace(&mut pcg);
    assert!(pcg.operators[2].in_place);

    let fused_count = fuse_to_fixpoint(&mut pcg).unwrap();
    assert_eq!(fused_count, 0);
}
