//! MCMC Search Driver integration tests (S4: search improves over the
//! naive data-parallel starting point).

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use flexflow_pcg::assign::Assignment;
use flexflow_pcg::catalog::{Activation, LinearAttrs, OpAttrs, OpKind};
use flexflow_pcg::config::ComputationMode;
use flexflow_pcg::pcg::{Operator, OperatorId, Pcg};
use flexflow_pcg::search::{search, SearchParams};
use flexflow_pcg::simulator::{AnalyticalSimulator, Simulator};
use flexflow_pcg::tensor::{DataType, ParallelDim, ParallelTensorShape, TensorId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn linear_chain() -> (Pcg, HashMap<OperatorId, Vec<ParallelTensorShape>>, HashMap<OperatorId, ParallelTensorShape>) {
    let mut pcg = Pcg::new();
    pcg.push(Operator {
        id: OperatorId(0),
        kind: OpKind::Linear,
        attrs: OpAttrs::Linear(LinearAttrs {
            out_channels: 256,
            activation: Activation::Relu,
            use_bias: false,
        }),
        inputs: vec![],
        needs_gradient: vec![],
        outputs: vec![TensorId(0)],
        weights: vec![],
        machine_view: None,
        in_place: false,
    });
    pcg.push(Operator {
        id: OperatorId(1),
        kind: OpKind::Linear,
        attrs: OpAttrs::Linear(LinearAttrs {
            out_channels: 128,
            activation: Activation::None,
            use_bias: false,
        }),
        inputs: vec![flexflow_pcg::pcg::TensorRef {
            producer: OperatorId(0),
            slot: 0,
        }],
        needs_gradient: vec![],
        outputs: vec![TensorId(1)],
        weights: vec![],
        machine_view: None,
        in_place: false,
    });

    let shape0 = ParallelTensorShape::new(
        vec![ParallelDim::unsplit(256), ParallelDim::unsplit(256)],
        DataType::Float,
    );
    let shape1 = ParallelTensorShape::new(
        vec![ParallelDim::unsplit(256), ParallelDim::unsplit(128)],
        DataType::Float,
    );

    let mut out_shapes = HashMap::new();
    out_shapes.insert(OperatorId(0), vec![shape0.clone()]);
    out_shapes.insert(OperatorId(1), vec![shape1.clone()]);

    let mut shapes = HashMap::new();
    shapes.insert(OperatorId(0), shape0);
    shapes.insert(OperatorId(1), shape1);

    (pcg, out_shapes, shapes)
}

// ============================================================================
// S4: MCMC search never ends up worse than the naive data-parallel start
// ============================================================================

#[test]
fn scenario_s4_search_does_not_regress_past_data_parallel_start() {
    let (pcg, out_shapes, shapes) = linear_chain();
    let simulator = AnalyticalSimulator::new(out_shapes);
    let initial = Assignment::initial(&pcg, &shapes, 8);
    let initial_cost = simulator.simulate_runtime(&pcg, &initial, ComputationMode::Training);

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let stop = AtomicBool::new(false);
    let params = SearchParams {
        budget: 500,
        alpha: 1.0,
        device_count: 8,
        mode: ComputationMode::Training,
    };
    let result = search(&pcg, &shapes, &simulator, initial, params, &mut rng, &stop);

    assert!(result.best_cost <= initial_cost);
}

#[test]
fn search_with_zero_budget_returns_the_initial_assignment_unchanged() {
    let (pcg, out_shapes, shapes) = linear_chain();
    let simulator = AnalyticalSimulator::new(out_shapes);
    let initial = Assignment::initial(&pcg, &shapes, 8);

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let stop = AtomicBool::new(false);
    let params = SearchParams {
        budget: 0,
        alpha: 1.0,
        device_count: 8,
        mode: ComputationMode::Training,
    };
    let result = search(&pcg, &shapes, &simulator, initial.clone(), params, &mut rng, &stop);

    assert_eq!(result.best.configs, initial.configs);
    assert_eq!(result.best_cost_trace.len(), 1);
}
