//! MCMC Search Driver (C7): simulated annealing over parallel-config
//! assignments (`spec.md` §4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::assign::{rewrite, Assignment};
use crate::config::ComputationMode;
use crate::pcg::{OperatorId, Pcg};
use crate::simulator::Simulator;
use crate::tensor::ParallelTensorShape;

/// Parameters for one MCMC search run.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub budget: u64,
    pub alpha: f64,
    pub device_count: u64,
    pub mode: ComputationMode,
}

/// Result of a completed search: the best assignment found and its cost,
/// plus the trajectory of `best_cost` values for invariant 6 ("MCMC
/// monotone-best") checks.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best: Assignment,
    pub best_cost: f64,
    pub best_cost_trace: Vec<f64>,
}

/// Run simulated annealing per `spec.md` §4.5's pseudocode. `stop` is
/// checked once per iteration for cooperative cancellation (`spec.md` §5).
pub fn search(
    pcg: &Pcg,
    shapes: &HashMap<OperatorId, ParallelTensorShape>,
    simulator: &dyn Simulator,
    initial: Assignment,
    params: SearchParams,
    rng: &mut ChaCha8Rng,
    stop: &AtomicBool,
) -> SearchResult {
    let reset_span = (params.budget / 100).clamp(1, 1000);

    let mut best = initial.clone();
    let mut best_cost = simulator.simulate_runtime(pcg, &best, params.mode);
    let mut current = best.clone();
    let mut current_cost = best_cost;
    let mut last_reset: u64 = 0;
    let mut trace = vec![best_cost];

    for iter in 0..params.budget {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if iter.saturating_sub(last_reset) >= reset_span {
            current = best.clone();
            current_cost = best_cost;
            last_reset = iter;
        }

        let next = match rewrite(rng, pcg, shapes, &current, params.device_count) {
            Ok(next) => next,
            Err(_) => continue,
        };
        let next_cost = simulator.simulate_runtime(pcg, &next, params.mode);

        if next_cost < best_cost {
            best = next.clone();
            best_cost = next_cost;
            trace.push(best_cost);
            debug!(iter, best_cost, "search improved best_cost");
        }
        if next_cost < current_cost {
            current = next;
            current_cost = next_cost;
        } else if rng.gen_bool(acceptance_probability(params.alpha, next_cost - current_cost)) {
            current = next;
            current_cost = next_cost;
        }
    }

    SearchResult {
        best,
        best_cost,
        best_cost_trace: trace,
    }
}

fn acceptance_probability(alpha: f64, delta: f64) -> f64 {
    if delta <= 0.0 {
        return 1.0;
    }
    (-alpha * delta).exp().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Activation, LinearAttrs, OpAttrs, OpKind};
    use crate::pcg::Operator;
    use crate::tensor::{DataType, ParallelDim, TensorId};
    use rand::SeedableRng;

    struct FixedSimulator;
    impl Simulator for FixedSimulator {
        fn simulate_runtime(&self, pcg: &Pcg, assignment: &Assignment, _mode: ComputationMode) -> f64 {
            pcg.operators
                .iter()
                .filter_map(|o| assignment.get(o.id))
                .map(|c| c.device_count() as f64)
                .sum::<f64>()
                .recip()
                .max(1e-9)
        }
    }

    fn linear_pcg() -> (Pcg, HashMap<OperatorId, ParallelTensorShape>) {
        let mut pcg = Pcg::new();
        pcg.push(Operator {
            id: OperatorId(0),
            kind: OpKind::Linear,
            attrs: OpAttrs::Linear(LinearAttrs {
                out_channels: 64,
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
        let mut shapes = HashMap::new();
        shapes.insert(
            OperatorId(0),
            ParallelTensorShape::new(
                vec![ParallelDim::unsplit(64), ParallelDim::unsplit(64)],
                DataType::Float,
            ),
        );
        (pcg, shapes)
    }

    #[test]
    fn best_cost_is_monotone_non_increasing() {
        let (pcg, shapes) = linear_pcg();
        let initial = Assignment::initial(&pcg, &shapes, 4);
        let sim = FixedSimulator;
        let stop = AtomicBool::new(false);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let params = SearchParams {
            budget: 200,
            alpha: 1.2,
            device_count: 4,
            mode: ComputationMode::Training,
        };
        let result = search(&pcg, &shapes, &sim, initial, params, &mut rng, &stop);
        for window in result.best_cost_trace.windows(2) {
            assert!(window[1] <= window[0]);
        }
    }

    #[test]
    fn cooperative_stop_halts_search() {
        let (pcg, shapes) = linear_pcg();
        let initial = Assignment::initial(&pcg, &shapes, 4);
        let sim = FixedSimulator;
        let stop = AtomicBool::new(true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = SearchParams {
            budget: 1000,
            alpha: 1.2,
            device_count: 4,
            mode: ComputationMode::Training,
        };
        let result = search(&pcg, &shapes, &sim, initial, params, &mut rng, &stop);
        assert_eq!(result.best_cost_trace.len(), 1);
    }
}
