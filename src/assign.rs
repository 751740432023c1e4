//! Parallel-Config Assignment & Mutation (C5).

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AssignError;
use crate::pcg::{MachineView, OperatorId, Pcg};
use crate::tensor::ParallelTensorShape;

/// Per-operator record of `(nDims, dim[nDims], device_ids[Π dim])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub dims: Vec<u64>,
    pub device_ids: Vec<u64>,
}

impl ParallelConfig {
    pub fn n_dims(&self) -> usize {
        self.dims.len()
    }

    pub fn device_count(&self) -> u64 {
        self.dims.iter().product()
    }

    /// Data-parallel config over the trailing dimension with the given degree.
    pub fn data_parallel(rank: usize, degree: u64) -> Self {
        let mut dims = vec![1; rank.max(1)];
        if let Some(last) = dims.last_mut() {
            *last = degree;
        }
        let device_ids = (0..degree).collect();
        ParallelConfig { dims, device_ids }
    }

    /// Validity predicate: degrees divide tensor sizes; device-id count
    /// equals the product of degrees (`spec.md` §4.3 "Validity").
    pub fn is_valid(&self, shape: &ParallelTensorShape) -> bool {
        if self.dims.len() != shape.rank() {
            return false;
        }
        if self.device_ids.len() as u64 != self.device_count() {
            return false;
        }
        for (dim, &degree) in self.dims.iter().enumerate() {
            if degree == 0 || shape.dims[dim].size % degree != 0 {
                return false;
            }
        }
        true
    }

    /// Lower this config into the [`MachineView`] its operator should run
    /// under: the same per-axis degrees, starting at its lowest device id.
    pub fn to_machine_view(&self) -> MachineView {
        let start = self.device_ids.first().copied().unwrap_or(0);
        MachineView::new(self.dims.clone(), start)
    }
}

/// Map from operator to its parallel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub configs: HashMap<OperatorId, ParallelConfig>,
}

impl Assignment {
    pub fn new() -> Self {
        Assignment::default()
    }

    pub fn get(&self, op: OperatorId) -> Option<&ParallelConfig> {
        self.configs.get(&op)
    }

    pub fn set(&mut self, op: OperatorId, config: ParallelConfig) {
        self.configs.insert(op, config);
    }

    /// Build the initial assignment: data-parallel over the trailing
    /// dimension for every non-terminal operator, as produced by the lifter.
    pub fn initial(pcg: &Pcg, shapes: &HashMap<OperatorId, ParallelTensorShape>, degree: u64) -> Self {
        let mut assignment = Assignment::new();
        for op in &pcg.operators {
            if let Some(shape) = shapes.get(&op.id) {
                assignment.set(op.id, ParallelConfig::data_parallel(shape.rank(), degree));
            }
        }
        assignment
    }
}

/// Probability of taking a propagation rewrite instead of a random rewrite
/// (`spec.md` §4.3).
pub const P_PROPAGATE: f64 = 0.2;

/// Probability a propagation walk continues to another neighbor.
pub const CONTINUE_PROPAGATION_CHANCE: f64 = 0.5;

/// Weight given to a neighbor's own edge volume vs. the mean edge volume when
/// drawing the next propagation step.
pub const SIZE_WEIGHT: f64 = 0.7;

fn non_terminal_operators(pcg: &Pcg) -> Vec<OperatorId> {
    pcg.operators
        .iter()
        .filter(|o| !o.is_terminal())
        .map(|o| o.id)
        .collect()
}

fn random_valid_config<R: Rng>(
    rng: &mut R,
    shape: &ParallelTensorShape,
    device_count: u64,
) -> ParallelConfig {
    loop {
        let rank = shape.rank().max(1);
        let mut dims = vec![1u64; rank];
        let split_dim = rng.gen_range(0..rank);
        let size = shape.dims.get(split_dim).map(|d| d.size).unwrap_or(1);
        let mut candidate_degrees: Vec<u64> =
            (1..=size.min(device_count)).filter(|d| size % d == 0).collect();
        if candidate_degrees.is_empty() {
            candidate_degrees.push(1);
        }
        let degree = candidate_degrees[rng.gen_range(0..candidate_degrees.len())];
        dims[split_dim] = degree;
        let device_ids = (0..degree).collect();
        let config = ParallelConfig { dims, device_ids };
        if config.is_valid(shape) {
            return config;
        }
    }
}

/// Random rewrite: replace a uniformly random non-terminal operator's config
/// with a fresh random valid config. Never mutates the terminal operator.
pub fn random_rewrite<R: Rng>(
    rng: &mut R,
    pcg: &Pcg,
    shapes: &HashMap<OperatorId, ParallelTensorShape>,
    assignment: &Assignment,
    device_count: u64,
) -> Result<Assignment, AssignError> {
    let candidates = non_terminal_operators(pcg);
    if candidates.is_empty() {
        return Err(AssignError::NothingToMutate(pcg.operators.len()));
    }
    let op_id = candidates[rng.gen_range(0..candidates.len())];
    let shape = shapes
        .get(&op_id)
        .ok_or(AssignError::NothingToMutate(pcg.operators.len()))?;

    let mut next = assignment.clone();
    next.set(op_id, random_valid_config(rng, shape, device_count));
    Ok(next)
}

fn edge_volume(shape: &ParallelTensorShape) -> u64 {
    shape.dims.iter().map(|d| d.size).product::<u64>().max(1)
}

fn mean_edge_volume(pcg: &Pcg, shapes: &HashMap<OperatorId, ParallelTensorShape>) -> f64 {
    if pcg.operators.is_empty() {
        return 1.0;
    }
    let total: u64 = pcg
        .operators
        .iter()
        .filter_map(|o| shapes.get(&o.id))
        .map(edge_volume)
        .sum();
    total as f64 / pcg.operators.len() as f64
}

/// Propagation rewrite: random-walk along input/output edges, adopting
/// "adoptable" neighbor configs (`spec.md` §4.3).
pub fn propagation_rewrite<R: Rng>(
    rng: &mut R,
    pcg: &Pcg,
    shapes: &HashMap<OperatorId, ParallelTensorShape>,
    assignment: &Assignment,
) -> Result<Assignment, AssignError> {
    let candidates = non_terminal_operators(pcg);
    if candidates.is_empty() {
        return Err(AssignError::NothingToMutate(pcg.operators.len()));
    }
    let mut next = assignment.clone();
    let mut current = candidates[rng.gen_range(0..candidates.len())];
    let mean_volume = mean_edge_volume(pcg, shapes);

    loop {
        let Some(op) = pcg.get(current) else { break };
        let mut neighbors: Vec<OperatorId> = op.inputs.iter().map(|t| t.producer).collect();
        neighbors.extend(
            pcg.operators
                .iter()
                .filter(|o| o.inputs.iter().any(|t| t.producer == current))
                .map(|o| o.id),
        );
        neighbors.retain(|id| *id != current && assignment.get(*id).is_some());
        if neighbors.is_empty() {
            break;
        }

        let weights: Vec<f64> = neighbors
            .iter()
            .map(|id| {
                let volume = shapes.get(id).map(edge_volume).unwrap_or(1) as f64;
                SIZE_WEIGHT * volume + (1.0 - SIZE_WEIGHT) * mean_volume
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();
        let mut pick = rng.gen_range(0.0..total_weight.max(f64::EPSILON));
        let mut chosen = neighbors[0];
        for (id, w) in neighbors.iter().zip(weights.iter()) {
            if pick < *w {
                chosen = *id;
                break;
            }
            pick -= w;
        }

        if let (Some(neighbor_cfg), Some(current_shape)) =
            (assignment.get(chosen).cloned(), shapes.get(&current))
        {
            if neighbor_cfg.n_dims() == current_shape.rank() && neighbor_cfg.is_valid(current_shape)
            {
                next.set(current, neighbor_cfg);
            }
        }

        current = chosen;
        if !rng.gen_bool(CONTINUE_PROPAGATION_CHANCE) {
            break;
        }
    }

    Ok(next)
}

/// Dispatch to a random or propagation rewrite per `P_PROPAGATE`, resampling
/// if the result is rejected until a valid assignment is produced
/// (invariant 9, "never proposes an invalid assignment").
pub fn rewrite<R: Rng>(
    rng: &mut R,
    pcg: &Pcg,
    shapes: &HashMap<OperatorId, ParallelTensorShape>,
    assignment: &Assignment,
    device_count: u64,
) -> Result<Assignment, AssignError> {
    if rng.gen_bool(P_PROPAGATE) {
        propagation_rewrite(rng, pcg, shapes, assignment)
    } else {
        random_rewrite(rng, pcg, shapes, assignment, device_count)
    }
}
