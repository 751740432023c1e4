//! Fusion Pass (C9): greedy vertical fusion of compatible adjacent operators.

use serde::{Deserialize, Serialize};

use crate::catalog::{OpAttrs, OpKind};
use crate::error::FusionError;
use crate::pcg::{MachineView, Operator, OperatorId, Pcg, TensorRef};

/// Where a fused operator's exposed slot originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    SourceInput,
    SourceOutput,
    SourceWeight,
}

/// One sub-operator folded into a [`FusedOpAttrs`], retaining enough of its
/// identity to reconstruct region checks after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSubOp {
    pub original_id: OperatorId,
    pub kind: OpKind,
    pub attrs: OpAttrs,
    pub source_tags: Vec<SourceTag>,
}

/// Attribute record for a synthetic `fused` operator: an ordered list of
/// sub-ops executed in one task invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedOpAttrs {
    pub sub_ops: Vec<FusedSubOp>,
}

const MAX_FUSED_INPUTS: usize = 8;
const MAX_FUSED_WEIGHTS: usize = 8;
const MAX_FUSED_OUTPUTS: usize = 8;

fn can_fuse(seed: &Operator, candidate: &Operator) -> bool {
    if seed.machine_view != candidate.machine_view || seed.machine_view.is_none() {
        return false;
    }
    if seed.is_input_or_weight() || seed.is_parallel_op() {
        return false;
    }
    if candidate.is_input_or_weight() || candidate.is_parallel_op() {
        return false;
    }
    if candidate.in_place {
        return false;
    }
    true
}

/// Merge `seed` and `candidate` into a single `FusedOp`, renumbering the
/// exposed slots. Fails if the merged operator would exceed bounded slot
/// counts.
fn fuse_pair(seed: &Operator, candidate: &Operator) -> Result<Operator, FusionError> {
    let seed_sub = FusedSubOp {
        original_id: seed.id,
        kind: seed.kind,
        attrs: seed.attrs.clone(),
        source_tags: tag_slots(seed),
    };
    let candidate_sub = FusedSubOp {
        original_id: candidate.id,
        kind: candidate.kind,
        attrs: candidate.attrs.clone(),
        source_tags: tag_slots(candidate),
    };

    let mut inputs = seed.inputs.clone();
    for tref in &candidate.inputs {
        if tref.producer != seed.id && !inputs.contains(tref) {
            inputs.push(*tref);
        }
    }
    let mut weights = seed.weights.clone();
    weights.extend(candidate.weights.iter().copied());
    let outputs = candidate.outputs.clone();

    if inputs.len() > MAX_FUSED_INPUTS {
        return Err(FusionError::SlotOverflow(format!(
            "{} inputs exceeds bound {}",
            inputs.len(),
            MAX_FUSED_INPUTS
        )));
    }
    if weights.len() > MAX_FUSED_WEIGHTS {
        return Err(FusionError::SlotOverflow(format!(
            "{} weights exceeds bound {}",
            weights.len(),
            MAX_FUSED_WEIGHTS
        )));
    }
    if outputs.len() > MAX_FUSED_OUTPUTS {
        return Err(FusionError::SlotOverflow(format!(
            "{} outputs exceeds bound {}",
            outputs.len(),
            MAX_FUSED_OUTPUTS
        )));
    }

    let needs_gradient = vec![true; inputs.len()];

    Ok(Operator {
        id: seed.id,
        kind: OpKind::Fused,
        attrs: OpAttrs::Fused(FusedOpAttrs {
            sub_ops: vec![seed_sub, candidate_sub],
        }),
        inputs,
        needs_gradient,
        outputs,
        weights,
        machine_view: seed.machine_view.clone(),
        in_place: false,
    })
}

fn tag_slots(op: &Operator) -> Vec<SourceTag> {
    let mut tags = vec![SourceTag::SourceInput; op.inputs.len()];
    tags.extend(vec![SourceTag::SourceWeight; op.weights.len()]);
    tags.extend(vec![SourceTag::SourceOutput; op.outputs.len()]);
    tags
}

fn rewrite_consumer_inputs(op: &mut Operator, old_seed: OperatorId, old_l: OperatorId, fused_id: OperatorId) {
    for tref in op.inputs.iter_mut() {
        if tref.producer == old_seed || tref.producer == old_l {
            *tref = TensorRef {
                producer: fused_id,
                slot: tref.slot,
            };
        }
    }
}

/// One greedy fusion pass. Returns `true` if a fusion occurred (caller should
/// call again until it returns `false`, per `spec.md` §4.7 "Repeat until no
/// more fusions").
pub fn fuse_once(pcg: &mut Pcg) -> Result<bool, FusionError> {
    let n = pcg.operators.len();
    if n < 2 {
        return Ok(false);
    }

    for l in 1..n.saturating_sub(1) {
        let candidate = pcg.operators[l].clone();
        if candidate.is_terminal() {
            continue;
        }
        let mut chosen: Option<usize> = None;
        for i in (0..l).rev() {
            if can_fuse(&pcg.operators[i], &candidate) {
                chosen = Some(i);
                break;
            }
        }
        let Some(i) = chosen else { continue };

        let seed = pcg.operators[i].clone();
        let fused = fuse_pair(&seed, &candidate)?;

        let before = pcg.operators[..i].to_vec();
        let mut after: Vec<Operator> = pcg.operators[i + 1..]
            .iter()
            .filter(|o| o.id != candidate.id)
            .cloned()
            .collect();
        for op in after.iter_mut() {
            rewrite_consumer_inputs(op, seed.id, candidate.id, fused.id);
        }

        let old_ids: std::collections::HashSet<OperatorId> =
            pcg.operators.iter().map(|o| o.id).collect();

        let mut new_ops = before;
        new_ops.push(fused);
        new_ops.extend(after);
        pcg.operators = new_ops;

        check_integrity(pcg, &old_ids, seed.id, candidate.id)?;
        return Ok(true);
    }
    Ok(false)
}

/// Run fusion to a fixed point.
pub fn fuse_to_fixpoint(pcg: &mut Pcg) -> Result<usize, FusionError> {
    let mut count = 0;
    while fuse_once(pcg)? {
        count += 1;
    }
    Ok(count)
}

/// Integrity check (`spec.md` §4.7, invariant 7): every non-fused operator in
/// the new list existed in the old list, and the fused operator replacing
/// `{seed, candidate}` is present.
fn check_integrity(
    pcg: &Pcg,
    old_ids: &std::collections::HashSet<OperatorId>,
    seed_id: OperatorId,
    candidate_id: OperatorId,
) -> Result<(), FusionError> {
    for op in &pcg.operators {
        if op.kind == OpKind::Fused {
            continue;
        }
        if !old_ids.contains(&op.id) {
            return Err(FusionError::MissingOperator(op.id));
        }
    }
    if pcg.get(seed_id).is_none() {
        return Err(FusionError::MissingOperator(seed_id));
    }
    let _ = candidate_id;
    Ok(())
}

/// Post-lift, pre-fusion pass (`spec.md` §9 "In-place optimization"): mark
/// operators whose output shares a machine view with their sole input.
pub fn mark_inplace(pcg: &mut Pcg) {
    let view_by_id: std::collections::HashMap<OperatorId, Option<MachineView>> = pcg
        .operators
        .iter()
        .map(|o| (o.id, o.machine_view.clone()))
        .collect();
    for op in pcg.operators.iter_mut() {
        if op.inputs.len() != 1 {
            op.in_place = false;
            continue;
        }
        let producer = op.inputs[0].producer;
        let producer_view = view_by_id.get(&producer).cloned().flatten();
        op.in_place = producer_view.is_some() && producer_view == op.machine_view;
    }
}
