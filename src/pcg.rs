//! Parallel Computation Graph (C4): the operator DAG plus per-machine-view
//! communicator cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{OpAttrs, OpKind};
use crate::tensor::TensorId;

/// Globally unique id for an operator, allocated from [`crate::model::Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(pub u64);

/// An ordered list of axis extents addressing a subset of devices. Two
/// tensors with an identical `MachineView` are co-located for launch fusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineView {
    pub axis_extents: Vec<u64>,
    pub start_device_id: u64,
}

impl MachineView {
    pub fn new(axis_extents: Vec<u64>, start_device_id: u64) -> Self {
        MachineView {
            axis_extents,
            start_device_id,
        }
    }

    pub fn num_devices(&self) -> u64 {
        self.axis_extents.iter().product()
    }
}

/// Reference to one of an operator's input/output/weight tensor slots, used
/// by downstream operators instead of holding shared ownership of the tensor
/// itself (see the back-reference design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRef {
    pub producer: OperatorId,
    pub slot: usize,
}

/// A single operator node. Owns its output tensor ids; input/weight slots are
/// weak references resolved through the owning [`Pcg`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub kind: OpKind,
    pub attrs: OpAttrs,
    pub inputs: Vec<TensorRef>,
    pub needs_gradient: Vec<bool>,
    pub outputs: Vec<TensorId>,
    pub weights: Vec<TensorId>,
    pub machine_view: Option<MachineView>,
    /// Set by the in-place optimization pass; fusion skips these operators.
    pub in_place: bool,
}

impl Operator {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            OpKind::Softmax | OpKind::AggregateSpec | OpKind::Noop
        )
    }

    pub fn is_parallel_op(&self) -> bool {
        matches!(
            self.kind,
            OpKind::Repartition
                | OpKind::Replicate
                | OpKind::Reduction
                | OpKind::Combine
                | OpKind::FusedParallel
        )
    }

    pub fn is_input_or_weight(&self) -> bool {
        matches!(self.kind, OpKind::Input) || !self.weights.is_empty()
    }
}

/// Opaque handle to a pre-created collective communicator for a given
/// [`MachineView`]. The actual NCCL/runtime handle is an external
/// collaborator; this core only tracks identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicatorHandle(pub u64);

/// The operator DAG: an ordered list of operators (any topological order) plus
/// the one-shot machine-view → communicator cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pcg {
    pub operators: Vec<Operator>,
    #[serde(skip)]
    communicators: HashMap<MachineView, CommunicatorHandle>,
    next_communicator_id: u64,
}

impl Pcg {
    pub fn new() -> Self {
        Pcg::default()
    }

    pub fn push(&mut self, op: Operator) {
        self.operators.push(op);
    }

    pub fn position_of(&self, id: OperatorId) -> Option<usize> {
        self.operators.iter().position(|o| o.id == id)
    }

    pub fn get(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.iter().find(|o| o.id == id)
    }

    /// Resolve a [`TensorRef`] to the concrete [`TensorId`] it names.
    pub fn resolve(&self, tref: TensorRef) -> Option<TensorId> {
        self.get(tref.producer)?.outputs.get(tref.slot).copied()
    }

    /// Fetch or lazily create the communicator handle for `view`. Entries are
    /// never evicted; reads after compile need no locking since compilation
    /// is single-threaded.
    pub fn communicator_for(&mut self, view: &MachineView) -> CommunicatorHandle {
        if let Some(handle) = self.communicators.get(view) {
            return *handle;
        }
        let handle = CommunicatorHandle(self.next_communicator_id);
        self.next_communicator_id += 1;
        self.communicators.insert(view.clone(), handle);
        handle
    }

    /// Invariant 1 (topological soundness): every input tensor's producer
    /// appears strictly before its consumer in operator order.
    pub fn check_topological_soundness(&self) -> bool {
        for (pos, op) in self.operators.iter().enumerate() {
            for tref in &op.inputs {
                match self.position_of(tref.producer) {
                    Some(producer_pos) if producer_pos < pos => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Invariant 2 (unique output ownership): every tensor id appears in
    /// exactly one operator's outputs (at the index recorded on the tensor)
    /// or, for weight tensors, among that operator's weight slots.
    pub fn check_unique_output_ownership(&self, tensors: &HashMap<TensorId, crate::tensor::ParallelTensor>) -> bool {
        for t in tensors.values() {
            let Some(owner) = self.get(t.owner_op) else {
                return false;
            };
            let owns_output = owner.outputs.get(t.owner_idx) == Some(&t.id);
            let owns_weight = owner.weights.contains(&t.id);
            if !owns_output && !owns_weight {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OpAttrs;

    fn noop_operator(id: u64, inputs: Vec<TensorRef>, output: TensorId) -> Operator {
        Operator {
            id: OperatorId(id),
            kind: OpKind::Noop,
            attrs: OpAttrs::Noop,
            inputs,
            needs_gradient: vec![],
            outputs: vec![output],
            weights: vec![],
            machine_view: None,
            in_place: false,
        }
    }

    #[test]
    fn topological_soundness_holds_for_chain() {
        let mut pcg = Pcg::new();
        pcg.push(noop_operator(0, vec![], TensorId(0)));
        pcg.push(noop_operator(
            1,
            vec![TensorRef {
                producer: OperatorId(0),
                slot: 0,
            }],
            TensorId(1),
        ));
        assert!(pcg.check_topological_soundness());
    }

    #[test]
    fn topological_soundness_fails_for_forward_reference() {
        let mut pcg = Pcg::new();
        pcg.push(noop_operator(
            0,
            vec![TensorRef {
                producer: OperatorId(1),
                slot: 0,
            }],
            TensorId(0),
        ));
        pcg.push(noop_operator(1, vec![], TensorId(1)));
        assert!(!pcg.check_topological_soundness());
    }

    #[test]
    fn communicator_cache_is_one_shot() {
        let mut pcg = Pcg::new();
        let view = MachineView::new(vec![4], 0);
        let h1 = pcg.communicator_for(&view);
        let h2 = pcg.communicator_for(&view);
        assert_eq!(h1, h2);
        let other = MachineView::new(vec![2], 0);
        let h3 = pcg.communicator_for(&other);
        assert_ne!(h1, h3);
    }
}
