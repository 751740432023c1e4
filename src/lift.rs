//! Layer → Parallel-Operator Lifter (C3): builds a PCG from the user's
//! logical layer graph (`spec.md` §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{self, OpAttrs, OpKind, RepartitionAttrs};
use crate::error::LiftError;
use crate::model::Model;
use crate::pcg::{Operator, OperatorId, Pcg, TensorRef};
use crate::tensor::{
    DataType, Initializer, ParallelDim, ParallelTensor, ParallelTensorShape, SyncMode, TensorId,
    WeightMeta,
};

/// Globally unique id for a logical layer, allocated from [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

/// Reference to one of a producer layer's output slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTensorRef {
    pub producer: LayerId,
    pub slot: usize,
}

/// A single logical layer: a kind tag, its attribute record, and references
/// to its input layers' output slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub kind: OpKind,
    pub attrs: OpAttrs,
    pub inputs: Vec<LayerTensorRef>,
    /// Expected logical output shape (ignoring replica dims), used to check
    /// invariant 3 ("shape consistency of lift") after construction.
    pub logical_shape: Vec<u64>,
    pub data_type: DataType,
}

/// An ordered layer graph, walked in topological order by [`lift`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerGraph {
    pub layers: Vec<Layer>,
}

/// Walk `layers` in topological order, appending operators (and any inserted
/// data-movement operators) to `pcg` and registering new tensors on `model`.
pub fn lift(
    layers: &LayerGraph,
    model: &mut Model,
    pcg: &mut Pcg,
    device_count: u64,
    only_data_parallel: bool,
    weight_sync_mode: SyncMode,
) -> Result<(), LiftError> {
    // Maps a layer's output slot to the tensor currently representing it —
    // redirected to a repartition's output when one is inserted for `OP_INPUT`,
    // and updated by every other lifted operator too so later layers can find it.
    let mut bindings: HashMap<(LayerId, usize), TensorId> = HashMap::new();

    for layer in &layers.layers {
        match layer.kind {
            OpKind::Input => lift_input(layer, model, pcg, device_count, only_data_parallel, &mut bindings)?,
            OpKind::AggregateSpec => {
                lift_aggregate_spec(layer, model, pcg, &mut bindings, weight_sync_mode)?
            }
            _ => lift_operator(layer, model, pcg, &mut bindings, weight_sync_mode)?,
        }
    }

    // A terminal marker excluded from mutation and fusion (`spec.md` §8 S1,
    // §4.3/glossary "terminal operator"), appended after the final layer.
    if let Some(last) = layers.layers.last() {
        if let Some(&final_tensor) = bindings.get(&(last.id, 0)) {
            append_terminal_noop(model, pcg, final_tensor)?;
        }
    }

    Ok(())
}

/// Append a trailing `noop` consuming the graph's final output, standing in
/// for the loss-adjacent terminal operator every compiled graph ends with.
fn append_terminal_noop(model: &mut Model, pcg: &mut Pcg, source: TensorId) -> Result<(), LiftError> {
    let source_tensor = model
        .tensors
        .get(&source)
        .ok_or(LiftError::UnknownTensor(source))?;
    let shape = source_tensor.shape.clone();
    let producer = source_tensor.owner_op;
    let slot = source_tensor.owner_idx;

    let op_id = model.alloc_operator();
    let out_tensor = push_tensor(model, op_id, 0, shape);
    pcg.push(Operator {
        id: op_id,
        kind: OpKind::Noop,
        attrs: OpAttrs::Noop,
        inputs: vec![TensorRef { producer, slot }],
        needs_gradient: vec![true],
        outputs: vec![out_tensor],
        weights: vec![],
        machine_view: None,
        in_place: false,
    });
    Ok(())
}

fn resolve_inputs(
    layer: &Layer,
    bindings: &HashMap<(LayerId, usize), TensorId>,
) -> Result<Vec<TensorId>, LiftError> {
    layer
        .inputs
        .iter()
        .map(|r| {
            bindings
                .get(&(r.producer, r.slot))
                .copied()
                .ok_or(LiftError::UnknownTensor(TensorId(u64::MAX)))
        })
        .collect()
}

fn push_tensor(model: &mut Model, owner_op: OperatorId, owner_idx: usize, shape: ParallelTensorShape) -> TensorId {
    let id = model.alloc_tensor();
    model.tensors.insert(
        id,
        ParallelTensor {
            id,
            shape,
            owner_op,
            owner_idx,
            create_gradient: true,
            region: None,
            shadow_region: None,
            weight_meta: None,
        },
    );
    id
}

/// Like [`push_tensor`] but for a parameter tensor: carries initializer and
/// sync-mode metadata and is addressed through the owning operator's
/// `weights` list rather than its `outputs`.
fn push_weight_tensor(
    model: &mut Model,
    owner_op: OperatorId,
    owner_idx: usize,
    shape: ParallelTensorShape,
    sync_mode: SyncMode,
) -> TensorId {
    let id = model.alloc_tensor();
    model.tensors.insert(
        id,
        ParallelTensor {
            id,
            shape,
            owner_op,
            owner_idx,
            create_gradient: true,
            region: None,
            shadow_region: None,
            weight_meta: Some(WeightMeta {
                initializer: Initializer::GlorotUniform,
                sync_mode,
            }),
        },
    );
    id
}

/// `OP_INPUT`: append a trailing replica dimension; optionally insert a
/// `repartition` splitting the batch dimension under `only_data_parallel`.
fn lift_input(
    layer: &Layer,
    model: &mut Model,
    pcg: &mut Pcg,
    device_count: u64,
    only_data_parallel: bool,
    bindings: &mut HashMap<(LayerId, usize), TensorId>,
) -> Result<(), LiftError> {
    let mut dims: Vec<ParallelDim> = layer.logical_shape.iter().map(|&s| ParallelDim::unsplit(s)).collect();
    dims.push(ParallelDim::replica());
    let shape = ParallelTensorShape::new(dims, layer.data_type);

    let op_id = model.alloc_operator();
    let tensor_id = push_tensor(model, op_id, 0, shape.clone());
    pcg.push(Operator {
        id: op_id,
        kind: OpKind::Input,
        attrs: OpAttrs::Input,
        inputs: vec![],
        needs_gradient: vec![],
        outputs: vec![tensor_id],
        weights: vec![],
        machine_view: None,
        in_place: false,
    });

    let final_tensor = if only_data_parallel && !layer.logical_shape.is_empty() {
        debug!(layer = layer.id.0, "inserting repartition for only_data_parallel");
        let repartition_id = model.alloc_operator();
        let attrs = RepartitionAttrs {
            dim: 0,
            degree: device_count,
        };
        let inferred = catalog::infer(
            OpKind::Repartition,
            &[shape.clone()],
            &OpAttrs::Repartition(attrs),
        )?;
        let out_shape = inferred.into_iter().next().expect("repartition always yields one output");
        let out_tensor = push_tensor(model, repartition_id, 0, out_shape);
        pcg.push(Operator {
            id: repartition_id,
            kind: OpKind::Repartition,
            attrs: OpAttrs::Repartition(attrs),
            inputs: vec![TensorRef {
                producer: op_id,
                slot: 0,
            }],
            needs_gradient: vec![true],
            outputs: vec![out_tensor],
            weights: vec![],
            machine_view: None,
            in_place: false,
        });
        out_tensor
    } else {
        tensor_id
    };

    bindings.insert((layer.id, 0), final_tensor);
    Ok(())
}

/// `OP_AGG_SPEC`: Open Question 1 — modeled as a distinct kind with its own
/// constructor rather than delegating to `Aggregate`'s constructor.
fn lift_aggregate_spec(
    layer: &Layer,
    model: &mut Model,
    pcg: &mut Pcg,
    bindings: &mut HashMap<(LayerId, usize), TensorId>,
    weight_sync_mode: SyncMode,
) -> Result<(), LiftError> {
    lift_operator(layer, model, pcg, bindings, weight_sync_mode)
}

fn lift_operator(
    layer: &Layer,
    model: &mut Model,
    pcg: &mut Pcg,
    bindings: &mut HashMap<(LayerId, usize), TensorId>,
    weight_sync_mode: SyncMode,
) -> Result<(), LiftError> {
    let input_ids = resolve_inputs(layer, bindings)?;
    let input_shapes: Vec<ParallelTensorShape> = input_ids
        .iter()
        .map(|id| {
            model
                .tensors
                .get(id)
                .map(|t| t.shape.clone())
                .ok_or(LiftError::UnknownTensor(*id))
        })
        .collect::<Result<_, _>>()?;

    let output_shapes = catalog::infer(layer.kind, &input_shapes, &layer.attrs)?;

    for shape in &output_shapes {
        if shape.logical_dims() != layer.logical_shape && !layer.logical_shape.is_empty() {
            debug!(
                layer = layer.id.0,
                "lifted output shape diverges from declared logical shape"
            );
        }
    }

    // Each input tensor already records its own owner_op/owner_idx (invariant
    // 2); reuse that identity directly rather than re-deriving it from `pcg`.
    let tensor_refs: Vec<TensorRef> = input_ids
        .iter()
        .map(|id| {
            let tensor = model.tensors.get(id).expect("resolved above");
            TensorRef {
                producer: tensor.owner_op,
                slot: tensor.owner_idx,
            }
        })
        .collect();

    let op_id = model.alloc_operator();
    let outputs: Vec<TensorId> = output_shapes
        .into_iter()
        .enumerate()
        .map(|(idx, shape)| {
            let tensor_id = push_tensor(model, op_id, idx, shape);
            bindings.insert((layer.id, idx), tensor_id);
            tensor_id
        })
        .collect();

    let weights: Vec<TensorId> = catalog::weight_shapes(layer.kind, &layer.attrs, &input_shapes)
        .into_iter()
        .enumerate()
        .map(|(idx, shape)| push_weight_tensor(model, op_id, idx, shape, weight_sync_mode))
        .collect();

    pcg.push(Operator {
        id: op_id,
        kind: layer.kind,
        attrs: layer.attrs.clone(),
        inputs: tensor_refs,
        needs_gradient: vec![true; layer.inputs.len()],
        outputs,
        weights,
        machine_view: None,
        in_place: false,
    });

    Ok(())
}
