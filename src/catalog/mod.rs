//! Operator Catalog (C2).
//!
//! One sum-typed entry point per `spec.md` §4.1: given an operator, return its
//! attributes (`params_of`); given attributes + input shapes, validate and
//! infer outputs (`is_valid`, `infer`). Dispatch is exhaustive over `OpKind`,
//! generalizing the teacher's `Opcode`/`Instruction` byte-ISA dispatch
//! (`ir/format.rs`) to an operator-attribute ISA.

pub mod attrs;

pub use attrs::*;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::pcg::Operator;
use crate::tensor::{DataType, ParallelDim, ParallelTensorShape};

/// Every operator kind the catalog knows how to validate and infer shapes
/// for. Mirrors `spec.md` §3's operator enumeration exactly, plus the
/// synthetic `Input`/`Noop`/`Fused` kinds needed by the lifter and fusion
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Input,
    Linear,
    Conv2D,
    ElementBinary,
    ElementUnary,
    Concat,
    Pool2D,
    Cast,
    Dropout,
    Embedding,
    Flat,
    Gather,
    MultiHeadAttention,
    LayerNorm,
    ReduceSum,
    Reshape,
    Softmax,
    Repartition,
    Replicate,
    Reduction,
    Combine,
    FusedParallel,
    Transpose,
    BatchMatmul,
    Split,
    TopK,
    GroupBy,
    Aggregate,
    AggregateSpec,
    Noop,
    Mean,
    Cache,
    Reverse,
    BatchNorm,
    Fused,
}

impl OpKind {
    /// Open Question 2: these kinds have no parameter record participating in
    /// rewrite/memoization passes, matching the original's `get_op_parameters`
    /// omission — `is_valid`/`infer` still work for them.
    pub fn is_non_participating(self) -> bool {
        matches!(
            self,
            OpKind::Noop | OpKind::Mean | OpKind::Cache | OpKind::Reverse | OpKind::BatchNorm
        )
    }

    pub fn is_parallel_op(self) -> bool {
        matches!(
            self,
            OpKind::Repartition
                | OpKind::Replicate
                | OpKind::Reduction
                | OpKind::Combine
                | OpKind::FusedParallel
        )
    }
}

/// Cheaply reject shapes an operator cannot accept: rank mismatches,
/// arity mismatches, incompatible dtypes. Does not attempt full shape
/// inference — `infer` re-validates structurally and returns a rich error.
pub fn is_valid(kind: OpKind, inputs: &[ParallelTensorShape], attrs: &OpAttrs) -> bool {
    infer(kind, inputs, attrs).is_ok()
}

fn same_logical_shape(a: &ParallelTensorShape, b: &ParallelTensorShape) -> bool {
    a.logical_dims() == b.logical_dims()
}

fn passthrough(inputs: &[ParallelTensorShape], kind: OpKind) -> Result<Vec<ParallelTensorShape>, CatalogError> {
    let input = single_input(inputs, kind)?;
    Ok(vec![input.clone()])
}

fn single_input<'a>(
    inputs: &'a [ParallelTensorShape],
    kind: OpKind,
) -> Result<&'a ParallelTensorShape, CatalogError> {
    if inputs.len() != 1 {
        return Err(CatalogError::WrongArity {
            kind,
            expected: 1,
            actual: inputs.len(),
        });
    }
    Ok(&inputs[0])
}

/// Output-shape function: deterministic, must agree with the kernel's actual
/// output (`spec.md` §4.1 item 3).
pub fn infer(
    kind: OpKind,
    inputs: &[ParallelTensorShape],
    attrs: &OpAttrs,
) -> Result<Vec<ParallelTensorShape>, CatalogError> {
    match (kind, attrs) {
        (OpKind::Input, OpAttrs::Input) => {
            if !inputs.is_empty() {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 0,
                    actual: inputs.len(),
                });
            }
            Err(CatalogError::InvalidInputs {
                kind,
                reason: "Input operators are constructed directly by the lifter, not via infer()"
                    .to_string(),
            })
        }

        (OpKind::Linear, OpAttrs::Linear(a)) => {
            let input = single_input(inputs, kind)?;
            if input.rank() == 0 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "linear requires rank >= 1".to_string(),
                });
            }
            let mut dims = input.dims.clone();
            let last = dims.len() - 1;
            dims[last] = ParallelDim::unsplit(a.out_channels);
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Conv2D, OpAttrs::Conv2D(a)) => {
            let input = single_input(inputs, kind)?;
            if input.rank() != 4 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "conv2d requires rank-4 [N,C,H,W] input".to_string(),
                });
            }
            let h = input.dims[2].size;
            let w = input.dims[3].size;
            let out_h = (h + 2 * a.padding_h - a.kernel_h) / a.stride_h + 1;
            let out_w = (w + 2 * a.padding_w - a.kernel_w) / a.stride_w + 1;
            let dims = vec![
                input.dims[0],
                ParallelDim::unsplit(a.out_channels),
                ParallelDim::unsplit(out_h),
                ParallelDim::unsplit(out_w),
            ];
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::ElementBinary, OpAttrs::ElementBinary(_)) => {
            if inputs.len() != 2 {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 2,
                    actual: inputs.len(),
                });
            }
            if !same_logical_shape(&inputs[0], &inputs[1]) {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "element-binary operands must share a logical shape".to_string(),
                });
            }
            Ok(vec![inputs[0].clone()])
        }

        (OpKind::ElementUnary, OpAttrs::ElementUnary(_)) => passthrough(inputs, kind),

        (OpKind::Concat, OpAttrs::Concat(a)) => {
            if inputs.is_empty() {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 1,
                    actual: 0,
                });
            }
            let rank = inputs[0].rank();
            let axis = normalize_axis(a.axis, rank)?;
            let mut dims = inputs[0].dims.clone();
            let mut total: u64 = 0;
            for shape in inputs {
                if shape.rank() != rank {
                    return Err(CatalogError::InvalidInputs {
                        kind,
                        reason: "concat inputs must share rank".to_string(),
                    });
                }
                total += shape.dims[axis].size;
            }
            dims[axis] = ParallelDim::unsplit(total);
            Ok(vec![ParallelTensorShape::new(dims, inputs[0].data_type)])
        }

        (OpKind::Pool2D, OpAttrs::Pool2D(a)) => {
            let input = single_input(inputs, kind)?;
            if input.rank() != 4 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "pool2d requires rank-4 input".to_string(),
                });
            }
            let h = input.dims[2].size;
            let w = input.dims[3].size;
            let out_h = (h + 2 * a.padding_h - a.kernel_h) / a.stride_h + 1;
            let out_w = (w + 2 * a.padding_w - a.kernel_w) / a.stride_w + 1;
            let dims = vec![
                input.dims[0],
                input.dims[1],
                ParallelDim::unsplit(out_h),
                ParallelDim::unsplit(out_w),
            ];
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Cast, OpAttrs::Cast(a)) => {
            let input = single_input(inputs, kind)?;
            Ok(vec![ParallelTensorShape::new(input.dims.clone(), a.target)])
        }

        (OpKind::Dropout, OpAttrs::Dropout(_)) => passthrough(inputs, kind),

        (OpKind::Embedding, OpAttrs::Embedding(a)) => {
            let input = single_input(inputs, kind)?;
            let mut dims = input.dims.clone();
            dims.push(ParallelDim::unsplit(a.out_channels));
            Ok(vec![ParallelTensorShape::new(dims, DataType::Float)])
        }

        (OpKind::Flat, OpAttrs::Flat(a)) => {
            let input = single_input(inputs, kind)?;
            if a.start_dim >= input.rank() {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "flat start_dim out of range".to_string(),
                });
            }
            let mut dims: Vec<ParallelDim> = input.dims[..a.start_dim].to_vec();
            let flattened: u64 = input.dims[a.start_dim..].iter().map(|d| d.size).product();
            dims.push(ParallelDim::unsplit(flattened));
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Gather, OpAttrs::Gather(a)) => {
            if inputs.len() != 2 {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 2,
                    actual: inputs.len(),
                });
            }
            let values = &inputs[0];
            let index = &inputs[1];
            let axis = normalize_axis(a.axis, values.rank())?;
            let mut dims = values.dims.clone();
            dims[axis] = index.dims.get(axis).copied().unwrap_or(dims[axis]);
            Ok(vec![ParallelTensorShape::new(dims, values.data_type)])
        }

        (OpKind::MultiHeadAttention, OpAttrs::MultiHeadAttention(a)) => {
            if inputs.len() != 3 {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 3,
                    actual: inputs.len(),
                });
            }
            let query = &inputs[0];
            let mut dims = query.dims.clone();
            let last = dims.len() - 1;
            dims[last] = ParallelDim::unsplit(a.embed_dim);
            Ok(vec![ParallelTensorShape::new(dims, query.data_type)])
        }

        (OpKind::LayerNorm, OpAttrs::LayerNorm(_)) => passthrough(inputs, kind),

        (OpKind::ReduceSum, OpAttrs::ReduceSum(a)) => {
            let input = single_input(inputs, kind)?;
            let rank = input.rank();
            let mut axes = Vec::new();
            for &ax in &a.axes {
                axes.push(normalize_axis(ax, rank)?);
            }
            let mut dims = Vec::new();
            for (i, d) in input.dims.iter().enumerate() {
                if axes.contains(&i) {
                    if a.keepdims {
                        dims.push(ParallelDim::unsplit(1));
                    }
                } else {
                    dims.push(*d);
                }
            }
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Reshape, OpAttrs::Reshape(a)) => {
            let input = single_input(inputs, kind)?;
            let total: u64 = input.dims.iter().map(|d| d.size).product();
            let wildcard_count = a.shape.iter().filter(|&&s| s <= 0).count();
            if wildcard_count > 1 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "reshape allows at most one inferred (-1) dimension".to_string(),
                });
            }
            let known: i64 = a.shape.iter().filter(|&&s| s > 0).product();
            if wildcard_count == 1 && (known == 0 || total % known as u64 != 0) {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "reshape's inferred dimension does not evenly divide the input size"
                        .to_string(),
                });
            }
            let mut dims = Vec::with_capacity(a.shape.len());
            for &s in &a.shape {
                if s > 0 {
                    dims.push(ParallelDim::unsplit(s as u64));
                } else {
                    dims.push(ParallelDim::unsplit(total / known as u64));
                }
            }
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Softmax, OpAttrs::Softmax(_)) => passthrough(inputs, kind),

        (OpKind::Repartition, OpAttrs::Repartition(a)) => {
            let input = single_input(inputs, kind)?;
            if a.dim >= input.rank() {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "repartition dim out of range".to_string(),
                });
            }
            let mut dims = input.dims.clone();
            let d = dims[a.dim];
            if d.size % a.degree != 0 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: format!("degree {} does not divide size {}", a.degree, d.size),
                });
            }
            let new_idx = next_free_parallel_idx(&dims);
            dims[a.dim] = ParallelDim::split(d.size, a.degree, new_idx);
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Replicate, OpAttrs::Replicate(a)) => {
            let input = single_input(inputs, kind)?;
            let mut dims = input.dims.clone();
            dims.push(ParallelDim::split(1, a.degree, next_free_parallel_idx(&dims)));
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Reduction, OpAttrs::Reduction(a)) => {
            let input = single_input(inputs, kind)?;
            if a.dim >= input.rank() {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "reduction dim out of range".to_string(),
                });
            }
            let mut dims = input.dims.clone();
            dims[a.dim] = ParallelDim::unsplit(dims[a.dim].size);
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::Combine, OpAttrs::Combine(a)) => {
            let input = single_input(inputs, kind)?;
            if a.dim >= input.rank() {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "combine dim out of range".to_string(),
                });
            }
            let mut dims = input.dims.clone();
            dims[a.dim] = ParallelDim::unsplit(dims[a.dim].size);
            Ok(vec![ParallelTensorShape::new(dims, input.data_type)])
        }

        (OpKind::FusedParallel, OpAttrs::FusedParallel(_)) => passthrough(inputs, kind),

        (OpKind::Transpose, OpAttrs::Transpose(a)) => {
            let input = single_input(inputs, kind)?;
            if a.perm_len != input.rank() {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "transpose permutation length must equal rank".to_string(),
                });
            }
            Ok(vec![input.clone()])
        }

        (OpKind::BatchMatmul, OpAttrs::BatchMatmul(_)) => {
            if inputs.len() != 2 {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 2,
                    actual: inputs.len(),
                });
            }
            let (a, b) = (&inputs[0], &inputs[1]);
            if a.rank() != 3 || b.rank() != 3 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "batch_matmul requires rank-3 [batch, m, k] operands".to_string(),
                });
            }
            let dims = vec![a.dims[0], a.dims[1], b.dims[2]];
            Ok(vec![ParallelTensorShape::new(dims, a.data_type)])
        }

        (OpKind::Split, OpAttrs::Split(a)) => {
            let input = single_input(inputs, kind)?;
            let axis = normalize_axis(a.axis, input.rank())?;
            let total = input.dims[axis].size;
            if a.num_splits == 0 || total % a.num_splits as u64 != 0 {
                return Err(CatalogError::InvalidInputs {
                    kind,
                    reason: "split count must evenly divide the axis size".to_string(),
                });
            }
            let per_split = total / a.num_splits as u64;
            let mut out = Vec::with_capacity(a.num_splits);
            for _ in 0..a.num_splits {
                let mut dims = input.dims.clone();
                dims[axis] = ParallelDim::unsplit(per_split);
                out.push(ParallelTensorShape::new(dims, input.data_type));
            }
            Ok(out)
        }

        (OpKind::TopK, OpAttrs::TopK(a)) => {
            let input = single_input(inputs, kind)?;
            let mut dims = input.dims.clone();
            let last = dims.len() - 1;
            dims[last] = ParallelDim::unsplit(a.k);
            let values = ParallelTensorShape::new(dims.clone(), input.data_type);
            let indices = ParallelTensorShape::new(dims, DataType::Int32);
            Ok(vec![values, indices])
        }

        (OpKind::GroupBy, OpAttrs::GroupBy(a)) => {
            if inputs.len() != 2 {
                return Err(CatalogError::WrongArity {
                    kind,
                    expected: 2,
                    actual: inputs.len(),
                });
            }
            let data = &inputs[0];
            let mut out = Vec::with_capacity(a.n as usize);
            for _ in 0..a.n {
                out.push(data.clone());
            }
            Ok(out)
        }

        (OpKind::Aggregate, OpAttrs::Aggregate(a)) => infer_aggregate(kind, inputs, a.n),

        (OpKind::AggregateSpec, OpAttrs::AggregateSpec(a)) => infer_aggregate(kind, inputs, a.n),

        (OpKind::Noop, OpAttrs::Noop) => passthrough(inputs, kind),
        (OpKind::Mean, OpAttrs::Mean) => passthrough(inputs, kind),
        (OpKind::Cache, OpAttrs::Cache) => passthrough(inputs, kind),
        (OpKind::Reverse, OpAttrs::Reverse) => passthrough(inputs, kind),
        (OpKind::BatchNorm, OpAttrs::BatchNorm(_)) => passthrough(inputs, kind),

        (OpKind::Fused, OpAttrs::Fused(_)) => Err(CatalogError::InvalidInputs {
            kind,
            reason: "fused operators are constructed by the fusion pass, not infer()".to_string(),
        }),

        (kind, _) => Err(CatalogError::InvalidInputs {
            kind,
            reason: "attribute record does not match operator kind".to_string(),
        }),
    }
}

/// Parameter-tensor shapes for weighted operator kinds (`spec.md` §4.1: "[C2]
/// ... creates its output parallel tensors and (for weighted ops) its
/// parameter tensors"). Empty for kinds with no learnable weights. Where
/// present, the kernel/main weight is always index 0, so a mapping stage can
/// dispatch on it directly without consulting the attribute record again.
pub fn weight_shapes(
    kind: OpKind,
    attrs: &OpAttrs,
    inputs: &[ParallelTensorShape],
) -> Vec<ParallelTensorShape> {
    match (kind, attrs) {
        (OpKind::Linear, OpAttrs::Linear(a)) => {
            let Some(input) = inputs.first() else {
                return vec![];
            };
            let in_channels = input.dims.last().map(|d| d.size).unwrap_or(1);
            let mut shapes = vec![ParallelTensorShape::new(
                vec![
                    ParallelDim::unsplit(a.out_channels),
                    ParallelDim::unsplit(in_channels),
                ],
                input.data_type,
            )];
            if a.use_bias {
                shapes.push(ParallelTensorShape::new(
                    vec![ParallelDim::unsplit(a.out_channels)],
                    input.data_type,
                ));
            }
            shapes
        }

        (OpKind::Conv2D, OpAttrs::Conv2D(a)) => {
            let Some(input) = inputs.first() else {
                return vec![];
            };
            if input.rank() != 4 {
                return vec![];
            }
            let in_channels = input.dims[1].size;
            let mut shapes = vec![ParallelTensorShape::new(
                vec![
                    ParallelDim::unsplit(a.out_channels),
                    ParallelDim::unsplit(in_channels / a.groups.max(1)),
                    ParallelDim::unsplit(a.kernel_h),
                    ParallelDim::unsplit(a.kernel_w),
                ],
                input.data_type,
            )];
            if a.use_bias {
                shapes.push(ParallelTensorShape::new(
                    vec![ParallelDim::unsplit(a.out_channels)],
                    input.data_type,
                ));
            }
            shapes
        }

        _ => vec![],
    }
}

/// Shared shape-inference for `aggregate`/`aggregate-spec` (S2 in `spec.md`
/// §8): `n` gating tensors precede `n` expert outputs; result takes the
/// expert's feature dim and the gate's batch dim.
fn infer_aggregate(
    kind: OpKind,
    inputs: &[ParallelTensorShape],
    n: u64,
) -> Result<Vec<ParallelTensorShape>, CatalogError> {
    let expected = 4 + n as usize;
    if inputs.len() != expected {
        return Err(CatalogError::WrongArity {
            kind,
            expected,
            actual: inputs.len(),
        });
    }
    let full_gate = &inputs[3];
    let experts = &inputs[4..];
    let expert_feat = experts[0].dims[0];
    let batch = full_gate.dims[1];
    let trailing = full_gate.dims[2];
    Ok(vec![ParallelTensorShape::new(
        vec![expert_feat, batch, trailing],
        experts[0].data_type,
    )])
}

fn normalize_axis(axis: i32, rank: usize) -> Result<usize, CatalogError> {
    let resolved = if axis < 0 {
        axis + rank as i32
    } else {
        axis
    };
    if resolved < 0 || resolved as usize >= rank {
        return Err(CatalogError::InvalidInputs {
            kind: OpKind::Concat,
            reason: format!("axis {} out of range for rank {}", axis, rank),
        });
    }
    Ok(resolved as usize)
}

fn next_free_parallel_idx(dims: &[ParallelDim]) -> i32 {
    dims.iter().map(|d| d.parallel_idx).max().unwrap_or(-1) + 1
}

/// Parameter extraction (`spec.md` §4.1 item 4): used for graph rewrites and
/// memoization. Returns `None` for the non-participating kinds from Open
/// Question 2 (`noop`, `mean`, `cache`, `reverse`, `batchnorm`).
pub fn params_of(op: &Operator) -> Option<OpAttrs> {
    if op.kind.is_non_participating() {
        return None;
    }
    Some(op.attrs.clone())
}

/// Parameter round-trip (invariant 8): reconstructing an attribute record
/// from itself is the identity, since `OpAttrs` already is the canonical,
/// value-typed parameter record the catalog hands back from `params_of`.
pub fn construct(attrs: OpAttrs) -> OpAttrs {
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::DataType;

    fn shape(dims: Vec<u64>) -> ParallelTensorShape {
        ParallelTensorShape::new(
            dims.into_iter().map(ParallelDim::unsplit).collect(),
            DataType::Float,
        )
    }

    #[test]
    fn linear_infers_out_channels() {
        let input = shape(vec![64, 128]);
        let attrs = OpAttrs::Linear(LinearAttrs {
            out_channels: 64,
            activation: Activation::Relu,
            use_bias: true,
        });
        let out = infer(OpKind::Linear, &[input], &attrs).unwrap();
        assert_eq!(out[0].dims.last().unwrap().size, 64);
    }

    #[test]
    fn element_binary_requires_matching_shapes() {
        let a = shape(vec![4, 8]);
        let b = shape(vec![4, 9]);
        let attrs = OpAttrs::ElementBinary(ElementBinaryAttrs {
            op: ElementBinaryOp::Add,
        });
        assert!(infer(OpKind::ElementBinary, &[a, b], &attrs).is_err());
    }

    #[test]
    fn aggregate_scenario_s2_shape() {
        let gate_preds = shape(vec![4, 8, 1]);
        let gate_assign = shape(vec![4, 8, 1]);
        let true_gate_assign = shape(vec![4, 8, 1]);
        let full_gate = shape(vec![3, 8, 1]);
        let experts: Vec<_> = (0..3).map(|_| shape(vec![16, 32, 1])).collect();
        let mut inputs = vec![gate_preds, gate_assign, true_gate_assign, full_gate];
        inputs.extend(experts);
        let attrs = OpAttrs::Aggregate(AggregateAttrs {
            n: 3,
            lambda_bal: 0.1,
        });
        let out = infer(OpKind::Aggregate, &inputs, &attrs).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].dims.iter().map(|d| d.size).collect::<Vec<_>>(),
            vec![16, 8, 1]
        );
    }

    #[test]
    fn linear_weight_shapes_include_bias_when_requested() {
        let input = shape(vec![64, 128]);
        let attrs = OpAttrs::Linear(LinearAttrs {
            out_channels: 32,
            activation: Activation::None,
            use_bias: true,
        });
        let shapes = weight_shapes(OpKind::Linear, &attrs, std::slice::from_ref(&input));
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].dims.iter().map(|d| d.size).collect::<Vec<_>>(), vec![32, 128]);
        assert_eq!(shapes[1].dims.iter().map(|d| d.size).collect::<Vec<_>>(), vec![32]);
    }

    #[test]
    fn non_weighted_kinds_have_no_weight_shapes() {
        let input = shape(vec![64, 128]);
        let attrs = OpAttrs::ElementUnary(ElementUnaryAttrs {
            op: ElementUnaryOp::Relu,
            scalar: 0.0,
        });
        assert!(weight_shapes(OpKind::ElementUnary, &attrs, std::slice::from_ref(&input)).is_empty());
    }

    #[test]
    fn non_participating_kinds_have_no_params() {
        for kind in [
            OpKind::Noop,
            OpKind::Mean,
            OpKind::Cache,
            OpKind::Reverse,
            OpKind::BatchNorm,
        ] {
            assert!(kind.is_non_participating());
        }
        assert!(!OpKind::Linear.is_non_participating());
    }

    #[test]
    fn reshape_infers_negative_one_dim() {
        let input = shape(vec![2, 3, 4]);
        let attrs = OpAttrs::Reshape(ReshapeAttrs {
            shape: vec![6, -1],
        });
        let out = infer(OpKind::Reshape, &[input], &attrs).unwrap();
        assert_eq!(
            out[0].dims.iter().map(|d| d.size).collect::<Vec<_>>(),
            vec![6, 4]
        );
    }
}
