//! Per-operator-kind attribute records (C2 "attribute record").
//!
//! Records are value-typed and equality-comparable: equal records imply
//! operator equivalence for memoization (`spec.md` §4.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    None,
    Relu,
    Sigmoid,
    Tanh,
    Gelu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementUnaryOp {
    Exp,
    Sin,
    Cos,
    Relu,
    Sigmoid,
    Tanh,
    Identity,
    Gelu,
    Elu,
    /// `scalar-{add,sub,mul,truediv}`: a constant folded into the op itself.
    ScalarAdd,
    ScalarSub,
    ScalarMul,
    ScalarTrueDiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearAttrs {
    pub out_channels: u64,
    pub activation: Activation,
    pub use_bias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conv2DAttrs {
    pub out_channels: u64,
    pub kernel_h: u64,
    pub kernel_w: u64,
    pub stride_h: u64,
    pub stride_w: u64,
    pub padding_h: u64,
    pub padding_w: u64,
    pub groups: u64,
    pub activation: Activation,
    pub use_bias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBinaryAttrs {
    pub op: ElementBinaryOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementUnaryAttrs {
    pub op: ElementUnaryOp,
    /// Operand for `scalar-*` variants; unused otherwise.
    pub scalar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatAttrs {
    pub axis: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pool2DAttrs {
    pub kernel_h: u64,
    pub kernel_w: u64,
    pub stride_h: u64,
    pub stride_w: u64,
    pub padding_h: u64,
    pub padding_w: u64,
    pub is_max_pool: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastAttrs {
    pub target: crate::tensor::DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropoutAttrs {
    pub rate: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingAttrs {
    pub num_entries: u64,
    pub out_channels: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatAttrs {
    pub start_dim: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatherAttrs {
    pub axis: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiHeadAttentionAttrs {
    pub embed_dim: u64,
    pub num_heads: u64,
    pub kdim: u64,
    pub vdim: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNormAttrs {
    pub axes: Vec<i32>,
    pub elementwise_affine: bool,
    pub eps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceSumAttrs {
    pub axes: Vec<i32>,
    pub keepdims: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReshapeAttrs {
    pub shape: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxAttrs {
    pub axis: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepartitionAttrs {
    pub dim: usize,
    pub degree: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicateAttrs {
    pub degree: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionAttrs {
    pub dim: usize,
    pub degree: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombineAttrs {
    pub dim: usize,
    pub degree: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransposeAttrs {
    pub perm_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchMatmulAttrs {
    pub a_seq_length_dim: i32,
    pub b_seq_length_dim: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitAttrs {
    pub axis: i32,
    pub num_splits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopKAttrs {
    pub k: u64,
    pub sorted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupByAttrs {
    pub n: u64,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateAttrs {
    pub n: u64,
    pub lambda_bal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpecAttrs {
    pub n: u64,
    pub lambda_bal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchNormAttrs {
    pub eps: f64,
    pub momentum: f64,
}

/// Sum type over every operator kind's attribute record. One variant per
/// `OpKind`; value-typed and equality-comparable (`spec.md` §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpAttrs {
    Input,
    Linear(LinearAttrs),
    Conv2D(Conv2DAttrs),
    ElementBinary(ElementBinaryAttrs),
    ElementUnary(ElementUnaryAttrs),
    Concat(ConcatAttrs),
    Pool2D(Pool2DAttrs),
    Cast(CastAttrs),
    Dropout(DropoutAttrs),
    Embedding(EmbeddingAttrs),
    Flat(FlatAttrs),
    Gather(GatherAttrs),
    MultiHeadAttention(MultiHeadAttentionAttrs),
    LayerNorm(LayerNormAttrs),
    ReduceSum(ReduceSumAttrs),
    Reshape(ReshapeAttrs),
    Softmax(SoftmaxAttrs),
    Repartition(RepartitionAttrs),
    Replicate(ReplicateAttrs),
    Reduction(ReductionAttrs),
    Combine(CombineAttrs),
    FusedParallel(ReplicateAttrs),
    Transpose(TransposeAttrs),
    BatchMatmul(BatchMatmulAttrs),
    Split(SplitAttrs),
    TopK(TopKAttrs),
    GroupBy(GroupByAttrs),
    Aggregate(AggregateAttrs),
    AggregateSpec(AggregateSpecAttrs),
    Noop,
    Mean,
    Cache,
    Reverse,
    BatchNorm(BatchNormAttrs),
    Fused(crate::fusion::FusedOpAttrs),
}
