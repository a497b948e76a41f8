//! Operators as first-class objects: `Op` trait, registry, forward/backward.
//! Each op is an independent entity dispatched by [`OpKind`]; adding a new op
//! means implementing the trait and registering it, no changes to the tape.

use crate::arena::Arena;
use crate::backend::Backend;
use crate::tensor::{Tensor, TensorError};
use std::sync::Arc;
use thiserror::Error;

pub mod add;
pub mod add_broadcast;
pub mod causal_self_attention;
pub mod cross_entropy;
pub mod embedding_lookup;
pub mod layer_norm;
pub mod matmul;
pub mod mul;
pub mod relu;
pub mod reshape;
pub mod softmax_row;
pub mod sub;
pub mod transpose;

#[derive(Error, Debug)]
pub enum OpError {
    #[error("{0}")]
    Message(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),
}

impl OpError {
    pub fn msg(s: impl Into<String>) -> Self {
        OpError::Message(s.into())
    }
}

pub type OpResult<T> = Result<T, OpError>;

/// Unique identifier for an operator type; used by the tape to dispatch backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    MatMul,
    Transpose,
    Reshape,
    ReLU,
    SoftmaxRow,
    LayerNorm,
    EmbeddingLookup,
    CrossEntropy,
    /// Row-broadcast add used by `Linear`'s bias term. Not part of the core
    /// kernel table but shares the same tape/backward discipline.
    AddBroadcast,
    /// The full per-head causal self-attention pipeline (split heads, score,
    /// mask, softmax, weighted sum, merge heads). See `causal_self_attention`
    /// for why this is one op instead of several.
    CausalSelfAttention,
}

/// Non-tensor forward arguments an op needs beyond its tensor inputs.
pub enum OpAux {
    None,
    /// Target shape for `Reshape`.
    Shape(crate::shape::Shape),
    /// Token ids for `EmbeddingLookup`.
    Ids(Vec<usize>),
    /// Target token ids for `CrossEntropy`.
    TargetIds(Vec<usize>),
    /// Head count for `CausalSelfAttention`.
    NHeads(usize),
}

/// Values an op's forward pass saves for its own backward pass, beyond what
/// is already recoverable from its tensor inputs and output.
pub enum OpContext {
    None,
    LayerNorm {
        mean: Vec<f64>,
        var: Vec<f64>,
    },
    EmbeddingLookup {
        ids: Vec<usize>,
        vocab: usize,
        dim: usize,
    },
    CrossEntropy {
        probs: Vec<f64>,
        target_ids: Vec<usize>,
        seq_len: usize,
        vocab: usize,
    },
    CausalSelfAttention {
        /// Per-head attention weights, flattened `[n_heads, T, T]`.
        weights: Vec<f64>,
        n_heads: usize,
    },
}

/// One operator: forward computes output + saved context; backward consumes
/// the output gradient plus the same inputs/output/context to produce one
/// gradient contribution per input, in input order.
pub trait Op: Send + Sync {
    fn kind(&self) -> OpKind;

    fn name(&self) -> &'static str {
        "Op"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)>;

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        output: &Tensor,
        ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>>;
}

pub struct OpRegistry {
    ops: std::collections::HashMap<OpKind, Arc<dyn Op>>,
}

impl OpRegistry {
    /// `backend` decides which matmul implementation the `MatMul` op dispatches
    /// to; every other op is backend-independent.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let mut reg = OpRegistry {
            ops: std::collections::HashMap::new(),
        };
        reg.register(Arc::new(add::Add));
        reg.register(Arc::new(sub::Sub));
        reg.register(Arc::new(mul::Mul));
        reg.register(Arc::new(matmul::MatMul::new(backend)));
        reg.register(Arc::new(transpose::Transpose));
        reg.register(Arc::new(reshape::Reshape));
        reg.register(Arc::new(relu::ReLU));
        reg.register(Arc::new(softmax_row::SoftmaxRow));
        reg.register(Arc::new(layer_norm::LayerNorm));
        reg.register(Arc::new(embedding_lookup::EmbeddingLookup));
        reg.register(Arc::new(cross_entropy::CrossEntropy));
        reg.register(Arc::new(add_broadcast::AddBroadcast));
        reg.register(Arc::new(causal_self_attention::CausalSelfAttention));
        reg
    }

    pub fn register(&mut self, op: Arc<dyn Op>) {
        self.ops.insert(op.kind(), op);
    }

    pub fn get(&self, kind: OpKind) -> Option<Arc<dyn Op>> {
        self.ops.get(&kind).cloned()
    }
}

impl Default for OpRegistry {
    /// Picks the matmul backend selected at build time: `BlasBackend` when the
    /// `blas` feature is on, the portable `CpuBackend` otherwise. This is the
    /// one place that decision is made; `Trainer::new` and anything else that
    /// wants the build's default backend should go through here rather than
    /// constructing a backend directly.
    fn default() -> Self {
        #[cfg(feature = "blas")]
        {
            Self::new(Arc::new(crate::backend::BlasBackend::new()))
        }
        #[cfg(not(feature = "blas"))]
        {
            Self::new(Arc::new(crate::backend::CpuBackend::new()))
        }
    }
}
