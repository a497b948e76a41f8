//! `Module`: a layer's only cross-cutting contract is naming the parameter
//! indices it owns. Forward signatures differ too much across layer kinds
//! (Embedding takes token ids, Linear and LayerNorm take one tape value,
//! MultiHeadAttention takes a head count) to share one forward method, so
//! each layer exposes its own inherent `forward`.

/// Indices this layer owns into the model's [`crate::params::ParamStore`],
/// in the order they were registered at construction.
pub trait Module {
    fn parameters(&self) -> Vec<usize>;
}
