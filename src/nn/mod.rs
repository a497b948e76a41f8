//! Layers: Linear, Embedding, LayerNorm, MultiHeadAttention, FeedForward,
//! TransformerBlock, and the full Model that composes them.

pub mod attention;
pub mod block;
pub mod embedding;
pub mod feed_forward;
pub mod layer_norm;
pub mod linear;
pub mod model;
pub mod module;

pub use attention::MultiHeadAttention;
pub use block::TransformerBlock;
pub use embedding::Embedding;
pub use feed_forward::FeedForward;
pub use layer_norm::LayerNorm;
pub use linear::Linear;
pub use model::Model;
pub use module::Module;
