//! fluxcore: a from-scratch reverse-mode autodiff engine and a minimal
//! transformer built on top of it, for training small language models.
//!
//! Layers: storage (`Tensor`, `Shape`, `Arena`, `Backend`) -> autodiff
//! (`Op`, `OpRegistry`, `Tape`, `Variable`) -> `nn` (layers, `Model`) ->
//! `train` (`Trainer`, `Optimizer`, `data`) -> `checkpoint` (binary I/O).
//!
//! Determinism: use [`set_seed`] before init/training for reproducible runs.

pub mod arena;
pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod init;
pub mod nn;
pub mod ops;
pub mod optimizer;
pub mod params;
pub mod runtime;
pub mod shape;
pub mod tape;
pub mod tensor;
pub mod train;
pub mod variable;

pub use arena::{Arena, ArenaSlice};
pub use backend::{cpu::CpuBackend, Backend, BackendError, BackendResult};
#[cfg(feature = "blas")]
pub use backend::BlasBackend;
pub use checkpoint::{load_checkpoint, load_model, save_checkpoint, save_model, CheckpointError, LoadedCheckpoint};
pub use config::{ArenaConfig, ConfigError, ConfigResult, ModelConfig, OptimizerConfig, TrainConfig};
pub use data::{DataLoader, Dataset, InMemoryDataset, Sample};
pub use init::{gaussian, ones, xavier_uniform, zeros};
pub use nn::{Embedding, FeedForward, LayerNorm, Linear, Model, Module, MultiHeadAttention, TransformerBlock};
pub use ops::{Op, OpAux, OpContext, OpError, OpKind, OpRegistry, OpResult};
pub use optimizer::{Adam, Optimizer, OptimizerError, SGD};
pub use params::ParamStore;
pub use runtime::{set_seed, with_rng};
pub use shape::{Shape, ShapeError};
pub use tape::{Tape, VarRef};
pub use tensor::{Tensor, TensorError, TensorResult};
pub use train::{Trainer, TrainError, TrainResult, TrainStepResult};
pub use variable::Variable;
