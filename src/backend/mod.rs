//! Matmul backend abstraction.
//!
//! Every other kernel lives directly on [`crate::tensor::Tensor`]; matmul alone
//! gets a swappable backend because it is the one operation worth an
//! accelerated path. `CpuBackend` is the portable fallback and is always
//! available; `BlasBackend` is selected with the `blas` feature.

use crate::arena::Arena;
use crate::tensor::{Tensor, TensorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Dispatches `C = A . B` for rank-2 tensors to whichever matmul
/// implementation is selected at build time.
pub trait Backend: Send + Sync {
    fn matmul(&self, a: &Tensor, b: &Tensor, arena: &Arena) -> BackendResult<Tensor>;
}

pub mod cpu;
pub use cpu::CpuBackend;

#[cfg(feature = "blas")]
pub mod blas;
#[cfg(feature = "blas")]
pub use blas::BlasBackend;
