//! Portable CPU matmul backend: plain triple loop, deterministic order.
//! Always available; used as the fallback when the `blas` feature is off, and
//! by any test that wants bit-identical results regardless of feature selection.

use crate::arena::Arena;
use crate::backend::{Backend, BackendResult};
use crate::tensor::Tensor;

#[derive(Clone, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Backend for CpuBackend {
    fn matmul(&self, a: &Tensor, b: &Tensor, arena: &Arena) -> BackendResult<Tensor> {
        Ok(a.matmul_cpu(b, arena)?)
    }
}
