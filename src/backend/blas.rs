//! BLAS-accelerated matmul, enabled by the `blas` Cargo feature and linked
//! against OpenBLAS via `openblas-src`. Numerically equivalent to
//! [`super::cpu::CpuBackend`] up to BLAS's own rounding order; the portable
//! path stays in the tree for tests that need bit-identical results.

use crate::arena::Arena;
use crate::backend::{Backend, BackendError, BackendResult};
use crate::tensor::{Tensor, TensorError};
use cblas::{dgemm, Layout, Transpose};

#[derive(Clone, Default)]
pub struct BlasBackend;

impl BlasBackend {
    pub fn new() -> Self {
        BlasBackend
    }
}

impl Backend for BlasBackend {
    fn matmul(&self, a: &Tensor, b: &Tensor, arena: &Arena) -> BackendResult<Tensor> {
        let (m, k) = match a.shape().dims() {
            [m, k] => (*m, *k),
            _ => {
                return Err(BackendError::Tensor(TensorError::Mismatch(format!(
                    "matmul: lhs must be rank 2, got {:?}",
                    a.shape()
                ))))
            }
        };
        let (k2, n) = match b.shape().dims() {
            [k2, n] => (*k2, *n),
            _ => {
                return Err(BackendError::Tensor(TensorError::Mismatch(format!(
                    "matmul: rhs must be rank 2, got {:?}",
                    b.shape()
                ))))
            }
        };
        if k != k2 {
            return Err(BackendError::Tensor(TensorError::Mismatch(format!(
                "matmul: inner dims mismatch {k} vs {k2}"
            ))));
        }

        let mut out = Tensor::temp(arena, crate::shape::Shape::new(vec![m, n]));
        unsafe {
            dgemm(
                Layout::RowMajor,
                Transpose::None,
                Transpose::None,
                m as i32,
                n as i32,
                k as i32,
                1.0,
                a.data(),
                k as i32,
                b.data(),
                n as i32,
                0.0,
                out.data_mut(),
                n as i32,
            );
        }
        Ok(out)
    }
}
