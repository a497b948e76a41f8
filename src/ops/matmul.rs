//! MatMul: `C = A . B`. Backward: `dA = dC . Bᵀ`, `dB = Aᵀ . dC`.
//! The one op that dispatches through a [`Backend`] instead of computing
//! directly on `Tensor`, since this is the one kernel worth accelerating.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::backend::Backend;
use crate::tensor::Tensor;
use std::sync::Arc;

pub struct MatMul {
    backend: Arc<dyn Backend>,
}

impl MatMul {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        MatMul { backend }
    }
}

impl Op for MatMul {
    fn kind(&self) -> OpKind {
        OpKind::MatMul
    }

    fn name(&self) -> &'static str {
        "MatMul"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 2 {
            return Err(OpError::msg("MatMul requires 2 inputs"));
        }
        let out = self.backend.matmul(inputs[0], inputs[1], arena)?;
        Ok((out, OpContext::None))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        _output: &Tensor,
        _ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 2 {
            return Err(OpError::msg("MatMul backward requires 2 inputs"));
        }
        let (a, b) = (inputs[0], inputs[1]);
        let b_t = b.transpose2d(arena)?;
        let a_t = a.transpose2d(arena)?;
        let da = self.backend.matmul(grad_output, &b_t, arena)?;
        let db = self.backend.matmul(&a_t, grad_output, arena)?;
        Ok(vec![da, db])
    }
}
