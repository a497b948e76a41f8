//! Transpose: 2-D only. Forward `B = Aᵀ`; backward `dA = (dB)ᵀ`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct Transpose;

impl Op for Transpose {
    fn kind(&self) -> OpKind {
        OpKind::Transpose
    }

    fn name(&self) -> &'static str {
        "Transpose"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("Transpose requires 1 input"));
        }
        Ok((inputs[0].transpose2d(arena)?, OpContext::None))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        _output: &Tensor,
        _ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 1 {
            return Err(OpError::msg("Transpose backward requires 1 input"));
        }
        Ok(vec![grad_output.transpose2d(arena)?])
    }
}
