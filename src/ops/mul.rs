//! Mul: element-wise multiply. Forward `c = a ⊙ b`; backward `da = dc ⊙ b`, `db = dc ⊙ a`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct Mul;

impl Op for Mul {
    fn kind(&self) -> OpKind {
        OpKind::Mul
    }

    fn name(&self) -> &'static str {
        "Mul"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 2 {
            return Err(OpError::msg("Mul requires 2 inputs"));
        }
        Ok((inputs[0].mul(inputs[1], arena)?, OpContext::None))
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
            return Err(OpError::msg("Mul backward requires 2 inputs"));
        }
        let da = grad_output.mul(inputs[1], arena)?;
        let db = grad_output.mul(inputs[0], arena)?;
        Ok(vec![da, db])
    }
}
