//! Add: element-wise addition. Forward `c = a + b`; backward `da = dc`, `db = dc`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct Add;

impl Op for Add {
    fn kind(&self) -> OpKind {
        OpKind::Add
    }

    fn name(&self) -> &'static str {
        "Add"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 2 {
            return Err(OpError::msg("Add requires 2 inputs"));
        }
        Ok((inputs[0].add(inputs[1], arena)?, OpContext::None))
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
            return Err(OpError::msg("Add backward requires 2 inputs"));
        }
        let shape = grad_output.shape().clone();
        let da = Tensor::temp_from_slice(arena, shape.clone(), grad_output.data());
        let db = Tensor::temp_from_slice(arena, shape, grad_output.data());
        Ok(vec![da, db])
    }
}
