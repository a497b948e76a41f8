//! Sub: element-wise subtraction. Forward `c = a - b`; backward `da = dc`, `db = -dc`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct Sub;

impl Op for Sub {
    fn kind(&self) -> OpKind {
        OpKind::Sub
    }

    fn name(&self) -> &'static str {
        "Sub"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 2 {
            return Err(OpError::msg("Sub requires 2 inputs"));
        }
        Ok((inputs[0].sub(inputs[1], arena)?, OpContext::None))
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
            return Err(OpError::msg("Sub backward requires 2 inputs"));
        }
        let da = Tensor::temp_from_slice(arena, grad_output.shape().clone(), grad_output.data());
        let mut db = Tensor::temp(arena, grad_output.shape().clone());
        let g = grad_output.data();
        let d = db.data_mut();
        for i in 0..d.len() {
            d[i] = -g[i];
        }
        Ok(vec![da, db])
    }
}
