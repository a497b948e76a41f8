//! ReLU: `y = max(0, x)`. Backward: `dx = dy ⊙ 1[x > 0]`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct ReLU;

impl Op for ReLU {
    fn kind(&self) -> OpKind {
        OpKind::ReLU
    }

    fn name(&self) -> &'static str {
        "ReLU"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("ReLU requires 1 input"));
        }
        Ok((inputs[0].relu(arena)?, OpContext::None))
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
            return Err(OpError::msg("ReLU backward requires 1 input"));
        }
        let mut dx = Tensor::temp(arena, grad_output.shape().clone());
        let x = inputs[0].data();
        let g = grad_output.data();
        let d = dx.data_mut();
        for i in 0..d.len() {
            d[i] = if x[i] > 0.0 { g[i] } else { 0.0 };
        }
        Ok(vec![dx])
    }
}
