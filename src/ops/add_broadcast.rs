//! AddBroadcast: `a[n,k] + b[k]`, row-broadcast. Backs `Linear`'s bias term.
//! Backward: `da = dc`; `db = Σ_rows dc`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::shape::Shape;
use crate::tensor::Tensor;

pub struct AddBroadcast;

impl Op for AddBroadcast {
    fn kind(&self) -> OpKind {
        OpKind::AddBroadcast
    }

    fn name(&self) -> &'static str {
        "AddBroadcast"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 2 {
            return Err(OpError::msg("AddBroadcast requires 2 inputs"));
        }
        Ok((
            inputs[0].add_broadcast_row(inputs[1], arena)?,
            OpContext::None,
        ))
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
            return Err(OpError::msg("AddBroadcast backward requires 2 inputs"));
        }
        let da = Tensor::temp_from_slice(arena, grad_output.shape().clone(), grad_output.data());
        let k = inputs[1].numel();
        let (n, cols) = match grad_output.shape().dims() {
            [n, c] => (*n, *c),
            _ => return Err(OpError::msg("AddBroadcast backward: expected rank 2 grad")),
        };
        debug_assert_eq!(cols, k);
        let mut db = Tensor::temp(arena, Shape::new(vec![k]));
        let g = grad_output.data();
        let d = db.data_mut();
        for i in 0..n {
            for j in 0..cols {
                d[j] += g[i * cols + j];
            }
        }
        Ok(vec![da, db])
    }
}
