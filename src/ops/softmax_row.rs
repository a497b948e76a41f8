//! SoftmaxRow: row-wise softmax over a rank-2 tensor, max-subtracted for
//! stability. Backward per row i: `dx[i,:] = y[i,:] ⊙ (dy[i,:] - y[i,:]·dy[i,:])`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct SoftmaxRow;

impl Op for SoftmaxRow {
    fn kind(&self) -> OpKind {
        OpKind::SoftmaxRow
    }

    fn name(&self) -> &'static str {
        "SoftmaxRow"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("SoftmaxRow requires 1 input"));
        }
        Ok((inputs[0].softmax_row(arena)?, OpContext::None))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        output: &Tensor,
        _ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 1 {
            return Err(OpError::msg("SoftmaxRow backward requires 1 input"));
        }
        let (rows, cols) = match output.shape().dims() {
            [r, c] => (*r, *c),
            _ => return Err(OpError::msg("SoftmaxRow backward: expected rank 2")),
        };
        let y = output.data();
        let dy = grad_output.data();
        let mut dx = Tensor::temp(arena, output.shape().clone());
        let d = dx.data_mut();
        for r in 0..rows {
            let row = r * cols..(r + 1) * cols;
            let dot: f64 = y[row.clone()]
                .iter()
                .zip(dy[row.clone()].iter())
                .map(|(a, b)| a * b)
                .sum();
            for j in row.clone() {
                d[j] = y[j] * (dy[j] - dot);
            }
        }
        Ok(vec![dx])
    }
}
