//! EmbeddingLookup: gathers rows of an embedding table by token id.
//! Forward `Y[t,:] = W[ids[t],:]`; backward scatter-adds into `dW[ids[t],:]`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::shape::Shape;
use crate::tensor::Tensor;

pub struct EmbeddingLookup;

impl Op for EmbeddingLookup {
    fn kind(&self) -> OpKind {
        OpKind::EmbeddingLookup
    }

    fn name(&self) -> &'static str {
        "EmbeddingLookup"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("EmbeddingLookup requires 1 input: W"));
        }
        let ids = match aux {
            OpAux::Ids(ids) => ids.clone(),
            _ => return Err(OpError::msg("EmbeddingLookup requires token ids")),
        };
        let w = inputs[0];
        let (vocab, dim) = match w.shape().dims() {
            [v, d] => (*v, *d),
            _ => return Err(OpError::msg("EmbeddingLookup: W must be rank 2")),
        };
        for &id in &ids {
            if id >= vocab {
                return Err(OpError::msg(format!(
                    "EmbeddingLookup: id {id} out of range for vocab {vocab}"
                )));
            }
        }
        let t = ids.len();
        let wd = w.data();
        let mut out = Tensor::temp(arena, Shape::new(vec![t, dim]));
        let o = out.data_mut();
        for (row, &id) in ids.iter().enumerate() {
            o[row * dim..(row + 1) * dim].copy_from_slice(&wd[id * dim..(id + 1) * dim]);
        }
        Ok((
            out,
            OpContext::EmbeddingLookup { ids, vocab, dim },
        ))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        _output: &Tensor,
        ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 1 {
            return Err(OpError::msg("EmbeddingLookup backward requires 1 input"));
        }
        let (ids, vocab, dim) = match ctx {
            OpContext::EmbeddingLookup { ids, vocab, dim } => (ids, *vocab, *dim),
            _ => return Err(OpError::msg("EmbeddingLookup backward: missing context")),
        };
        let mut dw = Tensor::temp(arena, Shape::new(vec![vocab, dim]));
        let g = grad_output.data();
        let d = dw.data_mut();
        for (row, &id) in ids.iter().enumerate() {
            for j in 0..dim {
                d[id * dim + j] += g[row * dim + j];
            }
        }
        Ok(vec![dw])
    }
}
