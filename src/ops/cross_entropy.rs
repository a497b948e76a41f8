//! CrossEntropy: mean negative log-likelihood of the target token at each
//! sequence position. Input `logits[T, vocab]`; `L = -(1/T) Σ_t log p[t, target_t]`.
//! Backward: `dlogits[t,:] = (p[t,:] - onehot(target_t)) / T`, scaled by the
//! upstream scalar gradient.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::shape::Shape;
use crate::tensor::Tensor;

const LOG_EPS: f64 = 1e-10;

pub struct CrossEntropy;

impl Op for CrossEntropy {
    fn kind(&self) -> OpKind {
        OpKind::CrossEntropy
    }

    fn name(&self) -> &'static str {
        "CrossEntropy"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("CrossEntropy requires 1 input: logits"));
        }
        let target_ids = match aux {
            OpAux::TargetIds(ids) => ids.clone(),
            _ => return Err(OpError::msg("CrossEntropy requires target ids")),
        };
        let logits = inputs[0];
        let (seq_len, vocab) = match logits.shape().dims() {
            [t, v] => (*t, *v),
            _ => return Err(OpError::msg("CrossEntropy: logits must be rank 2")),
        };
        if target_ids.len() != seq_len {
            return Err(OpError::msg(
                "CrossEntropy: target_ids length must match logits rows",
            ));
        }

        let ld = logits.data();
        let mut probs = vec![0.0f64; seq_len * vocab];
        let mut loss = 0.0f64;
        for t in 0..seq_len {
            let row = &ld[t * vocab..(t + 1) * vocab];
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            let out_row = &mut probs[t * vocab..(t + 1) * vocab];
            for (j, &x) in row.iter().enumerate() {
                let e = (x - max).exp();
                out_row[j] = e;
                sum += e;
            }
            let sum = sum.max(1e-12);
            for v in out_row.iter_mut() {
                *v /= sum;
            }
            let target = target_ids[t];
            loss += -(out_row[target] + LOG_EPS).ln();
        }
        loss /= seq_len as f64;

        let out = Tensor::temp_from_slice(arena, Shape::new(vec![1]), &[loss]);
        Ok((
            out,
            OpContext::CrossEntropy {
                probs,
                target_ids,
                seq_len,
                vocab,
            },
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
            return Err(OpError::msg("CrossEntropy backward requires 1 input"));
        }
        let (probs, target_ids, seq_len, vocab) = match ctx {
            OpContext::CrossEntropy {
                probs,
                target_ids,
                seq_len,
                vocab,
            } => (probs, target_ids, *seq_len, *vocab),
            _ => return Err(OpError::msg("CrossEntropy backward: missing context")),
        };
        let upstream = grad_output.data()[0];
        let scale = upstream / seq_len as f64;
        let mut dlogits = Tensor::temp(arena, Shape::new(vec![seq_len, vocab]));
        let d = dlogits.data_mut();
        for t in 0..seq_len {
            let target = target_ids[t];
            for v in 0..vocab {
                let onehot = if v == target { 1.0 } else { 0.0 };
                d[t * vocab + v] = (probs[t * vocab + v] - onehot) * scale;
            }
        }
        Ok(vec![dlogits])
    }
}
