//! LayerNorm: per-row standardize then affine. Inputs `[x, gamma, beta]`,
//! `x` is `[n, d]`, `gamma`/`beta` are `[d]`.
//!
//! Forward per row i: `mu_i = mean(x[i,:])`, `var_i = var(x[i,:])`,
//! `xhat[i,:] = (x[i,:] - mu_i) / sqrt(var_i + eps)`, `y[i,:] = gamma*xhat[i,:] + beta`.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub const EPS: f64 = 1e-5;

pub struct LayerNorm;

impl Op for LayerNorm {
    fn kind(&self) -> OpKind {
        OpKind::LayerNorm
    }

    fn name(&self) -> &'static str {
        "LayerNorm"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        _aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 3 {
            return Err(OpError::msg("LayerNorm requires 3 inputs: x, gamma, beta"));
        }
        let (x, gamma, beta) = (inputs[0], inputs[1], inputs[2]);
        let (n, d) = match x.shape().dims() {
            [n, d] => (*n, *d),
            _ => return Err(OpError::msg("LayerNorm: x must be rank 2")),
        };
        if gamma.numel() != d || beta.numel() != d {
            return Err(OpError::msg("LayerNorm: gamma/beta must match x's last dim"));
        }

        let xd = x.data();
        let g = gamma.data();
        let b = beta.data();
        let mut mean = vec![0.0f64; n];
        let mut var = vec![0.0f64; n];
        let mut out = Tensor::temp(arena, x.shape().clone());
        let o = out.data_mut();

        for i in 0..n {
            let row = &xd[i * d..(i + 1) * d];
            let mu = row.iter().sum::<f64>() / d as f64;
            let v = row.iter().map(|&v| (v - mu) * (v - mu)).sum::<f64>() / d as f64;
            mean[i] = mu;
            var[i] = v;
            let denom = (v + EPS).sqrt();
            for j in 0..d {
                let xhat = (row[j] - mu) / denom;
                o[i * d + j] = g[j] * xhat + b[j];
            }
        }

        Ok((out, OpContext::LayerNorm { mean, var }))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        _output: &Tensor,
        ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 3 {
            return Err(OpError::msg("LayerNorm backward requires 3 inputs"));
        }
        let (mean, var) = match ctx {
            OpContext::LayerNorm { mean, var } => (mean, var),
            _ => return Err(OpError::msg("LayerNorm backward: missing saved context")),
        };
        let (x, gamma, _beta) = (inputs[0], inputs[1], inputs[2]);
        let (n, d) = match x.shape().dims() {
            [n, d] => (*n, *d),
            _ => return Err(OpError::msg("LayerNorm backward: x must be rank 2")),
        };
        let df = d as f64;
        let xd = x.data();
        let g = gamma.data();
        let dy = grad_output.data();

        let mut dx = Tensor::temp(arena, x.shape().clone());
        let mut dgamma = Tensor::temp(arena, gamma.shape().clone());
        let mut dbeta = Tensor::temp(arena, gamma.shape().clone());
        {
            let dgd = dgamma.data_mut();
            let dbd = dbeta.data_mut();
            for i in 0..n {
                let mu = mean[i];
                let denom = (var[i] + EPS).sqrt();
                for j in 0..d {
                    let xhat = (xd[i * d + j] - mu) / denom;
                    let dyij = dy[i * d + j];
                    dgd[j] += dyij * xhat;
                    dbd[j] += dyij;
                }
            }
        }

        let dxd = dx.data_mut();
        for i in 0..n {
            let mu = mean[i];
            let denom = (var[i] + EPS).sqrt();
            let row = &xd[i * d..(i + 1) * d];
            let dy_row = &dy[i * d..(i + 1) * d];

            let mut dxhat = vec![0.0f64; d];
            for j in 0..d {
                dxhat[j] = dy_row[j] * g[j];
            }
            let dvar: f64 = (0..d)
                .map(|j| dxhat[j] * (row[j] - mu) * -0.5 * (var[i] + EPS).powf(-1.5))
                .sum();
            let dmean: f64 = (0..d).map(|j| -dxhat[j] / denom).sum::<f64>()
                + dvar * (-2.0 / df) * (0..d).map(|j| row[j] - mu).sum::<f64>();

            let out_row = &mut dxd[i * d..(i + 1) * d];
            for j in 0..d {
                out_row[j] =
                    dxhat[j] / denom + dvar * 2.0 * (row[j] - mu) / df + dmean / df;
            }
        }

        Ok(vec![dx, dgamma, dbeta])
    }
}
