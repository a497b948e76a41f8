//! Optimizer: updates parameters using gradients. SGD, Adam, etc.
//!
//! Moment state is sized once, at construction, against the
//! [`ParamStore`]'s length at that moment — not grown lazily during stepping
//! the way a position-keyed `Vec` would, since this engine's parameter
//! enumeration is fixed for the life of the model and the checkpoint format
//! depends on that same stable ordering.

use crate::config::OptimizerConfig;
use crate::params::ParamStore;
use crate::tensor::Tensor;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("optimizer error: {0}")]
pub struct OptimizerError(pub String);

pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Optimizer trait: `step` updates every parameter in place using its
/// current gradient; it does not zero gradients afterward (that is the
/// training step's job, ahead of the next forward pass).
pub trait Optimizer {
    fn step(&mut self, store: &mut ParamStore) -> OptimizerResult<()>;

    /// Override the learning rate for the next step, e.g. from a warmup/decay schedule.
    fn set_lr(&mut self, lr: f64);
}

/// SGD: `param -= lr * grad`.
pub struct SGD {
    pub lr: f64,
}

impl SGD {
    pub fn new(lr: f64) -> Self {
        SGD { lr }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, store: &mut ParamStore) -> OptimizerResult<()> {
        for p in store.as_mut_slice().iter_mut() {
            let grad_data = match p.grad() {
                Some(g) => g.data().to_vec(),
                None => continue,
            };
            let data = p.data_mut().data_mut();
            if data.len() != grad_data.len() {
                return Err(OptimizerError("param and grad shape mismatch".into()));
            }
            for (d, g) in data.iter_mut().zip(grad_data.iter()) {
                *d -= self.lr * g;
            }
        }
        Ok(())
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Adam: first- and second-moment estimates with bias correction, matching
/// the update rule in the component spec's optimizer section.
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    /// Per-parameter moment state, indexed by the same stable index the
    /// `ParamStore` assigned each parameter at model-construction time.
    m: Vec<Tensor>,
    v: Vec<Tensor>,
    t: u32,
}

impl Adam {
    /// `store` supplies the parameter shapes and count; the optimizer owns
    /// its own zeroed moment tensors from that point on and expects the
    /// store's parameter count not to change afterward.
    pub fn new(config: &OptimizerConfig, store: &ParamStore) -> Self {
        let m = store
            .as_slice()
            .iter()
            .map(|p| Tensor::zeros_persistent(p.shape().clone()))
            .collect();
        let v = store
            .as_slice()
            .iter()
            .map(|p| Tensor::zeros_persistent(p.shape().clone()))
            .collect();
        Adam {
            lr: config.lr,
            beta1: config.beta1,
            beta2: config.beta2,
            eps: config.eps,
            m,
            v,
            t: 0,
        }
    }

    pub fn step_count(&self) -> u32 {
        self.t
    }

    /// Restore moment state and step count from a loaded checkpoint. `m`/`v`
    /// must already match the store's parameter shapes.
    pub fn restore(&mut self, m: Vec<Tensor>, v: Vec<Tensor>, t: u32) {
        self.m = m;
        self.v = v;
        self.t = t;
    }

    pub fn moments(&self) -> (&[Tensor], &[Tensor]) {
        (&self.m, &self.v)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, store: &mut ParamStore) -> OptimizerResult<()> {
        let params = store.as_mut_slice();
        if params.len() != self.m.len() {
            return Err(OptimizerError(
                "parameter count changed since optimizer construction".into(),
            ));
        }
        self.t += 1;
        let beta1_t = self.beta1.powi(self.t as i32);
        let beta2_t = self.beta2.powi(self.t as i32);
        let m_hat_scale = 1.0 / (1.0 - beta1_t);
        let v_hat_scale = 1.0 / (1.0 - beta2_t);

        for (i, p) in params.iter_mut().enumerate() {
            let grad_data = match p.grad() {
                Some(g) => g.data().to_vec(),
                None => continue,
            };
            let param_data = p.data_mut().data_mut();
            if param_data.len() != grad_data.len() {
                return Err(OptimizerError("param and grad shape mismatch".into()));
            }
            let m_data = self.m[i].data_mut();
            let v_data = self.v[i].data_mut();

            for j in 0..param_data.len() {
                let g = grad_data[j];
                m_data[j] = self.beta1 * m_data[j] + (1.0 - self.beta1) * g;
                v_data[j] = self.beta2 * v_data[j] + (1.0 - self.beta2) * g * g;
                let m_hat = m_data[j] * m_hat_scale;
                let v_hat = v_data[j] * v_hat_scale;
                param_data[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
        Ok(())
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}
