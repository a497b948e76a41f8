//! Multi-head causal self-attention: Q/K/V/output projections around the
//! [`crate::ops::causal_self_attention::CausalSelfAttention`] op, which does
//! the actual per-head score/mask/softmax/weighted-sum work.

use super::linear::Linear;
use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::tape::{Tape, VarRef};
use crate::variable::Variable;

pub struct MultiHeadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    n_heads: usize,
}

impl MultiHeadAttention {
    pub fn new(store: &mut ParamStore, name: &str, d_model: usize, n_heads: usize) -> Self {
        assert_eq!(
            d_model % n_heads,
            0,
            "d_model {d_model} must be divisible by n_heads {n_heads}"
        );
        MultiHeadAttention {
            q_proj: Linear::new(store, &format!("{name}.q_proj"), d_model, d_model),
            k_proj: Linear::new(store, &format!("{name}.k_proj"), d_model, d_model),
            v_proj: Linear::new(store, &format!("{name}.v_proj"), d_model, d_model),
            out_proj: Linear::new(store, &format!("{name}.out_proj"), d_model, d_model),
            n_heads,
        }
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        x: VarRef,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        let q = self.q_proj.forward(tape, x, params, arena)?;
        let k = self.k_proj.forward(tape, x, params, arena)?;
        let v = self.v_proj.forward(tape, x, params, arena)?;
        let attn = tape.record(
            OpKind::CausalSelfAttention,
            vec![q, k, v],
            OpAux::NHeads(self.n_heads),
            params,
            arena,
        )?;
        self.out_proj.forward(tape, attn, params, arena)
    }
}

impl Module for MultiHeadAttention {
    fn parameters(&self) -> Vec<usize> {
        [
            self.q_proj.parameters(),
            self.k_proj.parameters(),
            self.v_proj.parameters(),
            self.out_proj.parameters(),
        ]
        .concat()
    }
}
