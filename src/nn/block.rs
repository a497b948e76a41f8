//! TransformerBlock: pre-norm residual assembly,
//! `x = x + Attn(LN1(x))`, then `x = x + FF(LN2(x))`.

use super::attention::MultiHeadAttention;
use super::feed_forward::FeedForward;
use super::layer_norm::LayerNorm;
use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::tape::{Tape, VarRef};
use crate::variable::Variable;

pub struct TransformerBlock {
    ln1: LayerNorm,
    attn: MultiHeadAttention,
    ln2: LayerNorm,
    ff: FeedForward,
}

impl TransformerBlock {
    pub fn new(store: &mut ParamStore, name: &str, d_model: usize, n_heads: usize, d_ff: usize) -> Self {
        TransformerBlock {
            ln1: LayerNorm::new(store, &format!("{name}.ln1"), d_model),
            attn: MultiHeadAttention::new(store, &format!("{name}.attn"), d_model, n_heads),
            ln2: LayerNorm::new(store, &format!("{name}.ln2"), d_model),
            ff: FeedForward::new(store, &format!("{name}.ff"), d_model, d_ff),
        }
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        x: VarRef,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        let normed = self.ln1.forward(tape, x, params, arena)?;
        let attn_out = self.attn.forward(tape, normed, params, arena)?;
        let x = tape.record(OpKind::Add, vec![x, attn_out], OpAux::None, params, arena)?;

        let normed = self.ln2.forward(tape, x, params, arena)?;
        let ff_out = self.ff.forward(tape, normed, params, arena)?;
        tape.record(OpKind::Add, vec![x, ff_out], OpAux::None, params, arena)
    }
}

impl Module for TransformerBlock {
    fn parameters(&self) -> Vec<usize> {
        [
            self.ln1.parameters(),
            self.attn.parameters(),
            self.ln2.parameters(),
            self.ff.parameters(),
        ]
        .concat()
    }
}
