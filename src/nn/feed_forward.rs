//! FeedForward: the transformer block's position-wise MLP,
//! `Linear(d_model, d_ff) -> ReLU -> Linear(d_ff, d_model)`.

use super::linear::Linear;
use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::tape::{Tape, VarRef};
use crate::variable::Variable;

pub struct FeedForward {
    up: Linear,
    down: Linear,
}

impl FeedForward {
    pub fn new(store: &mut ParamStore, name: &str, d_model: usize, d_ff: usize) -> Self {
        FeedForward {
            up: Linear::new(store, &format!("{name}.up"), d_model, d_ff),
            down: Linear::new(store, &format!("{name}.down"), d_ff, d_model),
        }
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        x: VarRef,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        let h = self.up.forward(tape, x, params, arena)?;
        let h = tape.record(OpKind::ReLU, vec![h], OpAux::None, params, arena)?;
        self.down.forward(tape, h, params, arena)
    }
}

impl Module for FeedForward {
    fn parameters(&self) -> Vec<usize> {
        [self.up.parameters(), self.down.parameters()].concat()
    }
}
