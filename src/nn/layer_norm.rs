//! LayerNorm module: wraps the `LayerNorm` op with its own `gamma`/`beta`
//! parameters (gamma starts at 1, beta at 0).

use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::shape::Shape;
use crate::tape::{Tape, VarRef};
use crate::{init, variable::Variable};

pub struct LayerNorm {
    gamma: usize,
    beta: usize,
}

impl LayerNorm {
    pub fn new(store: &mut ParamStore, name: &str, dim: usize) -> Self {
        let shape = Shape::new(vec![dim]);
        let gamma = store.push(init::ones(&shape), format!("{name}.gamma"));
        let beta = store.push(init::zeros(&shape), format!("{name}.beta"));
        LayerNorm { gamma, beta }
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        x: VarRef,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        tape.record(
            OpKind::LayerNorm,
            vec![x, VarRef::Parameter(self.gamma), VarRef::Parameter(self.beta)],
            OpAux::None,
            params,
            arena,
        )
    }
}

impl Module for LayerNorm {
    fn parameters(&self) -> Vec<usize> {
        vec![self.gamma, self.beta]
    }
}
