//! Linear: `y = x @ W + b`. Weight is Xavier-initialized, bias starts at zero.

use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::shape::Shape;
use crate::tape::{Tape, VarRef};
use crate::{init, variable::Variable};

pub struct Linear {
    weight: usize,
    bias: usize,
}

impl Linear {
    /// `in_features`/`out_features`: `W` is `[in_features, out_features]`, `b` is `[out_features]`.
    pub fn new(store: &mut ParamStore, name: &str, in_features: usize, out_features: usize) -> Self {
        let w = init::xavier_uniform(&Shape::new(vec![in_features, out_features]));
        let b = init::zeros(&Shape::new(vec![out_features]));
        let weight = store.push(w, format!("{name}.weight"));
        let bias = store.push(b, format!("{name}.bias"));
        Linear { weight, bias }
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        x: VarRef,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        let h = tape.record(
            OpKind::MatMul,
            vec![x, VarRef::Parameter(self.weight)],
            OpAux::None,
            params,
            arena,
        )?;
        tape.record(
            OpKind::AddBroadcast,
            vec![h, VarRef::Parameter(self.bias)],
            OpAux::None,
            params,
            arena,
        )
    }
}

impl Module for Linear {
    fn parameters(&self) -> Vec<usize> {
        vec![self.weight, self.bias]
    }
}
