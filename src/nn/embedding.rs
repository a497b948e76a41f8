//! Embedding: a lookup table `W[vocab, dim]`, initialized `N(0, 0.02)`. Used
//! both for the token embedding and the learned positional embedding; the
//! latter is just an `Embedding` looked up with `[0, 1, ..., T-1]`.

use super::module::Module;
use crate::arena::Arena;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::shape::Shape;
use crate::tape::{Tape, VarRef};
use crate::{init, variable::Variable};

const EMBEDDING_STD: f64 = 0.02;

pub struct Embedding {
    table: usize,
    vocab_size: usize,
    dim: usize,
}

impl Embedding {
    pub fn new(store: &mut ParamStore, name: &str, vocab_size: usize, dim: usize) -> Self {
        let w = init::gaussian(&Shape::new(vec![vocab_size, dim]), EMBEDDING_STD);
        let table = store.push(w, format!("{name}.weight"));
        Embedding {
            table,
            vocab_size,
            dim,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn forward(
        &self,
        tape: &mut Tape,
        ids: Vec<usize>,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        tape.record(
            OpKind::EmbeddingLookup,
            vec![VarRef::Parameter(self.table)],
            OpAux::Ids(ids),
            params,
            arena,
        )
    }
}

impl Module for Embedding {
    fn parameters(&self) -> Vec<usize> {
        vec![self.table]
    }
}
