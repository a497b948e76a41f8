//! The append-only computation tape: forward records ops in order, backward
//! walks that same order in reverse.
//!
//! Correctness here depends on one discipline: an op's inputs are always
//! either a model parameter or a value already recorded earlier on this same
//! tape. Given that, a plain reverse scan of the append order already visits
//! every consumer of a value before the value itself, so no topological sort
//! is needed; the append order already is one.

use crate::arena::Arena;
use crate::ops::{Op, OpAux, OpContext, OpError, OpKind, OpRegistry, OpResult};
use crate::tensor::Tensor;
use crate::variable::Variable;
use std::sync::Arc;

/// A handle to a value the tape can read: either a parameter owned by the
/// model (stable across tape resets) or a value this tape produced itself
/// during the current iteration (cleared on [`Tape::reset`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarRef {
    Local(usize),
    Parameter(usize),
}

struct TapeEntry {
    kind: OpKind,
    inputs: Vec<VarRef>,
    output: VarRef,
    aux: OpAux,
    ctx: OpContext,
}

pub struct Tape {
    registry: Arc<OpRegistry>,
    entries: Vec<TapeEntry>,
    locals: Vec<Variable>,
}

impl Tape {
    pub fn new(registry: Arc<OpRegistry>) -> Self {
        Tape {
            registry,
            entries: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Drop every recorded entry and local value. Parameters are untouched;
    /// they belong to the model, not the tape.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.locals.clear();
    }

    fn get_var<'a>(&'a self, r: VarRef, params: &'a [Variable]) -> &'a Variable {
        match r {
            VarRef::Local(i) => &self.locals[i],
            VarRef::Parameter(i) => &params[i],
        }
    }

    pub fn value<'a>(&'a self, r: VarRef, params: &'a [Variable]) -> &'a Tensor {
        self.get_var(r, params).data()
    }

    pub fn grad<'a>(&'a self, r: VarRef, params: &'a [Variable]) -> Option<&'a Tensor> {
        self.get_var(r, params).grad()
    }

    fn accumulate(&mut self, r: VarRef, contribution: &Tensor, params: &mut [Variable]) {
        match r {
            VarRef::Local(i) => self.locals[i].accumulate_grad(contribution),
            VarRef::Parameter(i) => params[i].accumulate_grad(contribution),
        }
    }

    /// Run one op's forward pass, recording it as a new tape entry, and
    /// return a [`VarRef::Local`] for its output. `inputs` may mix parameter
    /// and local refs freely, in any order the op expects them.
    pub fn record(
        &mut self,
        kind: OpKind,
        inputs: Vec<VarRef>,
        aux: OpAux,
        params: &[Variable],
        arena: &Arena,
    ) -> OpResult<VarRef> {
        let op = self
            .registry
            .get(kind)
            .ok_or_else(|| OpError::msg(format!("op {kind:?} is not registered")))?;
        let input_vars: Vec<&Variable> = inputs.iter().map(|&r| self.get_var(r, params)).collect();
        let input_tensors: Vec<&Tensor> = input_vars.iter().map(|v| v.data()).collect();
        let (output, ctx) = op.forward(&input_tensors, &aux, arena)?;
        let var = Variable::temp(arena, output, true);
        let idx = self.locals.len();
        self.locals.push(var);
        self.entries.push(TapeEntry {
            kind,
            inputs,
            output: VarRef::Local(idx),
            aux,
            ctx,
        });
        Ok(VarRef::Local(idx))
    }

    /// Seed `output`'s gradient with ones and walk every recorded entry in
    /// reverse, accumulating each op's backward contribution into its
    /// inputs. `params` supplies the storage for any [`VarRef::Parameter`]
    /// an entry refers to.
    pub fn backward(
        &mut self,
        output: VarRef,
        params: &mut [Variable],
        arena: &Arena,
    ) -> OpResult<()> {
        {
            let shape = self.get_var(output, params).shape().clone();
            let ones = Tensor::temp_from_slice(arena, shape.clone(), &vec![1.0; shape.numel()]);
            self.accumulate(output, &ones, params);
        }

        for idx in (0..self.entries.len()).rev() {
            let step = {
                let entry = &self.entries[idx];
                let output_var = self.get_var(entry.output, params);
                let grad_output = match output_var.grad() {
                    Some(g) => Tensor::temp_from_slice(arena, g.shape().clone(), g.data()),
                    None => continue,
                };
                let data = output_var.data();
                let output_snapshot = Tensor::temp_from_slice(arena, data.shape().clone(), data.data());

                let input_snapshots: Vec<Tensor> = entry
                    .inputs
                    .iter()
                    .map(|&r| {
                        let v = self.get_var(r, params).data();
                        Tensor::temp_from_slice(arena, v.shape().clone(), v.data())
                    })
                    .collect();
                let input_refs: Vec<&Tensor> = input_snapshots.iter().collect();

                let op = self
                    .registry
                    .get(entry.kind)
                    .ok_or_else(|| OpError::msg(format!("op {:?} is not registered", entry.kind)))?;
                let grads = op.backward(&grad_output, &input_refs, &output_snapshot, &entry.ctx, arena)?;
                (entry.inputs.clone(), grads)
            };
            let (inputs, grads) = step;
            for (r, g) in inputs.iter().zip(grads.iter()) {
                self.accumulate(*r, g, params);
            }
        }
        Ok(())
    }
}
