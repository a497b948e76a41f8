//! Reshape: metadata-only reinterpretation of the same elements. Backward
//! reshapes the incoming gradient back to the original shape.

use super::{Op, OpAux, OpContext, OpError, OpKind, OpResult};
use crate::arena::Arena;
use crate::tensor::Tensor;

pub struct Reshape;

impl Op for Reshape {
    fn kind(&self) -> OpKind {
        OpKind::Reshape
    }

    fn name(&self) -> &'static str {
        "Reshape"
    }

    fn forward(
        &self,
        inputs: &[&Tensor],
        aux: &OpAux,
        arena: &Arena,
    ) -> OpResult<(Tensor, OpContext)> {
        if inputs.len() != 1 {
            return Err(OpError::msg("Reshape requires 1 input"));
        }
        let target = match aux {
            OpAux::Shape(s) => s.clone(),
            _ => return Err(OpError::msg("Reshape requires a target shape")),
        };
        Ok((inputs[0].reshape(target, arena)?, OpContext::None))
    }

    fn backward(
        &self,
        grad_output: &Tensor,
        inputs: &[&Tensor],
        _output: &Tensor,
        _ctx: &OpContext,
        arena: &Arena,
    ) -> OpResult<Vec<Tensor>> {
        if inputs.len() != 1 {
            return Err(OpError::msg("Reshape backward requires 1 input"));
        }
        let original = inputs[0].shape().clone();
        Ok(vec![grad_output.reshape(original, arena)?])
    }
}
