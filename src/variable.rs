//! A `Variable` pairs a data tensor with its (lazily meaningful) gradient
//! tensor, plus the two flags that decide how both are stored and reset.

use crate::arena::Arena;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// One node's worth of data: a tensor, an optional same-shaped gradient, and
/// the flags that say whether it is tracked and whether it belongs to the
/// model (and therefore to the checkpoint).
pub struct Variable {
    data: Tensor,
    grad: Option<Tensor>,
    requires_grad: bool,
    is_parameter: bool,
    name: Option<String>,
}

impl Variable {
    /// A model parameter: persistent data and persistent grad, always tracked.
    pub fn parameter(data: Tensor, name: impl Into<String>) -> Self {
        let grad = Tensor::zeros_persistent(data.shape().clone());
        Variable {
            data,
            grad: Some(grad),
            requires_grad: true,
            is_parameter: true,
            name: Some(name.into()),
        }
    }

    /// A non-parameter value produced during one iteration. `requires_grad`
    /// controls whether a gradient buffer is allocated at all; constants
    /// (e.g. the causal mask) pass `false` and never pay for one.
    pub fn temp(arena: &Arena, data: Tensor, requires_grad: bool) -> Self {
        let grad = if requires_grad {
            Some(Tensor::temp(arena, data.shape().clone()))
        } else {
            None
        };
        Variable {
            data,
            grad,
            requires_grad,
            is_parameter: false,
            name: None,
        }
    }

    pub fn shape(&self) -> &Shape {
        self.data.shape()
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Tensor {
        &mut self.data
    }

    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    pub fn grad_mut(&mut self) -> Option<&mut Tensor> {
        self.grad.as_mut()
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn is_parameter(&self) -> bool {
        self.is_parameter
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Zero the gradient buffer in place without reallocating, so a
    /// parameter's grad tensor keeps its identity across iterations.
    pub fn zero_grad(&mut self) {
        if let Some(g) = self.grad.as_mut() {
            g.fill(0.0);
        }
    }

    /// Accumulate `contribution` into this variable's gradient. No-op if the
    /// variable does not track gradients.
    pub fn accumulate_grad(&mut self, contribution: &Tensor) {
        if let Some(g) = self.grad.as_mut() {
            g.accumulate(contribution);
        }
    }
}
