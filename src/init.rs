//! Weight initialization: Xavier uniform for linear layers, Gaussian for
//! embedding tables. Pure functions over the thread-local RNG; deterministic
//! for a fixed seed set via [`crate::runtime::set_seed`].

use crate::runtime::with_rng;
use crate::shape::Shape;
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Xavier (Glorot) uniform: scale = sqrt(6 / (fan_in + fan_out)). Expects a
/// rank-2 `[fan_in, fan_out]` shape, which is how every `Linear` weight in
/// this crate is laid out.
pub fn xavier_uniform(shape: &Shape) -> Tensor {
    let dims = shape.dims();
    let (fan_in, fan_out) = match dims {
        [fan_in, fan_out] => (*fan_in, *fan_out),
        _ => (shape.numel().max(1), 1),
    };
    let scale = (6.0f64 / (fan_in + fan_out) as f64).sqrt();
    let n = shape.numel();
    let data: Vec<f64> = with_rng(|rng| (0..n).map(|_| rng.gen_range(-scale..=scale)).collect());
    Tensor::persistent(data, shape.clone())
}

/// N(0, std) fill, used for embedding tables (std = 0.02 throughout this crate).
pub fn gaussian(shape: &Shape, std: f64) -> Tensor {
    let n = shape.numel();
    let normal = Normal::new(0.0, std).expect("std must be finite and positive");
    let data: Vec<f64> = with_rng(|rng| (0..n).map(|_| normal.sample(rng)).collect());
    Tensor::persistent(data, shape.clone())
}

/// All-zero fill, used for biases and LayerNorm's beta.
pub fn zeros(shape: &Shape) -> Tensor {
    Tensor::zeros_persistent(shape.clone())
}

/// All-one fill, used for LayerNorm's gamma.
pub fn ones(shape: &Shape) -> Tensor {
    Tensor::persistent(vec![1.0; shape.numel()], shape.clone())
}
