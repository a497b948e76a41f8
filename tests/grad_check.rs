//! Backward-pass checks against hand-computed expected gradients, plus
//! finite-difference checks of the analytic gradient for every op and for a
//! two-layer transformer end to end.

use approx::assert_relative_eq;
use fluxcore::{
    Arena, Model, ModelConfig, OpAux, OpKind, OpRegistry, Shape, Tape, Tensor, VarRef, Variable,
};
use std::sync::Arc;

fn tape() -> Tape {
    Tape::new(Arc::new(OpRegistry::default()))
}

fn param(values: &[f64], dims: Vec<usize>, name: &str) -> Variable {
    Variable::parameter(Tensor::persistent(values.to_vec(), Shape::new(dims)), name)
}

#[test]
fn add_backward_matches_hand_computed_gradient() {
    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![
        param(&[1.0, 2.0, 3.0, 4.0], vec![2, 2], "a"),
        param(&[5.0, 6.0, 7.0, 8.0], vec![2, 2], "b"),
    ];
    let c = tape
        .record(
            OpKind::Add,
            vec![VarRef::Parameter(0), VarRef::Parameter(1)],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();
    assert_eq!(tape.value(c, &params).data(), &[6.0, 8.0, 10.0, 12.0]);

    let mut params = params;
    tape.backward(c, &mut params, &arena).unwrap();
    assert_eq!(params[0].grad().unwrap().data(), &[1.0, 1.0, 1.0, 1.0]);
    assert_eq!(params[1].grad().unwrap().data(), &[1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn mul_backward_matches_hand_computed_gradient() {
    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![
        param(&[2.0, 3.0, 4.0, 5.0], vec![2, 2], "a"),
        param(&[6.0, 7.0, 8.0, 9.0], vec![2, 2], "b"),
    ];
    let c = tape
        .record(
            OpKind::Mul,
            vec![VarRef::Parameter(0), VarRef::Parameter(1)],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();

    let mut params = params;
    tape.backward(c, &mut params, &arena).unwrap();
    assert_eq!(params[0].grad().unwrap().data(), &[6.0, 7.0, 8.0, 9.0]);
    assert_eq!(params[1].grad().unwrap().data(), &[2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn relu_backward_zeros_the_gradient_where_the_input_was_negative() {
    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&[2.0, -1.0, 3.0, -2.0], vec![4], "x")];
    let y = tape
        .record(OpKind::ReLU, vec![VarRef::Parameter(0)], OpAux::None, &params, &arena)
        .unwrap();
    assert_eq!(tape.value(y, &params).data(), &[2.0, 0.0, 3.0, 0.0]);

    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    assert_eq!(params[0].grad().unwrap().data(), &[1.0, 0.0, 1.0, 0.0]);
}

/// y = relu(x + 2*x) for scalar x=3: two paths (the direct add input, and the
/// multiply-by-2 input) both feed x, so its gradient sums both contributions.
#[test]
fn a_value_reached_by_two_paths_sums_both_contributions() {
    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![
        param(&[3.0], vec![1], "x"),
        param(&[2.0], vec![1], "two"),
    ];
    let doubled = tape
        .record(
            OpKind::Mul,
            vec![VarRef::Parameter(0), VarRef::Parameter(1)],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();
    let summed = tape
        .record(
            OpKind::Add,
            vec![VarRef::Parameter(0), doubled],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();
    let y = tape
        .record(OpKind::ReLU, vec![summed], OpAux::None, &params, &arena)
        .unwrap();
    assert_eq!(tape.value(y, &params).data(), &[9.0]);

    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    assert_eq!(params[0].grad().unwrap().data(), &[3.0]);
}

/// Finite-difference check of LayerNorm's analytic gradient: perturb one
/// input element, compare the measured slope of a scalar-sum loss against
/// the backward pass's reported gradient for that element.
#[test]
fn layer_norm_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let x_vals = vec![0.3, -1.2, 2.0, 0.7, -0.4, 1.1];
    let gamma_vals = vec![1.0, 1.0, 1.0];
    let beta_vals = vec![0.0, 0.0, 0.0];

    let loss_at = |x: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![
            param(x, vec![2, 3], "x"),
            param(&gamma_vals, vec![3], "gamma"),
            param(&beta_vals, vec![3], "beta"),
        ];
        let y = tape
            .record(
                OpKind::LayerNorm,
                vec![VarRef::Parameter(0), VarRef::Parameter(1), VarRef::Parameter(2)],
                OpAux::None,
                &params,
                &arena,
            )
            .unwrap();
        tape.value(y, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![
        param(&x_vals, vec![2, 3], "x"),
        param(&gamma_vals, vec![3], "gamma"),
        param(&beta_vals, vec![3], "beta"),
    ];
    let y = tape
        .record(
            OpKind::LayerNorm,
            vec![VarRef::Parameter(0), VarRef::Parameter(1), VarRef::Parameter(2)],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();
    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..x_vals.len() {
        let mut plus = x_vals.clone();
        plus[i] += eps;
        let mut minus = x_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

#[test]
fn matmul_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let a_vals = vec![0.3, -1.1, 0.7, 2.0, -0.4, 1.2]; // 2x3
    let b_vals = vec![0.5, -0.2, 1.3, 0.9, -1.0, 0.4]; // 3x2

    let loss_at = |a: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(a, vec![2, 3], "a"), param(&b_vals, vec![3, 2], "b")];
        let y = tape
            .record(
                OpKind::MatMul,
                vec![VarRef::Parameter(0), VarRef::Parameter(1)],
                OpAux::None,
                &params,
                &arena,
            )
            .unwrap();
        tape.value(y, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&a_vals, vec![2, 3], "a"), param(&b_vals, vec![3, 2], "b")];
    let y = tape
        .record(
            OpKind::MatMul,
            vec![VarRef::Parameter(0), VarRef::Parameter(1)],
            OpAux::None,
            &params,
            &arena,
        )
        .unwrap();
    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..a_vals.len() {
        let mut plus = a_vals.clone();
        plus[i] += eps;
        let mut minus = a_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

/// Transpose's backward is a pure permutation, so a plain element-sum loss
/// would be invariant to it and prove nothing; multiplying by a fixed weight
/// tensor first makes the per-element gradient depend on where each input
/// element lands after the transpose.
#[test]
fn transpose_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let x_vals = vec![0.2, -0.5, 1.3, 0.9, -1.1, 0.4]; // 2x3
    let weight_vals = vec![1.0, -2.0, 0.5, 3.0, -0.3, 2.2]; // 3x2

    let loss_at = |x: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(x, vec![2, 3], "x"), param(&weight_vals, vec![3, 2], "w")];
        let t = tape
            .record(OpKind::Transpose, vec![VarRef::Parameter(0)], OpAux::None, &params, &arena)
            .unwrap();
        let z = tape
            .record(OpKind::Mul, vec![t, VarRef::Parameter(1)], OpAux::None, &params, &arena)
            .unwrap();
        tape.value(z, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&x_vals, vec![2, 3], "x"), param(&weight_vals, vec![3, 2], "w")];
    let t = tape
        .record(OpKind::Transpose, vec![VarRef::Parameter(0)], OpAux::None, &params, &arena)
        .unwrap();
    let z = tape
        .record(OpKind::Mul, vec![t, VarRef::Parameter(1)], OpAux::None, &params, &arena)
        .unwrap();
    let mut params = params;
    tape.backward(z, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..x_vals.len() {
        let mut plus = x_vals.clone();
        plus[i] += eps;
        let mut minus = x_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

/// Same rationale as the transpose check above: reshape alone wouldn't move
/// enough to expose an index bug under a plain sum, so a weighted sum after
/// the reshape is used instead.
#[test]
fn reshape_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let x_vals = vec![0.4, -0.9, 1.5, 0.2, -1.3, 0.6]; // 2x3
    let weight_vals = vec![1.2, -0.4, 0.8, -1.5, 2.0, 0.3]; // 3x2

    let loss_at = |x: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(x, vec![2, 3], "x"), param(&weight_vals, vec![3, 2], "w")];
        let r = tape
            .record(
                OpKind::Reshape,
                vec![VarRef::Parameter(0)],
                OpAux::Shape(Shape::new(vec![3, 2])),
                &params,
                &arena,
            )
            .unwrap();
        let z = tape
            .record(OpKind::Mul, vec![r, VarRef::Parameter(1)], OpAux::None, &params, &arena)
            .unwrap();
        tape.value(z, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&x_vals, vec![2, 3], "x"), param(&weight_vals, vec![3, 2], "w")];
    let r = tape
        .record(
            OpKind::Reshape,
            vec![VarRef::Parameter(0)],
            OpAux::Shape(Shape::new(vec![3, 2])),
            &params,
            &arena,
        )
        .unwrap();
    let z = tape
        .record(OpKind::Mul, vec![r, VarRef::Parameter(1)], OpAux::None, &params, &arena)
        .unwrap();
    let mut params = params;
    tape.backward(z, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..x_vals.len() {
        let mut plus = x_vals.clone();
        plus[i] += eps;
        let mut minus = x_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

/// A plain sum of a softmax row's output is always 1 regardless of the
/// input, which would make its gradient trivially zero; weighting by a
/// fixed tensor before summing keeps the loss sensitive to `x`.
#[test]
fn softmax_row_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let x_vals = vec![0.5, 1.2, -0.3, 2.0, -1.0, 0.1]; // 2x3
    let weight_vals = vec![1.0, -0.5, 2.0, 0.3, 1.5, -1.0]; // 2x3

    let loss_at = |x: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(x, vec![2, 3], "x"), param(&weight_vals, vec![2, 3], "w")];
        let s = tape
            .record(OpKind::SoftmaxRow, vec![VarRef::Parameter(0)], OpAux::None, &params, &arena)
            .unwrap();
        let z = tape
            .record(OpKind::Mul, vec![s, VarRef::Parameter(1)], OpAux::None, &params, &arena)
            .unwrap();
        tape.value(z, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&x_vals, vec![2, 3], "x"), param(&weight_vals, vec![2, 3], "w")];
    let s = tape
        .record(OpKind::SoftmaxRow, vec![VarRef::Parameter(0)], OpAux::None, &params, &arena)
        .unwrap();
    let z = tape
        .record(OpKind::Mul, vec![s, VarRef::Parameter(1)], OpAux::None, &params, &arena)
        .unwrap();
    let mut params = params;
    tape.backward(z, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..x_vals.len() {
        let mut plus = x_vals.clone();
        plus[i] += eps;
        let mut minus = x_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

/// `ids` repeats a row (`2` appears twice) so the check also exercises the
/// scatter-add accumulation in the backward pass, not just a single gather.
#[test]
fn embedding_lookup_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let w_vals = vec![0.1, 0.2, -0.3, 0.4, 0.5, -0.6, 0.7, -0.8]; // 4x2
    let ids = vec![0usize, 2, 2, 3];

    let loss_at = |w: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(w, vec![4, 2], "w")];
        let y = tape
            .record(
                OpKind::EmbeddingLookup,
                vec![VarRef::Parameter(0)],
                OpAux::Ids(ids.clone()),
                &params,
                &arena,
            )
            .unwrap();
        tape.value(y, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&w_vals, vec![4, 2], "w")];
    let y = tape
        .record(
            OpKind::EmbeddingLookup,
            vec![VarRef::Parameter(0)],
            OpAux::Ids(ids.clone()),
            &params,
            &arena,
        )
        .unwrap();
    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..w_vals.len() {
        let mut plus = w_vals.clone();
        plus[i] += eps;
        let mut minus = w_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 1e-2);
    }
}

#[test]
fn cross_entropy_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let logits_vals = vec![
        0.5, 1.2, -0.3, 0.1, //
        -0.2, 0.3, 0.8, -1.0, //
        1.0, -0.5, 0.2, 0.4,
    ]; // 3x4
    let target_ids = vec![1usize, 0, 3];

    let loss_at = |logits: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![param(logits, vec![3, 4], "logits")];
        let y = tape
            .record(
                OpKind::CrossEntropy,
                vec![VarRef::Parameter(0)],
                OpAux::TargetIds(target_ids.clone()),
                &params,
                &arena,
            )
            .unwrap();
        tape.value(y, &params).data()[0]
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![param(&logits_vals, vec![3, 4], "logits")];
    let y = tape
        .record(
            OpKind::CrossEntropy,
            vec![VarRef::Parameter(0)],
            OpAux::TargetIds(target_ids.clone()),
            &params,
            &arena,
        )
        .unwrap();
    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..logits_vals.len() {
        let mut plus = logits_vals.clone();
        plus[i] += eps;
        let mut minus = logits_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-4, max_relative = 1e-2);
    }
}

/// FD on `q` alone; the causal mask and per-head softmax make this the most
/// nonlinear op in the registry, so a tighter step and looser relative
/// tolerance are used than the other checks in this file.
#[test]
fn causal_self_attention_gradient_matches_finite_difference() {
    let eps = 1e-6;
    let q_vals = vec![
        0.3, -0.2, 0.5, 0.1, //
        -0.4, 0.6, 0.2, -0.1, //
        0.7, 0.1, -0.3, 0.4,
    ]; // 3x4
    let k_vals = vec![
        0.2, 0.5, -0.1, 0.3, //
        0.4, -0.3, 0.6, 0.1, //
        -0.2, 0.4, 0.3, -0.5,
    ];
    let v_vals = vec![
        1.0, 0.5, -0.5, 0.2, //
        0.3, -0.8, 0.4, 0.6, //
        -0.6, 0.2, 0.9, -0.3,
    ];
    let n_heads = 2usize;

    let loss_at = |q: &[f64]| -> f64 {
        let arena = Arena::new();
        let mut tape = tape();
        let params = vec![
            param(q, vec![3, 4], "q"),
            param(&k_vals, vec![3, 4], "k"),
            param(&v_vals, vec![3, 4], "v"),
        ];
        let y = tape
            .record(
                OpKind::CausalSelfAttention,
                vec![VarRef::Parameter(0), VarRef::Parameter(1), VarRef::Parameter(2)],
                OpAux::NHeads(n_heads),
                &params,
                &arena,
            )
            .unwrap();
        tape.value(y, &params).data().iter().sum()
    };

    let arena = Arena::new();
    let mut tape = tape();
    let params = vec![
        param(&q_vals, vec![3, 4], "q"),
        param(&k_vals, vec![3, 4], "k"),
        param(&v_vals, vec![3, 4], "v"),
    ];
    let y = tape
        .record(
            OpKind::CausalSelfAttention,
            vec![VarRef::Parameter(0), VarRef::Parameter(1), VarRef::Parameter(2)],
            OpAux::NHeads(n_heads),
            &params,
            &arena,
        )
        .unwrap();
    let mut params = params;
    tape.backward(y, &mut params, &arena).unwrap();
    let analytic = params[0].grad().unwrap().data().to_vec();

    for i in 0..q_vals.len() {
        let mut plus = q_vals.clone();
        plus[i] += eps;
        let mut minus = q_vals.clone();
        minus[i] -= eps;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * eps);
        assert_relative_eq!(analytic[i], numeric, epsilon = 1e-3, max_relative = 2e-2);
    }
}

/// End-to-end finite-difference check through a real two-layer transformer:
/// perturbs one element of the token embedding table and compares against
/// the gradient `Model::forward` + `CrossEntropy` + `Tape::backward` produce
/// for it, covering the composition of every layer rather than one op.
#[test]
fn two_layer_transformer_gradient_matches_finite_difference() {
    let eps = 1e-4;
    let config = ModelConfig {
        vocab_size: 11,
        d_model: 8,
        n_heads: 2,
        n_layers: 2,
        d_ff: 16,
        max_seq_len: 5,
    };
    let mut model = Model::new(config).unwrap();
    let token_ids = vec![0usize, 2, 3];
    let target_ids = vec![2usize, 3, 4];

    let loss_with = |model: &Model| -> f64 {
        let arena = Arena::new();
        let mut t = Tape::new(Arc::new(OpRegistry::default()));
        let params = model.params().as_slice();
        let logits = model.forward(&mut t, token_ids.clone(), &arena).unwrap();
        let loss_ref = t
            .record(
                OpKind::CrossEntropy,
                vec![logits],
                OpAux::TargetIds(target_ids.clone()),
                params,
                &arena,
            )
            .unwrap();
        t.value(loss_ref, params).data()[0]
    };

    let arena = Arena::new();
    let mut t = Tape::new(Arc::new(OpRegistry::default()));
    let logits = model.forward(&mut t, token_ids.clone(), &arena).unwrap();
    let loss_ref = t
        .record(
            OpKind::CrossEntropy,
            vec![logits],
            OpAux::TargetIds(target_ids.clone()),
            model.params().as_slice(),
            &arena,
        )
        .unwrap();
    t.backward(loss_ref, model.params_mut().as_mut_slice(), &arena).unwrap();
    let analytic = model.params().as_slice()[0].grad().unwrap().data()[0];

    let original = model.params().as_slice()[0].data().data()[0];
    model.params_mut().as_mut_slice()[0].data_mut().data_mut()[0] = original + eps;
    let loss_plus = loss_with(&model);
    model.params_mut().as_mut_slice()[0].data_mut().data_mut()[0] = original - eps;
    let loss_minus = loss_with(&model);
    model.params_mut().as_mut_slice()[0].data_mut().data_mut()[0] = original;

    let numeric = (loss_plus - loss_minus) / (2.0 * eps);
    assert_relative_eq!(analytic, numeric, epsilon = 1e-3, max_relative = 5e-2);
}
