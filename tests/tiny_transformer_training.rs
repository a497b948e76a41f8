//! S5: a tiny one-layer transformer trained on a single four-token sequence
//! should have its loss go down on most of its first few steps.

use fluxcore::{ArenaConfig, ModelConfig, OptimizerConfig, Sample, TrainConfig, Trainer};

fn tiny_config() -> TrainConfig {
    TrainConfig {
        model: ModelConfig {
            vocab_size: 10,
            d_model: 16,
            n_heads: 2,
            n_layers: 1,
            d_ff: 32,
            max_seq_len: 4,
        },
        optimizer: OptimizerConfig {
            lr: 1e-2,
            ..OptimizerConfig::default()
        },
        arena: ArenaConfig::default(),
        checkpoint_interval: 0,
        checkpoint_path: String::new(),
    }
}

#[test]
fn loss_decreases_on_at_least_four_of_five_steps() {
    let mut trainer = Trainer::new(tiny_config()).unwrap();
    let sample = Sample::new(vec![1, 2, 3, 4], vec![2, 3, 4, 5]);

    let mut losses = Vec::with_capacity(5);
    for _ in 0..5 {
        losses.push(trainer.step(&sample).unwrap().loss);
    }

    let decreasing = losses.windows(2).filter(|w| w[1] < w[0]).count();
    assert!(
        decreasing >= 4,
        "expected at least 4 of 5 steps to decrease loss, got {decreasing}: {losses:?}"
    );
}
