//! A checkpoint saved mid-training, loaded into a fresh trainer, must resume
//! at the same iteration with the same parameters and produce the same loss
//! on its next step as the original run would have.

use fluxcore::{ArenaConfig, ModelConfig, OptimizerConfig, Sample, TrainConfig, Trainer};

fn tiny_config(checkpoint_interval: u32, checkpoint_path: String) -> TrainConfig {
    TrainConfig {
        model: ModelConfig {
            vocab_size: 12,
            d_model: 16,
            n_heads: 4,
            n_layers: 2,
            d_ff: 32,
            max_seq_len: 6,
        },
        optimizer: OptimizerConfig {
            lr: 5e-3,
            ..OptimizerConfig::default()
        },
        arena: ArenaConfig::default(),
        checkpoint_interval,
        checkpoint_path,
    }
}

#[test]
fn resumed_training_matches_the_uninterrupted_run() {
    let path = std::env::temp_dir().join(format!(
        "fluxcore-integration-ckpt-{}.ckpt",
        std::process::id()
    ));
    let sample = Sample::new(vec![1, 2, 3, 4, 5], vec![2, 3, 4, 5, 6]);

    // Train two steps, checkpointing right after the second; a third step
    // off the uninterrupted trainer is the value a correct resume must match.
    let mut uninterrupted =
        Trainer::new(tiny_config(2, path.to_string_lossy().into_owned())).unwrap();
    uninterrupted.step(&sample).unwrap();
    uninterrupted.step(&sample).unwrap();
    let expected_next_loss = uninterrupted.step(&sample).unwrap().loss;

    // A freshly constructed trainer, with no checkpointing of its own so it
    // cannot clobber the file it is about to read, resumes from that point.
    let mut resumed = Trainer::new(tiny_config(0, String::new())).unwrap();
    resumed.load_checkpoint(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(resumed.iteration(), 2);
    let actual_next_loss = resumed.step(&sample).unwrap().loss;
    assert!((actual_next_loss - expected_next_loss).abs() < 1e-9);
}
