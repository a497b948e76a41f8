//! Plain, serializable configuration surface: architecture, optimizer,
//! arena, and run-schedule constants. Round-trips through `serde_json` so a
//! caller can persist a run's settings next to its checkpoints; this is
//! ambient tooling, distinct from the checkpoint file's fixed binary layout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Architecture constants. Validated once at model-construction time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub d_model: usize,
    pub n_heads: usize,
    pub n_layers: usize,
    pub d_ff: usize,
    pub max_seq_len: usize,
}

impl ModelConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.vocab_size == 0
            || self.d_model == 0
            || self.n_heads == 0
            || self.n_layers == 0
            || self.d_ff == 0
            || self.max_seq_len == 0
        {
            return Err(ConfigError::Invalid(
                "all ModelConfig sizes must be > 0".into(),
            ));
        }
        if self.d_model % self.n_heads != 0 {
            return Err(ConfigError::Invalid(format!(
                "d_model {} is not divisible by n_heads {}",
                self.d_model, self.n_heads
            )));
        }
        Ok(())
    }
}

/// Adam hyperparameters plus the linear-warmup/cosine-decay schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub warmup_steps: u32,
    pub total_steps: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            lr: 3e-4,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            warmup_steps: 0,
            total_steps: 0,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.lr <= 0.0 {
            return Err(ConfigError::Invalid("lr must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(ConfigError::Invalid("beta1/beta2 must be in [0, 1)".into()));
        }
        Ok(())
    }

    /// Linear warmup over `warmup_steps` to `lr`, then cosine decay to 0 over
    /// the remaining `total_steps - warmup_steps`. Returns `self.lr` unscaled
    /// if no schedule was configured (`total_steps == 0`).
    pub fn lr_at(&self, step: u32) -> f64 {
        if self.total_steps == 0 {
            return self.lr;
        }
        if step < self.warmup_steps {
            return self.lr * (step as f64 + 1.0) / (self.warmup_steps.max(1) as f64);
        }
        let remaining = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = (step - self.warmup_steps).min(remaining) as f64 / remaining as f64;
        let cosine = 0.5 * (1.0 + (std::f64::consts::PI * progress).cos());
        self.lr * cosine
    }
}

/// Arena sizing and compaction cadence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// First chunk size, in `f64` elements.
    pub default_chunk_elems: usize,
    /// Call `reset_compact` every `compaction_interval` iterations; `reset` otherwise.
    pub compaction_interval: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            default_chunk_elems: 1 << 20,
            compaction_interval: 50,
        }
    }
}

/// Bundles the above plus checkpoint cadence/path for one training run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
    pub arena: ArenaConfig,
    /// Save a checkpoint every `checkpoint_interval` iterations; 0 disables it.
    pub checkpoint_interval: u32,
    pub checkpoint_path: String,
}

impl TrainConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.model.validate()?;
        self.optimizer.validate()?;
        Ok(())
    }
}
