//! Training loop: the orchestrator that ties `Model`, `Tape`, `Adam`, and
//! `Arena` together into one iteration.
//!
//! Per iteration, in order: zero every parameter's gradient, reset the tape,
//! run forward to logits, score against targets with cross-entropy, run
//! `tape.backward` (which seeds the loss gradient with `1.0` itself), step
//! the optimizer, optionally checkpoint, and reset the arena last of all --
//! no temporary produced this iteration is read after that reset.

use crate::arena::Arena;
use crate::checkpoint::{self, CheckpointError, LoadedCheckpoint};
use crate::config::{ConfigError, TrainConfig};
use crate::data::Sample;
use crate::nn::Model;
use crate::ops::{OpAux, OpError, OpKind, OpRegistry};
use crate::optimizer::{Adam, Optimizer, OptimizerError};
use crate::tape::Tape;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("op error: {0}")]
    Op(#[from] OpError),
    #[error("optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("loss is not finite: {0}")]
    NonFiniteLoss(f64),
}

pub type TrainResult<T> = Result<T, TrainError>;

/// Result of one training step.
#[derive(Debug)]
pub struct TrainStepResult {
    pub loss: f64,
    pub lr: f64,
}

/// Owns the model, optimizer, tape, and arena for one training run and
/// drives them through the per-iteration update.
pub struct Trainer {
    model: Model,
    optimizer: Adam,
    tape: Tape,
    arena: Arena,
    config: TrainConfig,
    iteration: u32,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> TrainResult<Self> {
        config.validate()?;
        let model = Model::new(config.model.clone())?;
        let optimizer = Adam::new(&config.optimizer, model.params());
        let registry = Arc::new(OpRegistry::default());
        let tape = Tape::new(registry);
        let arena = Arena::with_chunk_size(config.arena.default_chunk_elems * 8);
        Ok(Trainer {
            model,
            optimizer,
            tape,
            arena,
            config,
            iteration: 0,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Load a previously saved checkpoint, resuming the iteration count and
    /// optimizer moment state it carries.
    pub fn load_checkpoint(&mut self, path: impl AsRef<std::path::Path>) -> TrainResult<LoadedCheckpoint> {
        let meta = checkpoint::load_checkpoint(path, &mut self.model, &mut self.optimizer)?;
        self.iteration = meta.iteration.max(0) as u32;
        Ok(meta)
    }

    /// One training iteration over a single sequence.
    #[instrument(skip(self, sample), fields(iteration = self.iteration, seq_len = sample.len()))]
    pub fn step(&mut self, sample: &Sample) -> TrainResult<TrainStepResult> {
        debug!("zeroing parameter gradients");
        self.model.params_mut().zero_grad();

        debug!("resetting tape");
        self.tape.reset();

        debug!("running forward pass");
        let logits = self
            .model
            .forward(&mut self.tape, sample.input_ids.clone(), &self.arena)?;

        debug!("scoring cross-entropy loss");
        let loss_ref = self.tape.record(
            OpKind::CrossEntropy,
            vec![logits],
            OpAux::TargetIds(sample.target_ids.clone()),
            self.model.params().as_slice(),
            &self.arena,
        )?;
        let loss = self.tape.value(loss_ref, self.model.params().as_slice()).data()[0];
        if !loss.is_finite() {
            return Err(TrainError::NonFiniteLoss(loss));
        }

        debug!("running backward pass");
        self.tape
            .backward(loss_ref, self.model.params_mut().as_mut_slice(), &self.arena)?;

        let lr = self.config.optimizer.lr_at(self.iteration);
        self.optimizer.set_lr(lr);
        debug!(lr, "stepping optimizer");
        self.optimizer.step(self.model.params_mut())?;

        self.iteration += 1;
        info!(iteration = self.iteration, loss, lr, "completed training step");

        if self.config.checkpoint_interval > 0 && self.iteration % self.config.checkpoint_interval == 0 {
            info!(path = %self.config.checkpoint_path, "saving checkpoint");
            checkpoint::save_checkpoint(
                &self.config.checkpoint_path,
                &self.model,
                &self.optimizer,
                self.iteration as i32,
                loss,
                lr,
            )?;
        }

        debug!("resetting arena");
        if self.config.arena.compaction_interval > 0
            && self.iteration % self.config.arena.compaction_interval == 0
        {
            self.arena.reset_compact();
        } else {
            self.arena.reset();
        }

        Ok(TrainStepResult { loss, lr })
    }

    /// Run one step per sample in every batch the loader yields, in order.
    /// Returns the mean loss over all samples processed and how many there were.
    pub fn run_epoch<D: crate::data::Dataset>(
        &mut self,
        loader: &mut crate::data::DataLoader<'_, D>,
    ) -> TrainResult<(f64, usize)> {
        let mut total_loss = 0.0f64;
        let mut count = 0usize;
        while let Some(batch) = loader.next_batch() {
            for sample in &batch {
                let result = self.step(sample)?;
                total_loss += result.loss;
                count += 1;
            }
        }
        let mean = if count > 0 { total_loss / count as f64 } else { 0.0 };
        Ok((mean, count))
    }
}
