//! Full model: token + positional embedding, a stack of transformer blocks,
//! a final LayerNorm, and an output projection to vocabulary logits.

use super::block::TransformerBlock;
use super::embedding::Embedding;
use super::layer_norm::LayerNorm;
use super::linear::Linear;
use super::module::Module;
use crate::arena::Arena;
use crate::config::ModelConfig;
use crate::ops::{OpAux, OpKind, OpResult};
use crate::params::ParamStore;
use crate::tape::{Tape, VarRef};

pub struct Model {
    config: ModelConfig,
    params: ParamStore,
    token_embedding: Embedding,
    position_embedding: Embedding,
    blocks: Vec<TransformerBlock>,
    ln_f: LayerNorm,
    head: Linear,
}

impl Model {
    pub fn new(config: ModelConfig) -> crate::config::ConfigResult<Self> {
        config.validate()?;
        let mut params = ParamStore::new();
        let token_embedding = Embedding::new(&mut params, "token_embedding", config.vocab_size, config.d_model);
        let position_embedding = Embedding::new(
            &mut params,
            "position_embedding",
            config.max_seq_len,
            config.d_model,
        );
        let blocks = (0..config.n_layers)
            .map(|i| {
                TransformerBlock::new(
                    &mut params,
                    &format!("block{i}"),
                    config.d_model,
                    config.n_heads,
                    config.d_ff,
                )
            })
            .collect();
        let ln_f = LayerNorm::new(&mut params, "ln_f", config.d_model);
        let head = Linear::new(&mut params, "head", config.d_model, config.vocab_size);
        Ok(Model {
            config,
            params,
            token_embedding,
            position_embedding,
            blocks,
            ln_f,
            head,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    /// Forward pass for one sequence of token ids. `token_ids.len()` must not
    /// exceed `max_seq_len`. Returns a `VarRef` for the `[T, vocab_size]` logits.
    pub fn forward(&self, tape: &mut Tape, token_ids: Vec<usize>, arena: &Arena) -> OpResult<VarRef> {
        let t = token_ids.len();
        debug_assert!(t <= self.config.max_seq_len, "sequence longer than max_seq_len");
        let params = self.params.as_slice();

        let tok_emb = self.token_embedding.forward(tape, token_ids, params, arena)?;
        let positions: Vec<usize> = (0..t).collect();
        let pos_emb = self.position_embedding.forward(tape, positions, params, arena)?;
        let mut x = tape.record(OpKind::Add, vec![tok_emb, pos_emb], OpAux::None, params, arena)?;

        for block in &self.blocks {
            x = block.forward(tape, x, params, arena)?;
        }
        let x = self.ln_f.forward(tape, x, params, arena)?;
        self.head.forward(tape, x, params, arena)
    }
}

impl Module for Model {
    fn parameters(&self) -> Vec<usize> {
        let mut all = self.token_embedding.parameters();
        all.extend(self.position_embedding.parameters());
        for block in &self.blocks {
            all.extend(block.parameters());
        }
        all.extend(self.ln_f.parameters());
        all.extend(self.head.parameters());
        all
    }
}
