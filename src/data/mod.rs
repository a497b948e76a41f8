//! Data pipeline: pre-tokenized `(input_ids, target_ids)` pairs, batched for
//! the training loop. No text handling or tokenizer lives here; a `Sample`
//! is already token ids by the time it reaches this module.

/// One training example: a sequence of input token ids and the target ids
/// the model should predict at each position (typically the input shifted
/// by one). Both must be the same length and no longer than the model's
/// `max_seq_len`; the trainer checks the latter.
#[derive(Clone, Debug)]
pub struct Sample {
    pub input_ids: Vec<usize>,
    pub target_ids: Vec<usize>,
}

impl Sample {
    pub fn new(input_ids: Vec<usize>, target_ids: Vec<usize>) -> Self {
        debug_assert_eq!(
            input_ids.len(),
            target_ids.len(),
            "input_ids and target_ids must have the same length"
        );
        Sample { input_ids, target_ids }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Indexed collection of samples.
pub trait Dataset {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<&Sample>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory dataset of pre-tokenized samples.
pub struct InMemoryDataset {
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        InMemoryDataset { samples }
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }
}

/// Iterates a [`Dataset`] in fixed-size batches, no shuffling. Each batch is
/// a `Vec` of cloned samples; since this engine's forward pass runs one
/// sequence at a time (no batched matmul dimension), the training loop runs
/// one full zero_grad/forward/backward/step cycle per sample in the batch,
/// so `batch_size` controls logging and checkpoint cadence rather than
/// combining samples into one larger tensor.
pub struct DataLoader<'a, D: Dataset> {
    dataset: &'a D,
    batch_size: usize,
    index: usize,
}

impl<'a, D: Dataset> DataLoader<'a, D> {
    pub fn new(dataset: &'a D, batch_size: usize) -> Self {
        DataLoader {
            dataset,
            batch_size: batch_size.max(1),
            index: 0,
        }
    }

    /// Next batch of samples, or `None` once the dataset is exhausted.
    pub fn next_batch(&mut self) -> Option<Vec<Sample>> {
        let start = self.index;
        if start >= self.dataset.len() {
            return None;
        }
        let end = (start + self.batch_size).min(self.dataset.len());
        let batch: Vec<Sample> = (start..end)
            .filter_map(|i| self.dataset.get(i).cloned())
            .collect();
        self.index = end;
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    /// Reset to the start of the dataset.
    pub fn reset(&mut self) {
        self.index = 0;
    }
}
