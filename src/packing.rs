//! Ragged batch handling
//!
//! A batch of token sequences rarely has one length. [`PaddedBatch`] turns the
//! raw sequences into a dense, right-padded id tensor, and [`PackedSequence`]
//! lays the embedded batch out timestep by timestep so a recurrent layer only
//! touches rows that still have tokens:
//!
//! ```text
//! lengths (caller order)   [2, 4, 3]
//! sorted_indices           [1, 2, 0]
//! batch_sizes              [3, 3, 2, 1]   // rows alive at t = 0, 1, 2, 3
//! ```
//!
//! Rows are sorted by descending length so the live rows at step `t` are
//! always the first `batch_sizes[t]`. [`PackedSequence::pad`] undoes both the
//! packing and the sort.

use burn::tensor::backend::Backend;
use burn::tensor::{Bool, Int, Tensor};

use crate::error::{EncoderError, Result};

/// Per-sequence lengths after truncation to `max_len`
pub fn effective_lengths<S: AsRef<[usize]>>(batch: &[S], max_len: usize) -> Vec<usize> {
    batch
        .iter()
        .map(|seq| seq.as_ref().len().min(max_len))
        .collect()
}

fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let ints: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
    Tensor::<B, 1, Int>::from_ints(ints.as_slice(), device)
}

/// `[batch, seq_len]`, true where the position is below the row's length
pub fn valid_mask<B: Backend>(
    lengths: &[usize],
    seq_len: usize,
    device: &B::Device,
) -> Tensor<B, 2, Bool> {
    let batch_size = lengths.len();
    let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, device)
        .unsqueeze::<2>()
        .expand([batch_size, seq_len]);
    let lengths = index_tensor::<B>(lengths, device)
        .reshape([batch_size, 1])
        .expand([batch_size, seq_len]);

    positions.lower(lengths)
}

/// Truncated, right-padded token ids
#[derive(Clone, Debug)]
pub struct PaddedBatch<B: Backend> {
    /// `[batch, max effective length]`
    pub tokens: Tensor<B, 2, Int>,
    /// Effective length of each row
    pub lengths: Vec<usize>,
}

impl<B: Backend> PaddedBatch<B> {
    /// Truncate every sequence to `max_len` and pad the batch with `pad_id`
    ///
    /// The time dimension is the longest effective length in the batch, not
    /// `max_len`.
    pub fn from_sequences<S: AsRef<[usize]>>(
        batch: &[S],
        max_len: usize,
        pad_id: usize,
        device: &B::Device,
    ) -> Result<Self> {
        if batch.is_empty() {
            return Err(EncoderError::EmptyBatch);
        }
        if let Some(index) = batch.iter().position(|seq| seq.as_ref().is_empty()) {
            return Err(EncoderError::EmptySequence { index });
        }

        let lengths = effective_lengths(batch, max_len);
        let seq_len = lengths.iter().copied().max().unwrap_or(0);
        if seq_len == 0 {
            return Err(EncoderError::InvalidConfig(
                "max_len must be at least 1".to_string(),
            ));
        }

        let mut flat: Vec<i32> = Vec::with_capacity(batch.len() * seq_len);
        for (seq, &len) in batch.iter().zip(&lengths) {
            flat.extend(seq.as_ref()[..len].iter().map(|&id| id as i32));
            flat.extend(std::iter::repeat(pad_id as i32).take(seq_len - len));
        }

        let tokens = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
            .reshape([batch.len(), seq_len]);

        Ok(Self { tokens, lengths })
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    pub fn seq_len(&self) -> usize {
        self.tokens.dims()[1]
    }
}

/// A batch stored as one tensor per timestep, holding only live rows
///
/// Step `t` has shape `[batch_sizes[t], features]` and its rows follow
/// `sorted_indices`.
#[derive(Clone, Debug)]
pub struct PackedSequence<B: Backend> {
    steps: Vec<Tensor<B, 2>>,
    lengths: Vec<usize>,
    batch_sizes: Vec<usize>,
    sorted_indices: Vec<usize>,
    unsorted_indices: Vec<usize>,
}

impl<B: Backend> PackedSequence<B> {
    /// Pack a dense `[batch, seq, features]` tensor
    ///
    /// # Arguments
    /// * `input` - Batch-first padded input
    /// * `lengths` - Valid timesteps per row, in the input's row order. Each
    ///   must be in `1..=seq`.
    pub fn pack(input: Tensor<B, 3>, lengths: &[usize]) -> Result<Self> {
        let [batch_size, seq_len, _] = input.dims();
        if batch_size == 0 || lengths.is_empty() {
            return Err(EncoderError::EmptyBatch);
        }
        if lengths.len() != batch_size {
            return Err(EncoderError::ShapeMismatch(format!(
                "{} lengths for a batch of {}",
                lengths.len(),
                batch_size
            )));
        }
        if let Some(index) = lengths.iter().position(|&len| len == 0) {
            return Err(EncoderError::EmptySequence { index });
        }
        if let Some(&len) = lengths.iter().find(|&&len| len > seq_len) {
            return Err(EncoderError::ShapeMismatch(format!(
                "length {} exceeds padded sequence length {}",
                len, seq_len
            )));
        }

        let mut sorted_indices: Vec<usize> = (0..batch_size).collect();
        // Stable: equal lengths keep caller order.
        sorted_indices.sort_by(|&a, &b| lengths[b].cmp(&lengths[a]));

        let mut unsorted_indices = vec![0; batch_size];
        for (position, &row) in sorted_indices.iter().enumerate() {
            unsorted_indices[row] = position;
        }

        let max_len = lengths[sorted_indices[0]];
        let batch_sizes: Vec<usize> = (0..max_len)
            .map(|t| lengths.iter().filter(|&&len| len > t).count())
            .collect();

        let is_sorted = sorted_indices.iter().enumerate().all(|(i, &row)| i == row);
        let sorted = if is_sorted {
            input
        } else {
            let device = input.device();
            input.select(0, index_tensor::<B>(&sorted_indices, &device))
        };

        let steps = batch_sizes
            .iter()
            .enumerate()
            .map(|(t, &rows)| {
                sorted
                    .clone()
                    .narrow(1, t, 1)
                    .squeeze_dim::<2>(1)
                    .narrow(0, 0, rows)
            })
            .collect();

        Ok(Self {
            steps,
            lengths: lengths.to_vec(),
            batch_sizes,
            sorted_indices,
            unsorted_indices,
        })
    }

    /// Same layout, new per-step data (e.g. the output of a recurrent layer)
    pub fn with_steps(&self, steps: Vec<Tensor<B, 2>>) -> Result<Self> {
        if steps.len() != self.steps.len() {
            return Err(EncoderError::ShapeMismatch(format!(
                "{} steps for a packed sequence of {}",
                steps.len(),
                self.steps.len()
            )));
        }
        for (t, (step, &rows)) in steps.iter().zip(&self.batch_sizes).enumerate() {
            if step.dims()[0] != rows {
                return Err(EncoderError::ShapeMismatch(format!(
                    "step {} has {} rows, expected {}",
                    t,
                    step.dims()[0],
                    rows
                )));
            }
        }

        Ok(Self {
            steps,
            lengths: self.lengths.clone(),
            batch_sizes: self.batch_sizes.clone(),
            sorted_indices: self.sorted_indices.clone(),
            unsorted_indices: self.unsorted_indices.clone(),
        })
    }

    pub fn steps(&self) -> &[Tensor<B, 2>] {
        &self.steps
    }

    pub fn step(&self, t: usize) -> Option<Tensor<B, 2>> {
        self.steps.get(t).cloned()
    }

    /// Valid lengths in caller order
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    pub fn unsorted_indices(&self) -> &[usize] {
        &self.unsorted_indices
    }

    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Longest valid length
    pub fn max_len(&self) -> usize {
        self.batch_sizes.len()
    }

    /// Reorder dimension `dim` of a caller-ordered tensor into packed order
    pub fn sort_batch<const D: usize>(&self, tensor: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
        let device = tensor.device();
        tensor.select(dim, index_tensor::<B>(&self.sorted_indices, &device))
    }

    /// Reorder dimension `dim` of a packed-order tensor back into caller order
    pub fn unsort_batch<const D: usize>(&self, tensor: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
        let device = tensor.device();
        tensor.select(dim, index_tensor::<B>(&self.unsorted_indices, &device))
    }

    /// Dense `[batch, max_len, features]` in caller order, zeros past each length
    pub fn pad(&self) -> Tensor<B, 3> {
        let batch_size = self.batch_size();
        let padded: Vec<Tensor<B, 2>> = self
            .steps
            .iter()
            .map(|step| {
                let [rows, features] = step.dims();
                if rows == batch_size {
                    step.clone()
                } else {
                    let fill = Tensor::zeros([batch_size - rows, features], &step.device());
                    Tensor::cat(vec![step.clone(), fill], 0)
                }
            })
            .collect();

        let dense: Tensor<B, 3> = Tensor::stack(padded, 1);
        self.unsort_batch(dense, 0)
    }
}
