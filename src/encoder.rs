//! Recurrent sequence encoder
//!
//! Embeds a batch of token-id sequences, applies input dropout, packs the
//! batch so padding is never fed to the recurrent stack, runs the stack and
//! pads the result back to a dense tensor.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Bool, ElementConversion, Int, Tensor};

use crate::cells::CellKind;
use crate::error::{self, EncoderError};
use crate::packing::{effective_lengths, valid_mask, PackedSequence, PaddedBatch};
use crate::rnn::{EncoderState, StackedRnn};
use crate::vocab::Vocabulary;

#[derive(Config, Debug)]
pub struct EncoderRnnConfig {
    /// Rows in the embedding table
    pub vocab_size: usize,
    /// Longest prefix of a sequence that is encoded
    pub max_len: usize,
    /// Width of embeddings and of every recurrent state
    pub hidden_size: usize,
    /// Dropout on the embedded input
    #[config(default = 0.0)]
    pub input_dropout: f64,
    /// Dropout between stacked recurrent layers
    #[config(default = 0.0)]
    pub dropout: f64,
    #[config(default = 1)]
    pub n_layers: usize,
    #[config(default = "CellKind::Gru")]
    pub rnn_cell: CellKind,
    /// Id written into padding positions
    #[config(default = 0)]
    pub pad_id: usize,
}

impl EncoderRnnConfig {
    /// Config sized for `vocab`, padding with its `<pad>` id
    pub fn from_vocab(vocab: &Vocabulary, max_len: usize, hidden_size: usize) -> Self {
        Self::new(vocab.vocab_size(), max_len, hidden_size).with_pad_id(vocab.pad_id())
    }

    /// Select the cell by name (`"gru"`, `"lstm"` or `"rnn"`)
    pub fn with_cell_name(self, name: &str) -> error::Result<Self> {
        Ok(self.with_rnn_cell(name.parse()?))
    }

    pub fn validate(&self) -> error::Result<()> {
        let invalid = |msg: String| Err(EncoderError::InvalidConfig(msg));

        if self.vocab_size == 0 {
            return invalid("vocab_size must be at least 1".to_string());
        }
        if self.max_len == 0 {
            return invalid("max_len must be at least 1".to_string());
        }
        if self.hidden_size == 0 {
            return invalid("hidden_size must be at least 1".to_string());
        }
        if self.n_layers == 0 {
            return invalid("n_layers must be at least 1".to_string());
        }
        for (name, p) in [("input_dropout", self.input_dropout), ("dropout", self.dropout)] {
            if !(0.0..1.0).contains(&p) {
                return invalid(format!("{} must be in [0, 1), got {}", name, p));
            }
        }
        if self.pad_id >= self.vocab_size {
            return invalid(format!(
                "pad_id {} outside vocabulary of size {}",
                self.pad_id, self.vocab_size
            ));
        }
        Ok(())
    }

    /// Build the encoder on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<EncoderRnn<B>> {
        self.validate()?;

        let embedding = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let input_dropout = DropoutConfig::new(self.input_dropout).init();
        let rnn = StackedRnn::new(
            self.rnn_cell,
            self.hidden_size,
            self.hidden_size,
            self.n_layers,
            self.dropout,
            device,
        );

        tracing::debug!(
            "Built {} encoder: vocab={} hidden={} layers={} max_len={}",
            self.rnn_cell,
            self.vocab_size,
            self.hidden_size,
            self.n_layers,
            self.max_len
        );

        Ok(EncoderRnn {
            embedding,
            input_dropout,
            rnn,
            vocab_size: self.vocab_size,
            max_len: self.max_len,
            pad_id: self.pad_id,
        })
    }
}

/// Multi-layer recurrent encoder
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct EncoderRnn<B: Backend> {
    embedding: Embedding<B>,
    input_dropout: Dropout,
    rnn: StackedRnn<B>,
    vocab_size: usize,
    max_len: usize,
    pad_id: usize,
}

/// Result of one encoder pass
#[derive(Clone, Debug)]
pub struct EncoderOutput<B: Backend> {
    /// `[batch, max(lengths), hidden_size]`, zeros past each row's length
    pub output: Tensor<B, 3>,
    /// Final state of every layer
    pub state: EncoderState<B>,
    /// Valid timesteps per row: `min(max_len, sequence length)`
    pub lengths: Vec<usize>,
}

impl<B: Backend> EncoderOutput<B> {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// `[batch, max(lengths)]`, true on valid positions
    pub fn mask(&self) -> Tensor<B, 2, Bool> {
        let [_, seq_len, _] = self.output.dims();
        valid_mask(&self.lengths, seq_len, &self.output.device())
    }

    /// Valid outputs of one row, `[lengths[row], hidden_size]`
    pub fn row(&self, row: usize) -> Option<Tensor<B, 2>> {
        let len = *self.lengths.get(row)?;
        Some(
            self.output
                .clone()
                .narrow(0, row, 1)
                .narrow(1, 0, len)
                .squeeze_dim::<2>(0),
        )
    }
}

impl<B: Backend> EncoderRnn<B> {
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn hidden_size(&self) -> usize {
        self.rnn.hidden_size()
    }

    pub fn n_layers(&self) -> usize {
        self.rnn.n_layers()
    }

    pub fn cell_kind(&self) -> CellKind {
        self.rnn.kind()
    }

    pub fn pad_id(&self) -> usize {
        self.pad_id
    }

    /// Encode a batch of token-id sequences
    ///
    /// Each sequence is truncated to `max_len`. Sequences may have different
    /// lengths and need not be sorted.
    ///
    /// # Returns
    /// [`EncoderOutput`] with:
    /// - output: `[batch, max effective length, hidden_size]`
    /// - state: `[n_layers, batch, hidden_size]` (plus the cell state for LSTM)
    /// - lengths: effective length of each sequence
    pub fn forward<S: AsRef<[usize]>>(&self, batch: &[S]) -> error::Result<EncoderOutput<B>> {
        self.check_tokens(batch)?;

        let device = self.device();
        let padded = PaddedBatch::from_sequences(batch, self.max_len, self.pad_id, &device)?;
        self.encode(padded.tokens, padded.lengths, None)
    }

    /// Encode an already padded `[batch, seq]` id tensor
    ///
    /// # Arguments
    /// * `tokens` - Right-padded token ids
    /// * `lengths` - Valid tokens per row; capped at `max_len`
    /// * `state` - Optional initial state `[n_layers, batch, hidden_size]`
    pub fn forward_padded(
        &self,
        tokens: Tensor<B, 2, Int>,
        lengths: &[usize],
        state: Option<EncoderState<B>>,
    ) -> error::Result<EncoderOutput<B>> {
        let [batch_size, seq_len] = tokens.dims();
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

        let lengths: Vec<usize> = lengths.iter().map(|&len| len.min(self.max_len)).collect();
        for (index, &len) in lengths.iter().enumerate() {
            if len == 0 {
                return Err(EncoderError::EmptySequence { index });
            }
            if len > seq_len {
                return Err(EncoderError::ShapeMismatch(format!(
                    "row {} has length {} but the tensor holds {} steps",
                    index, len, seq_len
                )));
            }
        }

        // Only ids inside each row's capped length reach the embedding.
        let steps = lengths.iter().copied().max().unwrap_or(seq_len);
        let tokens = tokens.narrow(1, 0, steps);
        let invalid = valid_mask::<B>(&lengths, steps, &tokens.device()).bool_not();
        let tokens = tokens.mask_fill(invalid, self.pad_id as i64);

        let min = tokens.clone().min().into_scalar().elem::<i64>();
        let max = tokens.clone().max().into_scalar().elem::<i64>();
        if min < 0 || max >= self.vocab_size as i64 {
            return Err(EncoderError::TokenOutOfRange {
                token: if min < 0 { min } else { max },
                vocab_size: self.vocab_size,
            });
        }

        self.encode(tokens, lengths, state)
    }

    fn encode(
        &self,
        tokens: Tensor<B, 2, Int>,
        lengths: Vec<usize>,
        state: Option<EncoderState<B>>,
    ) -> error::Result<EncoderOutput<B>> {
        let [_, seq_len] = tokens.dims();
        let steps = lengths.iter().copied().max().unwrap_or(0);
        let tokens = if steps > 0 && steps < seq_len {
            tokens.narrow(1, 0, steps)
        } else {
            tokens
        };

        let embedded = self.embedding.forward(tokens);
        let embedded = self.input_dropout.forward(embedded);

        let packed = PackedSequence::pack(embedded, &lengths)?;
        let (output, state) = self.rnn.forward(&packed, state)?;

        tracing::trace!(
            "Encoded batch of {} sequences over {} steps",
            lengths.len(),
            packed.max_len()
        );

        Ok(EncoderOutput {
            output: output.pad(),
            state,
            lengths,
        })
    }

    fn check_tokens<S: AsRef<[usize]>>(&self, batch: &[S]) -> error::Result<()> {
        let lengths = effective_lengths(batch, self.max_len);
        for (seq, len) in batch.iter().zip(lengths) {
            if let Some(&token) = seq.as_ref()[..len].iter().find(|&&t| t >= self.vocab_size) {
                return Err(EncoderError::TokenOutOfRange {
                    token: token as i64,
                    vocab_size: self.vocab_size,
                });
            }
        }
        Ok(())
    }

    fn device(&self) -> B::Device {
        self.embedding.weight.val().device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn encoder(kind: CellKind, n_layers: usize) -> EncoderRnn<TestBackend> {
        let device = Default::default();
        EncoderRnnConfig::new(20, 6, 8)
            .with_n_layers(n_layers)
            .with_rnn_cell(kind)
            .init(&device)
            .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = EncoderRnnConfig::new(100, 10, 32);
        assert_eq!(config.input_dropout, 0.0);
        assert_eq!(config.dropout, 0.0);
        assert_eq!(config.n_layers, 1);
        assert_eq!(config.rnn_cell, CellKind::Gru);
        assert_eq!(config.pad_id, 0);
    }

    #[test]
    fn test_config_validation() {
        let device = Default::default();
        let bad = [
            EncoderRnnConfig::new(0, 10, 8),
            EncoderRnnConfig::new(10, 0, 8),
            EncoderRnnConfig::new(10, 10, 0),
            EncoderRnnConfig::new(10, 10, 8).with_n_layers(0),
            EncoderRnnConfig::new(10, 10, 8).with_dropout(1.0),
            EncoderRnnConfig::new(10, 10, 8).with_input_dropout(-0.1),
            EncoderRnnConfig::new(10, 10, 8).with_pad_id(10),
        ];
        for config in bad {
            assert!(matches!(
                config.init::<TestBackend>(&device),
                Err(EncoderError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_cell_name() {
        let config = EncoderRnnConfig::new(10, 10, 8).with_cell_name("lstm").unwrap();
        assert_eq!(config.rnn_cell, CellKind::Lstm);

        assert!(matches!(
            EncoderRnnConfig::new(10, 10, 8).with_cell_name("qrnn"),
            Err(EncoderError::UnsupportedCell(_))
        ));
    }

    #[test]
    fn test_encoder_accessors() {
        let enc = encoder(CellKind::Lstm, 3);
        assert_eq!(enc.vocab_size(), 20);
        assert_eq!(enc.max_len(), 6);
        assert_eq!(enc.hidden_size(), 8);
        assert_eq!(enc.n_layers(), 3);
        assert_eq!(enc.cell_kind(), CellKind::Lstm);
    }

    #[test]
    fn test_forward_shapes() {
        let enc = encoder(CellKind::Gru, 2);
        let batch = vec![vec![1, 2, 3], vec![4, 5, 6, 7, 8], vec![9]];

        let out = enc.forward(&batch).unwrap();

        assert_eq!(out.output.dims(), [3, 5, 8]);
        assert_eq!(out.state.hidden.dims(), [2, 3, 8]);
        assert!(out.state.cell.is_none());
        assert_eq!(out.lengths, vec![3, 5, 1]);
    }

    #[test]
    fn test_forward_caps_lengths() {
        let enc = encoder(CellKind::Rnn, 1);
        let batch = vec![vec![1; 10], vec![2; 4]];

        let out = enc.forward(&batch).unwrap();
        assert_eq!(out.lengths, vec![6, 4]);
        assert_eq!(out.output.dims(), [2, 6, 8]);
    }

    #[test]
    fn test_padding_positions_are_zero() {
        let enc = encoder(CellKind::Lstm, 2);
        let batch = vec![vec![3, 4], vec![5, 6, 7, 8]];

        let out = enc.forward(&batch).unwrap();
        let tail: f32 = out
            .output
            .clone()
            .narrow(0, 0, 1)
            .narrow(1, 2, 2)
            .abs()
            .sum()
            .into_scalar();
        assert_eq!(tail, 0.0);

        let head: f32 = out.output.narrow(0, 0, 1).narrow(1, 0, 2).abs().sum().into_scalar();
        assert!(head > 0.0);
    }

    #[test]
    fn test_mask_and_row() {
        let enc = encoder(CellKind::Gru, 1);
        let out = enc.forward(&[vec![1, 2], vec![3, 4, 5]]).unwrap();

        let mask: Vec<bool> = out.mask().into_data().to_vec().unwrap();
        assert_eq!(mask, vec![true, true, false, true, true, true]);

        assert_eq!(out.row(0).map(|r| r.dims()), Some([2, 8]));
        assert_eq!(out.row(1).map(|r| r.dims()), Some([3, 8]));
        assert!(out.row(2).is_none());
    }

    #[test]
    fn test_forward_errors() {
        let enc = encoder(CellKind::Gru, 1);

        let empty: Vec<Vec<usize>> = vec![];
        assert!(matches!(enc.forward(&empty), Err(EncoderError::EmptyBatch)));

        assert!(matches!(
            enc.forward(&[vec![1], vec![]]),
            Err(EncoderError::EmptySequence { index: 1 })
        ));

        assert!(matches!(
            enc.forward(&[vec![1, 20]]),
            Err(EncoderError::TokenOutOfRange { token: 20, vocab_size: 20 })
        ));
    }

    #[test]
    fn test_out_of_range_token_past_max_len_is_ignored() {
        let enc = encoder(CellKind::Gru, 1);
        // Token 99 sits beyond max_len = 6 and is truncated away.
        let out = enc.forward(&[vec![1, 2, 3, 4, 5, 6, 99]]).unwrap();
        assert_eq!(out.lengths, vec![6]);
    }

    #[test]
    fn test_forward_padded_matches_forward() {
        let device = Default::default();
        let enc = encoder(CellKind::Gru, 2);
        let batch = vec![vec![1, 2, 3], vec![4, 5]];

        let from_lists = enc.forward(&batch).unwrap();

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 5, 0], &device)
            .reshape([2, 3]);
        let from_tensor = enc.forward_padded(tokens, &[3, 2], None).unwrap();

        let diff: f32 = (from_lists.output - from_tensor.output)
            .abs()
            .max()
            .into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_forward_padded_checks_tokens() {
        let device = Default::default();
        let enc = encoder(CellKind::Gru, 1);

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 25], &device).reshape([1, 2]);
        assert!(matches!(
            enc.forward_padded(tokens, &[2], None),
            Err(EncoderError::TokenOutOfRange { token: 25, .. })
        ));

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, -3], &device).reshape([1, 2]);
        assert!(matches!(
            enc.forward_padded(tokens, &[2], None),
            Err(EncoderError::TokenOutOfRange { token: -3, vocab_size: 20 })
        ));

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 2], &device).reshape([1, 2]);
        assert!(matches!(
            enc.forward_padded(tokens, &[2, 2], None),
            Err(EncoderError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_forward_padded_ignores_tokens_past_max_len() {
        let device = Default::default();
        let enc = encoder(CellKind::Gru, 1);

        // Id 99 sits at position 7, past max_len = 6.
        let tokens =
            Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 5, 6, 7, 99], &device)
                .reshape([1, 8]);
        let out = enc.forward_padded(tokens, &[8], None).unwrap();
        assert_eq!(out.lengths, vec![6]);
        assert_eq!(out.output.dims(), [1, 6, 8]);

        let truncated = enc.forward(&[vec![1, 2, 3, 4, 5, 6]]).unwrap();
        let diff: f32 = (out.output - truncated.output).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_forward_padded_ignores_ids_in_padding() {
        let device = Default::default();
        let enc = encoder(CellKind::Lstm, 1);

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, -1, 50], &device)
            .reshape([2, 3]);
        let out = enc.forward_padded(tokens, &[3, 1], None).unwrap();
        assert_eq!(out.lengths, vec![3, 1]);
    }

    #[test]
    fn test_forward_padded_checks_lengths_before_reading_tokens() {
        let device = Default::default();
        let enc = encoder(CellKind::Gru, 1);

        let tokens = Tensor::<TestBackend, 2, Int>::zeros([1, 0], &device);
        assert!(matches!(
            enc.forward_padded(tokens, &[2], None),
            Err(EncoderError::ShapeMismatch(_))
        ));

        let tokens = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3], &device).reshape([1, 3]);
        assert!(matches!(
            enc.forward_padded(tokens.clone(), &[4], None),
            Err(EncoderError::ShapeMismatch(_))
        ));
        assert!(matches!(
            enc.forward_padded(tokens, &[0], None),
            Err(EncoderError::EmptySequence { index: 0 })
        ));
    }
}
