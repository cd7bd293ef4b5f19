use std::io;

use thiserror::Error;

/// Main library error type.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Recurrent cell name not one of `gru`, `lstm`, `rnn`.
    #[error("unsupported RNN cell: {0}")]
    UnsupportedCell(String),

    /// Hyperparameters that cannot build a network.
    #[error("invalid encoder config: {0}")]
    InvalidConfig(String),

    /// Forward called with no sequences.
    #[error("cannot encode an empty batch")]
    EmptyBatch,

    /// A sequence with no tokens cannot be packed.
    #[error("sequence {index} in the batch is empty")]
    EmptySequence { index: usize },

    /// Token id outside the embedding table.
    #[error("token id {token} out of range for vocabulary of size {vocab_size}")]
    TokenOutOfRange { token: i64, vocab_size: usize },

    /// Tensor dims and lengths disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Malformed vocabulary file.
    #[error("invalid vocabulary: {0}")]
    Vocabulary(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EncoderError>;
