//! # rnn-encoder - Recurrent Sequence Encoder
//!
//! Multi-layer recurrent encoder for sequence-to-sequence models, built on
//! the Burn framework.
//!
//! ## Features
//!
//! - **Cells**: GRU, LSTM and Elman RNN, selectable by name
//! - **Stacking**: any number of layers with dropout between them
//! - **Ragged batches**: sequences are packed so padding never reaches the
//!   recurrent cells, then padded back with zeros
//! - **Truncation**: each sequence is encoded up to a configured `max_len`
//! - **Vocabulary**: token/id mapping with reserved special tokens
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use rnn_encoder::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let encoder = EncoderRnnConfig::new(100, 10, 16)
//!     .with_n_layers(2)
//!     .with_rnn_cell(CellKind::Lstm)
//!     .init::<Backend>(&device)
//!     .unwrap();
//!
//! let batch = vec![vec![4, 5, 6], vec![7, 8]];
//! let encoded = encoder.forward(&batch).unwrap();
//!
//! assert_eq!(encoded.output.dims(), [2, 3, 16]);
//! assert_eq!(encoded.state.hidden.dims(), [2, 2, 16]);
//! assert_eq!(encoded.lengths, vec![3, 2]);
//! ```
//!
//! ## Building from a Vocabulary
//!
//! ```ignore
//! let vocab = Vocabulary::from_tokens("the cat sat on the mat".split(' '));
//! let encoder = EncoderRnnConfig::from_vocab(&vocab, 50, 256)
//!     .with_cell_name("gru")?
//!     .init::<Backend>(&device)?;
//!
//! let ids = vocab.encode(&["the", "cat"]);
//! let encoded = encoder.forward(&[ids])?;
//! ```

pub mod cells;
pub mod encoder;
pub mod error;
pub mod packing;
pub mod rnn;
pub mod vocab;

pub use error::{EncoderError, Result};

pub mod prelude {
    pub use crate::cells::{CellKind, CellState, GRUCell, LSTMCell, RNNCell, RecurrentCell};
    pub use crate::encoder::{EncoderOutput, EncoderRnn, EncoderRnnConfig};
    pub use crate::error::EncoderError;
    pub use crate::packing::{PackedSequence, PaddedBatch};
    pub use crate::rnn::{EncoderState, StackedRnn};
    pub use crate::vocab::Vocabulary;
}
