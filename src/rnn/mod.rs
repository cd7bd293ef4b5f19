//! # Recurrent Layers for Sequence Processing
//!
//! [`StackedRnn`] runs a stack of recurrent cells over a
//! [`PackedSequence`](crate::packing::PackedSequence). Most users reach it
//! through [`EncoderRnn`](crate::encoder::EncoderRnn), which adds the
//! embedding table and input dropout in front.
//!
//! ## Layer Wiring
//!
//! | Layer | Input | Output |
//! |-------|-------|--------|
//! | 0 | `input_size` | `hidden_size` |
//! | 1..n | `hidden_size` (after dropout) | `hidden_size` |
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | packed step `t` | `[batch_sizes[t], features]` |
//! | padded output | `[batch, max_len, hidden_size]` |
//! | [`EncoderState::hidden`] | `[n_layers, batch, hidden_size]` |
//! | [`EncoderState::cell`] (LSTM) | `[n_layers, batch, hidden_size]` |
//!
//! ## Example
//!
//! ```ignore
//! use rnn_encoder::cells::CellKind;
//! use rnn_encoder::packing::PackedSequence;
//! use rnn_encoder::rnn::StackedRnn;
//!
//! let rnn = StackedRnn::<Backend>::new(CellKind::Gru, 16, 32, 2, 0.1, &device);
//!
//! // [batch=3, seq=5, features=16], rows valid for 5, 2 and 4 steps
//! let packed = PackedSequence::pack(input, &[5, 2, 4])?;
//! let (output, state) = rnn.forward(&packed, None)?;
//!
//! // output.pad(): [3, 5, 32], zeros past each row's length
//! // state.hidden: [2, 3, 32]
//! ```

pub mod stacked;

pub use stacked::{EncoderState, StackedRnn};
