//! # Recurrent Cell Implementations
//!
//! Single-timestep cells driven across a sequence by
//! [`StackedRnn`](crate::rnn::StackedRnn).
//!
//! ## Cell Types
//!
//! | Cell | [`CellKind`] | State |
//! |------|--------------|-------|
//! | [`GRUCell`] | `gru` | hidden |
//! | [`LSTMCell`] | `lstm` | hidden + cell |
//! | [`RNNCell`] | `rnn` | hidden |
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input` | `[batch, input_size]` |
//! | `hidden` | `[batch, hidden_size]` |
//! | `cell` (LSTM only) | `[batch, hidden_size]` |
//!
//! ## Selecting a Cell by Name
//!
//! ```rust
//! use rnn_encoder::cells::CellKind;
//!
//! let kind: CellKind = "LSTM".parse().unwrap();
//! assert_eq!(kind, CellKind::Lstm);
//! assert!("transformer".parse::<CellKind>().is_err());
//! ```

pub mod gru_cell;
pub mod lstm_cell;
pub mod rnn_cell;

pub use gru_cell::GRUCell;
pub use lstm_cell::LSTMCell;
pub use rnn_cell::RNNCell;

use std::fmt;
use std::str::FromStr;

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::EncoderError;

/// Recurrent cell variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Gru = 0,
    Lstm = 1,
    Rnn = 2,
}

impl CellKind {
    pub fn name(&self) -> &'static str {
        match self {
            CellKind::Gru => "gru",
            CellKind::Lstm => "lstm",
            CellKind::Rnn => "rnn",
        }
    }

    /// Whether the cell carries a memory cell next to its hidden state
    pub fn has_cell_state(&self) -> bool {
        matches!(self, CellKind::Lstm)
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => CellKind::Lstm,
            2 => CellKind::Rnn,
            _ => CellKind::Gru,
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellKind {
    type Err = EncoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gru" => Ok(CellKind::Gru),
            "lstm" => Ok(CellKind::Lstm),
            "rnn" => Ok(CellKind::Rnn),
            _ => Err(EncoderError::UnsupportedCell(s.to_string())),
        }
    }
}

/// Per-timestep state of one recurrent layer
#[derive(Clone, Debug)]
pub struct CellState<B: Backend> {
    /// `[batch, hidden_size]`
    pub hidden: Tensor<B, 2>,
    /// `[batch, hidden_size]`, present for LSTM only
    pub cell: Option<Tensor<B, 2>>,
}

impl<B: Backend> CellState<B> {
    pub fn zeros(kind: CellKind, batch_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let hidden = Tensor::zeros([batch_size, hidden_size], device);
        let cell = kind
            .has_cell_state()
            .then(|| Tensor::zeros([batch_size, hidden_size], device));
        Self { hidden, cell }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[0]
    }

    /// Rows `start..start + length`
    pub fn narrow(&self, start: usize, length: usize) -> Self {
        Self {
            hidden: self.hidden.clone().narrow(0, start, length),
            cell: self.cell.as_ref().map(|c| c.clone().narrow(0, start, length)),
        }
    }

    /// Stack `self` over `rest` along the batch dimension
    pub fn concat(self, rest: Self) -> Self {
        let hidden = Tensor::cat(vec![self.hidden, rest.hidden], 0);
        let cell = match (self.cell, rest.cell) {
            (Some(a), Some(b)) => Some(Tensor::cat(vec![a, b], 0)),
            _ => None,
        };
        Self { hidden, cell }
    }
}

/// One recurrent layer holding a cell of the configured kind
#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    /// Kind: 0=GRU, 1=LSTM, 2=RNN
    kind: u8,
    input_size: usize,
    hidden_size: usize,
    gru: Option<GRUCell<B>>,
    lstm: Option<LSTMCell<B>>,
    rnn: Option<RNNCell<B>>,
}

impl<B: Backend> RecurrentCell<B> {
    pub fn new(kind: CellKind, input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let (gru, lstm, rnn) = match kind {
            CellKind::Gru => (Some(GRUCell::new(input_size, hidden_size, device)), None, None),
            CellKind::Lstm => (None, Some(LSTMCell::new(input_size, hidden_size, device)), None),
            CellKind::Rnn => (None, None, Some(RNNCell::new(input_size, hidden_size, device))),
        };

        Self {
            kind: kind as u8,
            input_size,
            hidden_size,
            gru,
            lstm,
            rnn,
        }
    }

    pub fn kind(&self) -> CellKind {
        CellKind::from_code(self.kind)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> CellState<B> {
        CellState::zeros(self.kind(), batch_size, self.hidden_size, device)
    }

    /// Advance one timestep
    ///
    /// `input` is `[batch, input_size]`, `state` must cover the same batch rows.
    pub fn forward(&self, input: Tensor<B, 2>, state: CellState<B>) -> CellState<B> {
        match (self.kind(), &self.gru, &self.lstm, &self.rnn) {
            (CellKind::Gru, Some(gru), _, _) => CellState {
                hidden: gru.forward(input, state.hidden),
                cell: None,
            },
            (CellKind::Lstm, _, Some(lstm), _) => {
                let cell = state
                    .cell
                    .unwrap_or_else(|| state.hidden.zeros_like());
                let (hidden, cell) = lstm.forward(input, (state.hidden, cell));
                CellState {
                    hidden,
                    cell: Some(cell),
                }
            }
            (CellKind::Rnn, _, _, Some(rnn)) => CellState {
                hidden: rnn.forward(input, state.hidden),
                cell: None,
            },
            (kind, ..) => unreachable!("{} layer built without its cell", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_cell_kind_parse() {
        assert_eq!("gru".parse::<CellKind>().unwrap(), CellKind::Gru);
        assert_eq!(" Lstm ".parse::<CellKind>().unwrap(), CellKind::Lstm);
        assert_eq!("RNN".parse::<CellKind>().unwrap(), CellKind::Rnn);

        let err = "conv".parse::<CellKind>().unwrap_err();
        assert!(matches!(err, EncoderError::UnsupportedCell(ref name) if name == "conv"));
    }

    #[test]
    fn test_cell_kind_display_roundtrips() {
        for kind in [CellKind::Gru, CellKind::Lstm, CellKind::Rnn] {
            assert_eq!(kind.to_string().parse::<CellKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_cell_kind_serde_lowercase() {
        let json = serde_json::to_string(&CellKind::Lstm).unwrap();
        assert_eq!(json, "\"lstm\"");
        let kind: CellKind = serde_json::from_str("\"rnn\"").unwrap();
        assert_eq!(kind, CellKind::Rnn);
    }

    #[test]
    fn test_recurrent_cell_kinds() {
        let device = Default::default();
        for kind in [CellKind::Gru, CellKind::Lstm, CellKind::Rnn] {
            let cell = RecurrentCell::<TestBackend>::new(kind, 4, 8, &device);
            assert_eq!(cell.kind(), kind);

            let state = cell.zero_state(3, &device);
            assert_eq!(state.cell.is_some(), kind.has_cell_state());

            let input = Tensor::<TestBackend, 2>::ones([3, 4], &device);
            let next = cell.forward(input, state);
            assert_eq!(next.hidden.dims(), [3, 8]);
            assert_eq!(next.cell.is_some(), kind.has_cell_state());
        }
    }

    #[test]
    fn test_recurrent_cell_dispatches_to_its_kind() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 2>::ones([2, 4], &device);
        let hidden = Tensor::<TestBackend, 2>::ones([2, 8], &device) * 0.5;

        let gru = RecurrentCell::<TestBackend>::new(CellKind::Gru, 4, 8, &device);
        assert!(gru.lstm.is_none() && gru.rnn.is_none());
        let expected = gru.gru.as_ref().unwrap().forward(input.clone(), hidden.clone());
        let state = CellState { hidden: hidden.clone(), cell: None };
        let diff: f32 = (gru.forward(input.clone(), state).hidden - expected)
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);

        let lstm = RecurrentCell::<TestBackend>::new(CellKind::Lstm, 4, 8, &device);
        assert!(lstm.gru.is_none() && lstm.rnn.is_none());
        let (expected, _) = lstm
            .lstm
            .as_ref()
            .unwrap()
            .forward(input.clone(), (hidden.clone(), hidden.zeros_like()));
        let state = CellState { hidden: hidden.clone(), cell: None };
        let diff: f32 = (lstm.forward(input.clone(), state).hidden - expected)
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);

        let rnn = RecurrentCell::<TestBackend>::new(CellKind::Rnn, 4, 8, &device);
        assert!(rnn.gru.is_none() && rnn.lstm.is_none());
        let expected = rnn.rnn.as_ref().unwrap().forward(input.clone(), hidden.clone());
        let state = CellState { hidden, cell: None };
        let diff: f32 = (rnn.forward(input, state).hidden - expected)
            .abs()
            .max()
            .into_scalar();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_cell_state_narrow_concat() {
        let device = Default::default();
        let state = CellState::<TestBackend>::zeros(CellKind::Lstm, 5, 2, &device);

        let head = state.narrow(0, 3);
        let tail = state.narrow(3, 2);
        assert_eq!(head.batch_size(), 3);
        assert_eq!(tail.batch_size(), 2);

        let joined = head.concat(tail);
        assert_eq!(joined.hidden.dims(), [5, 2]);
        assert_eq!(joined.cell.map(|c| c.dims()), Some([5, 2]));
    }
}
