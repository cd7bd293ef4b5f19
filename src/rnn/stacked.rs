//! Multi-layer recurrent layer over packed sequences
//!
//! Drives a stack of [`RecurrentCell`]s across a [`PackedSequence`]. At step
//! `t` only the first `batch_sizes[t]` rows advance; the others have run out
//! of tokens and keep the state they reached at their last valid step.

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::cells::{CellKind, CellState, RecurrentCell};
use crate::error::{EncoderError, Result};
use crate::packing::PackedSequence;

/// Final state of every layer
#[derive(Clone, Debug)]
pub struct EncoderState<B: Backend> {
    /// `[n_layers, batch, hidden_size]`
    pub hidden: Tensor<B, 3>,
    /// `[n_layers, batch, hidden_size]`, LSTM only
    pub cell: Option<Tensor<B, 3>>,
}

impl<B: Backend> EncoderState<B> {
    pub fn n_layers(&self) -> usize {
        self.hidden.dims()[0]
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[1]
    }

    /// Hidden state of the top layer, `[batch, hidden_size]`
    pub fn last_layer(&self) -> Tensor<B, 2> {
        let layers = self.n_layers();
        self.hidden.clone().narrow(0, layers - 1, 1).squeeze_dim::<2>(0)
    }

    fn layer(&self, index: usize) -> CellState<B> {
        CellState {
            hidden: self.hidden.clone().narrow(0, index, 1).squeeze_dim::<2>(0),
            cell: self
                .cell
                .as_ref()
                .map(|c| c.clone().narrow(0, index, 1).squeeze_dim::<2>(0)),
        }
    }

    fn from_layers(layers: Vec<CellState<B>>) -> Self {
        let has_cell = layers.iter().all(|l| l.cell.is_some());
        let mut hidden = Vec::with_capacity(layers.len());
        let mut cells = Vec::with_capacity(layers.len());
        for layer in layers {
            hidden.push(layer.hidden);
            if let Some(cell) = layer.cell {
                cells.push(cell);
            }
        }

        Self {
            hidden: Tensor::stack(hidden, 0),
            cell: (has_cell && !cells.is_empty()).then(|| Tensor::stack(cells, 0)),
        }
    }
}

/// Stack of recurrent layers with dropout between them
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct StackedRnn<B: Backend> {
    layers: Vec<RecurrentCell<B>>,
    /// Applied to the outputs of every layer except the last
    dropout: Dropout,
    input_size: usize,
    hidden_size: usize,
}

impl<B: Backend> StackedRnn<B> {
    /// Create a stack of `n_layers` cells of the given kind
    ///
    /// # Arguments
    /// * `kind` - Recurrent cell kind for every layer
    /// * `input_size` - Features fed to the first layer
    /// * `hidden_size` - State width of every layer
    /// * `n_layers` - Number of stacked layers, at least 1
    /// * `dropout` - Dropout probability between layers
    /// * `device` - Device to create the module on
    pub fn new(
        kind: CellKind,
        input_size: usize,
        hidden_size: usize,
        n_layers: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let layers = (0..n_layers)
            .map(|layer| {
                let layer_input = if layer == 0 { input_size } else { hidden_size };
                RecurrentCell::new(kind, layer_input, hidden_size, device)
            })
            .collect();

        Self {
            layers,
            dropout: DropoutConfig::new(dropout).init(),
            input_size,
            hidden_size,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.layers
            .first()
            .map(|layer| layer.kind())
            .unwrap_or(CellKind::Gru)
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Zero initial state for `batch_size` rows
    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> EncoderState<B> {
        EncoderState::from_layers(
            self.layers
                .iter()
                .map(|layer| layer.zero_state(batch_size, device))
                .collect(),
        )
    }

    /// Run every layer over the packed input
    ///
    /// # Arguments
    /// * `input` - Packed `[batch_sizes[t], input_size]` steps
    /// * `state` - Optional initial state in caller batch order; zeros if `None`
    ///
    /// # Returns
    /// Tuple of (packed top-layer outputs, final state in caller batch order)
    pub fn forward(
        &self,
        input: &PackedSequence<B>,
        state: Option<EncoderState<B>>,
    ) -> Result<(PackedSequence<B>, EncoderState<B>)> {
        let batch_size = input.batch_size();
        let device = match input.steps().first() {
            Some(step) => step.device(),
            None => return Err(EncoderError::EmptyBatch),
        };

        let initial = match state {
            Some(state) => {
                self.check_state(&state, batch_size)?;
                EncoderState {
                    hidden: input.sort_batch(state.hidden, 1),
                    cell: state.cell.map(|c| input.sort_batch(c, 1)),
                }
            }
            None => self.zero_state(batch_size, &device),
        };

        let mut steps: Vec<Tensor<B, 2>> = input.steps().to_vec();
        let mut finals = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            if index > 0 {
                steps = steps.into_iter().map(|s| self.dropout.forward(s)).collect();
            }

            let (outputs, last) =
                Self::run_layer(layer, steps, input.batch_sizes(), initial.layer(index));
            steps = outputs;
            finals.push(last);
        }

        let sorted = EncoderState::from_layers(finals);
        let final_state = EncoderState {
            hidden: input.unsort_batch(sorted.hidden, 1),
            cell: sorted.cell.map(|c| input.unsort_batch(c, 1)),
        };

        Ok((input.with_steps(steps)?, final_state))
    }

    fn run_layer(
        layer: &RecurrentCell<B>,
        steps: Vec<Tensor<B, 2>>,
        batch_sizes: &[usize],
        mut state: CellState<B>,
    ) -> (Vec<Tensor<B, 2>>, CellState<B>) {
        let batch_size = state.batch_size();
        let mut outputs = Vec::with_capacity(steps.len());

        for (step, &rows) in steps.into_iter().zip(batch_sizes) {
            let active = if rows == batch_size {
                state.clone()
            } else {
                state.narrow(0, rows)
            };

            let next = layer.forward(step, active);
            outputs.push(next.hidden.clone());

            state = if rows == batch_size {
                next
            } else {
                next.concat(state.narrow(rows, batch_size - rows))
            };
        }

        (outputs, state)
    }

    fn check_state(&self, state: &EncoderState<B>, batch_size: usize) -> Result<()> {
        let expected = [self.layers.len(), batch_size, self.hidden_size];
        if state.hidden.dims() != expected {
            return Err(EncoderError::ShapeMismatch(format!(
                "initial hidden state {:?}, expected {:?}",
                state.hidden.dims(),
                expected
            )));
        }
        if let Some(cell) = &state.cell {
            if cell.dims() != expected {
                return Err(EncoderError::ShapeMismatch(format!(
                    "initial cell state {:?}, expected {:?}",
                    cell.dims(),
                    expected
                )));
            }
        }
        Ok(())
    }
}
