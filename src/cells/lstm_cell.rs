use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Long short-term memory cell
///
/// Implements the LSTM equations, gates laid out as (i, f, g, o):
/// - i = sigmoid(W_ii @ x + b_ii + W_hi @ h + b_hi)
/// - f = sigmoid(W_if @ x + b_if + W_hf @ h + b_hf)
/// - g = tanh(W_ig @ x + b_ig + W_hg @ h + b_hg)
/// - o = sigmoid(W_io @ x + b_io + W_ho @ h + b_ho)
/// - c' = f * c + i * g
/// - h' = o * tanh(c')
#[derive(Module, Debug)]
pub struct LSTMCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input_map: Linear<B>,     // Maps input to 4 * hidden_size
    recurrent_map: Linear<B>, // Maps hidden state to 4 * hidden_size
}

impl<B: Backend> LSTMCell<B> {
    /// Create a new LSTM cell
    ///
    /// # Arguments
    /// * `input_size` - Size of the input features
    /// * `hidden_size` - Size of the hidden state
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, 4 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 4 * hidden_size)
            .with_bias(true)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_map,
            recurrent_map,
        }
    }

    /// Get the input size
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Get the hidden size
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Perform a forward pass through the LSTM cell
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, input_size]`
    /// * `states` - Tuple of (hidden_state, cell_state), each of shape `[batch_size, hidden_size]`
    ///
    /// # Returns
    /// Tuple of (new_hidden_state, new_cell_state)
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        states: (Tensor<B, 2>, Tensor<B, 2>),
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let (hidden_state, cell_state) = states;

        let z = self.input_map.forward(input) + self.recurrent_map.forward(hidden_state);
        let gates = z.chunk(4, 1);

        let input_gate = activation::sigmoid(gates[0].clone());
        let forget_gate = activation::sigmoid(gates[1].clone());
        let candidate = gates[2].clone().tanh();
        let output_gate = activation::sigmoid(gates[3].clone());

        let new_cell = cell_state * forget_gate + candidate * input_gate;
        let new_hidden = new_cell.clone().tanh() * output_gate;

        (new_hidden, new_cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_lstm_cell_creation() {
        let device = get_test_device();
        let cell = LSTMCell::<TestBackend>::new(20, 50, &device);

        assert_eq!(cell.input_size(), 20);
        assert_eq!(cell.hidden_size(), 50);
    }

    #[test]
    fn test_lstm_forward() {
        let device = get_test_device();
        let cell = LSTMCell::<TestBackend>::new(20, 50, &device);

        let batch_size = 4;
        let input = Tensor::<TestBackend, 2>::zeros([batch_size, 20], &device);
        let h = Tensor::<TestBackend, 2>::zeros([batch_size, 50], &device);
        let c = Tensor::<TestBackend, 2>::zeros([batch_size, 50], &device);

        let (new_h, new_c) = cell.forward(input, (h, c));

        assert_eq!(new_h.dims(), [batch_size, 50]);
        assert_eq!(new_c.dims(), [batch_size, 50]);
    }

    #[test]
    fn test_lstm_state_persistence() {
        let device = get_test_device();
        let cell = LSTMCell::<TestBackend>::new(10, 20, &device);

        let mut h = Tensor::<TestBackend, 2>::zeros([1, 20], &device);
        let mut c = Tensor::<TestBackend, 2>::zeros([1, 20], &device);

        for _ in 0..3 {
            let input = Tensor::<TestBackend, 2>::random(
                [1, 10],
                burn::tensor::Distribution::Uniform(0.0, 1.0),
                &device,
            );
            (h, c) = cell.forward(input, (h, c));
        }

        let h_abs: f32 = h.abs().sum().into_scalar();
        let c_abs: f32 = c.abs().sum().into_scalar();
        assert!(
            h_abs > 0.0 && c_abs > 0.0,
            "States should have changed after processing sequence"
        );
    }

    #[test]
    fn test_lstm_hidden_bounded_by_output_gate() {
        let device = get_test_device();
        let cell = LSTMCell::<TestBackend>::new(10, 20, &device);

        let h = Tensor::<TestBackend, 2>::zeros([2, 20], &device);
        let c = Tensor::<TestBackend, 2>::ones([2, 20], &device) * 10.0;
        let input = Tensor::<TestBackend, 2>::ones([2, 10], &device);

        let (new_h, _) = cell.forward(input, (h, c));

        let max: f32 = new_h.abs().max().into_scalar();
        assert!(max < 1.0);
    }
}
