use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Gated recurrent unit cell
///
/// Implements the GRU equations:
/// - r = sigmoid(W_ir @ x + b_ir + W_hr @ h + b_hr)
/// - z = sigmoid(W_iz @ x + b_iz + W_hz @ h + b_hz)
/// - n = tanh(W_in @ x + b_in + r * (W_hn @ h + b_hn))
/// - h' = (1 - z) * n + z * h
#[derive(Module, Debug)]
pub struct GRUCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input_map: Linear<B>,     // Maps input to 3 * hidden_size
    recurrent_map: Linear<B>, // Maps hidden state to 3 * hidden_size
}

impl<B: Backend> GRUCell<B> {
    /// Create a new GRU cell
    ///
    /// # Arguments
    /// * `input_size` - Size of the input features
    /// * `hidden_size` - Size of the hidden state
    /// * `device` - Device to create the module on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, 3 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 3 * hidden_size)
            .with_bias(true)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_map,
            recurrent_map,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Advance one timestep
    ///
    /// # Arguments
    /// * `input` - `[batch_size, input_size]`
    /// * `hidden` - `[batch_size, hidden_size]`
    ///
    /// # Returns
    /// The new hidden state, `[batch_size, hidden_size]`
    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let gi = self.input_map.forward(input).chunk(3, 1);
        let gh = self.recurrent_map.forward(hidden.clone()).chunk(3, 1);

        let reset = activation::sigmoid(gi[0].clone() + gh[0].clone());
        let update = activation::sigmoid(gi[1].clone() + gh[1].clone());
        // The reset gate scales the recurrent contribution only, bias included.
        let candidate = (gi[2].clone() + reset * gh[2].clone()).tanh();

        candidate.clone() + update * (hidden - candidate)
    }
}
