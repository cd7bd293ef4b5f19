use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Elman recurrent cell with tanh nonlinearity
///
/// h' = tanh(W_ih @ x + b_ih + W_hh @ h + b_hh)
#[derive(Module, Debug)]
pub struct RNNCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    input_map: Linear<B>,
    recurrent_map: Linear<B>,
}

impl<B: Backend> RNNCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, hidden_size)
            .with_bias(true)
            .init(device);
        let recurrent_map = LinearConfig::new(hidden_size, hidden_size)
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

    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        (self.input_map.forward(input) + self.recurrent_map.forward(hidden)).tanh()
    }
}
