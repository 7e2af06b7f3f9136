use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

/// Linear projection to twice the output width, split into a value and a
/// gate half: `value * sigmoid(gate)`.
#[derive(Module, Debug)]
pub struct GatedLinearUnit<B: Backend> {
    dropout: Option<Dropout>,
    linear: Linear<B>,
}

impl<B: Backend> GatedLinearUnit<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        let x = self.linear.forward(x);

        let (value, gate) = {
            let mut chunks = x.chunk(2, D - 1);
            let value = chunks.remove(0);
            let gate = chunks.remove(0);
            (value, gate)
        };

        value * activation::sigmoid(gate)
    }
}

#[derive(Config, Debug)]
pub struct GatedLinearUnitConfig {
    d_input: usize,

    #[config(default = "None")]
    d_output: Option<usize>,

    /// No dropout layer at all when `None`.
    #[config(default = "None")]
    dropout: Option<f64>,
}

impl GatedLinearUnitConfig {
    pub fn init<B: Backend>(&self) -> GatedLinearUnit<B> {
        let d_output = self.d_output.unwrap_or(self.d_input);

        GatedLinearUnit {
            dropout: self.dropout.map(|p| DropoutConfig::new(p).init()),
            linear: LinearConfig::new(self.d_input, d_output * 2).init(),
        }
    }
}
