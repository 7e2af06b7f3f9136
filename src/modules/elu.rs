use burn::config::Config;
use burn::module::Module;
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

/// Exponential linear unit: `x` for positive inputs, `alpha * (e^x - 1)`
/// otherwise.
#[derive(Module, Debug, Clone)]
pub struct Elu {
    alpha: f32,
}

impl Elu {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        // exp only sees non-positive values, so large inputs cannot overflow
        let negative = (x.clone().clamp_max(0.0).exp() - 1.0) * self.alpha;
        activation::relu(x) + negative
    }
}

#[derive(Config, Debug)]
pub struct EluConfig {
    #[config(default = 1.0)]
    alpha: f32,
}

impl EluConfig {
    pub fn init(&self) -> Elu {
        Elu { alpha: self.alpha }
    }
}
