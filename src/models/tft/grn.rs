use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::elu::{Elu, EluConfig};

use super::add_norm::{GateAddNorm, GateAddNormConfig};

#[derive(Module, Debug)]
pub struct GatedResidualNetwork<B: Backend> {
    skip_proj: Option<Linear<B>>,
    fc1: Linear<B>,
    context_proj: Option<Linear<B>>,
    elu: Elu,
    fc2: Linear<B>,
    gate_norm: GateAddNorm<B>,
}

impl<B: Backend> GatedResidualNetwork<B> {
    /// `context` must have the same leading dimensions as `x`; it is ignored
    /// when the network was built without a context width.
    pub fn forward<const D: usize>(
        &self,
        x: Tensor<B, D>,
        context: Option<Tensor<B, D>>,
    ) -> Tensor<B, D> {
        let residual = match &self.skip_proj {
            Some(proj) => proj.forward(x.clone()),
            None => x.clone(),
        };

        let x = self.fc1.forward(x);
        let x = match (&self.context_proj, context) {
            (Some(proj), Some(c)) => x + proj.forward(c),
            _ => x,
        };
        let x = self.elu.forward(x);
        let x = self.fc2.forward(x);

        self.gate_norm.forward(x, residual)
    }
}

#[derive(Config, Debug)]
pub struct GatedResidualNetworkConfig {
    d_hidden: usize,

    #[config(default = "None")]
    d_input: Option<usize>,

    #[config(default = "None")]
    d_output: Option<usize>,

    #[config(default = 0)]
    d_context: usize,

    #[config(default = 0.0)]
    dropout: f64,
}

impl GatedResidualNetworkConfig {
    pub fn init<B: Backend>(&self) -> GatedResidualNetwork<B> {
        let d_hidden = self.d_hidden;
        let d_input = self.d_input.unwrap_or(d_hidden);
        let d_output = self.d_output.unwrap_or(d_input);

        let skip_proj = if d_input != d_output {
            Some(LinearConfig::new(d_input, d_output).init())
        } else {
            None
        };

        let context_proj = if self.d_context > 0 {
            Some(
                LinearConfig::new(self.d_context, d_hidden)
                    .with_bias(false)
                    .init(),
            )
        } else {
            None
        };

        GatedResidualNetwork {
            skip_proj,
            fc1: LinearConfig::new(d_input, d_hidden).init(),
            context_proj,
            elu: EluConfig::new().init(),
            fc2: LinearConfig::new(d_hidden, d_hidden).init(),
            gate_norm: GateAddNormConfig::new(d_hidden)
                .with_d_output(Some(d_output))
                .with_dropout(Some(self.dropout))
                .init(),
        }
    }
}
