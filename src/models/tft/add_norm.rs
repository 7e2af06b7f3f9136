use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{LayerNorm, LayerNormConfig};
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

use super::glu::{GatedLinearUnit, GatedLinearUnitConfig};

/// `LayerNorm(x + skip)`, with an optional learned per-channel weight on
/// the skip branch.
#[derive(Module, Debug)]
pub struct AddNorm<B: Backend> {
    skip_mask: Option<Param<Tensor<B, 1>>>,
    norm: LayerNorm<B>,
}

impl<B: Backend> AddNorm<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>, skip: Tensor<B, D>) -> Tensor<B, D> {
        let skip = match &self.skip_mask {
            // 2 * sigmoid(0) = 1, so a fresh mask leaves the skip untouched
            Some(mask) => {
                let gate: Tensor<B, D> = (activation::sigmoid(mask.val()) * 2.0).unsqueeze();
                skip * gate
            }
            None => skip,
        };

        self.norm.forward(x + skip)
    }
}

#[derive(Config, Debug)]
pub struct AddNormConfig {
    d_model: usize,

    #[config(default = true)]
    trainable_add: bool,
}

impl AddNormConfig {
    pub fn init<B: Backend>(&self) -> AddNorm<B> {
        let skip_mask = if self.trainable_add {
            Some(Param::from(Tensor::zeros([self.d_model])))
        } else {
            None
        };

        AddNorm {
            skip_mask,
            norm: LayerNormConfig::new(self.d_model).init(),
        }
    }
}

/// Gated linear unit followed by [`AddNorm`] against a skip input.
#[derive(Module, Debug)]
pub struct GateAddNorm<B: Backend> {
    glu: GatedLinearUnit<B>,
    add_norm: AddNorm<B>,
}

impl<B: Backend> GateAddNorm<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>, skip: Tensor<B, D>) -> Tensor<B, D> {
        let x = self.glu.forward(x);
        self.add_norm.forward(x, skip)
    }
}

#[derive(Config, Debug)]
pub struct GateAddNormConfig {
    d_input: usize,

    #[config(default = "None")]
    d_output: Option<usize>,

    #[config(default = false)]
    trainable_add: bool,

    #[config(default = "None")]
    dropout: Option<f64>,
}

impl GateAddNormConfig {
    pub fn init<B: Backend>(&self) -> GateAddNorm<B> {
        let d_output = self.d_output.unwrap_or(self.d_input);

        GateAddNorm {
            glu: GatedLinearUnitConfig::new(self.d_input)
                .with_d_output(Some(d_output))
                .with_dropout(self.dropout)
                .init(),
            add_norm: AddNormConfig::new(d_output)
                .with_trainable_add(self.trainable_add)
                .init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{Data, Shape};

    type TestBackend = NdArray<f32>;

    #[test]
    fn fresh_trainable_add_equals_plain_add() {
        let trainable: AddNorm<TestBackend> = AddNormConfig::new(4).init();
        let plain: AddNorm<TestBackend> = AddNormConfig::new(4).with_trainable_add(false).init();

        let x: Tensor<TestBackend, 3> = Tensor::from_data(Data::new(
            (0..8).map(|v| v as f32).collect(),
            Shape::new([1, 2, 4]),
        ));
        let skip: Tensor<TestBackend, 3> = Tensor::ones([1, 2, 4]);

        let a = trainable.forward(x.clone(), skip.clone()).into_data();
        let b = plain.forward(x, skip).into_data();
        a.assert_approx_eq(&b, 5);
    }

    #[test]
    fn output_is_normalised() {
        let add_norm: AddNorm<TestBackend> = AddNormConfig::new(3).init();
        let x: Tensor<TestBackend, 2> = Tensor::from_floats([[1.0, 2.0, 3.0], [4.0, 0.0, -4.0]]);

        let out = add_norm.forward(x.clone(), x);
        let mean = out.mean_dim(1).into_data();
        mean.assert_approx_eq(&Data::from([[0.0], [0.0]]), 4);
    }

    #[test]
    fn gate_add_norm_projects_to_output_width() {
        let gate: GateAddNorm<TestBackend> = GateAddNormConfig::new(5)
            .with_d_output(Some(3))
            .with_dropout(Some(0.1))
            .init();
        let x: Tensor<TestBackend, 3> = Tensor::ones([2, 4, 5]);
        let skip: Tensor<TestBackend, 3> = Tensor::zeros([2, 4, 3]);

        assert_eq!(gate.forward(x, skip).dims(), [2, 4, 3]);
    }
}
