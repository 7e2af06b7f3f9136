use burn::config::Config;
use burn::module::Module;
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Tensor};

use super::grn::{GatedResidualNetwork, GatedResidualNetworkConfig};
use super::registry::VariableRegistry;

/// Weighted fusion of several single-column variables into one
/// `d_hidden`-wide embedding.
///
/// The per-variable prescalers and networks are held by a
/// [`VariableRegistry`]; the gate only stores their slots, in input order.
#[derive(Module, Debug)]
pub struct VariableSelectionNetwork<B: Backend> {
    prescaler_slots: Vec<usize>,
    network_slots: Vec<usize>,
    weight_network: Option<GatedResidualNetwork<B>>,
}

impl<B: Backend> VariableSelectionNetwork<B> {
    /// Returns the fused embedding and the selection weights, whose last
    /// axis has one entry per variable.
    ///
    /// `variables` must follow the order the gate was built with. With a
    /// single variable the context is unused and the weights are all ones.
    pub fn forward<const D: usize>(
        &self,
        registry: &VariableRegistry<B>,
        variables: Vec<Tensor<B, D>>,
        context: Option<Tensor<B, D>>,
    ) -> (Tensor<B, D>, Tensor<B, D>) {
        debug_assert_eq!(variables.len(), self.num_vars());

        let embeddings: Vec<Tensor<B, D>> = self
            .prescaler_slots
            .iter()
            .zip(variables)
            .map(|(slot, var)| registry.prescale(*slot, var))
            .collect();

        let var_encodings: Vec<Tensor<B, D>> = self
            .network_slots
            .iter()
            .zip(embeddings.iter())
            .map(|(slot, emb)| registry.encode(*slot, emb.clone()))
            .collect();

        let weight_network = match &self.weight_network {
            Some(net) => net,
            None => {
                let encoding = var_encodings
                    .into_iter()
                    .next()
                    .expect("selection gate without variables");
                let mut dims = encoding.dims();
                dims[D - 1] = 1;
                return (encoding, Tensor::ones(dims));
            }
        };

        let flattened = Tensor::cat(embeddings, D - 1);
        let weight = weight_network.forward(flattened, context);
        let weight = activation::softmax(weight, D - 1);
        let d_hidden = var_encodings[0].dims()[D - 1];

        match D {
            2 => {
                let expanded: Tensor<B, 3> = weight.clone().unsqueeze_dim(1);
                let expanded = expanded.repeat(1, d_hidden);

                let var_encodings: Tensor<B, 3> = Tensor::stack(var_encodings, 2);
                let fused: Tensor<B, D> = (var_encodings * expanded).sum_dim(2).squeeze(2);

                (fused, weight)
            }
            3 => {
                let expanded: Tensor<B, 4> = weight.clone().unsqueeze_dim(2);
                let expanded = expanded.repeat(2, d_hidden);

                let var_encodings: Tensor<B, 4> = Tensor::stack(var_encodings, 3);
                let fused: Tensor<B, D> = (var_encodings * expanded).sum_dim(3).squeeze(3);

                (fused, weight)
            }
            _ => unreachable!("variable selection runs on 2-D or 3-D inputs"),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.network_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.network_slots.is_empty()
    }

    pub fn prescaler_slots(&self) -> &[usize] {
        &self.prescaler_slots
    }

    pub fn network_slots(&self) -> &[usize] {
        &self.network_slots
    }
}

#[derive(Config, Debug)]
pub struct VariableSelectionNetworkConfig {
    d_hidden: usize,

    /// Sum of the prescaled widths of all variables.
    d_total: usize,

    #[config(default = 0)]
    d_context: usize,

    #[config(default = 0.0)]
    dropout: f64,
}

impl VariableSelectionNetworkConfig {
    /// Builds a gate over the variables whose registry slots are given.
    pub fn init<B: Backend>(
        &self,
        prescaler_slots: Vec<usize>,
        network_slots: Vec<usize>,
    ) -> VariableSelectionNetwork<B> {
        let num_vars = network_slots.len();

        let weight_network = if num_vars > 1 {
            Some(
                GatedResidualNetworkConfig::new(self.d_hidden.min(num_vars))
                    .with_d_input(Some(self.d_total))
                    .with_d_output(Some(num_vars))
                    .with_d_context(self.d_context)
                    .with_dropout(self.dropout)
                    .init(),
            )
        } else {
            None
        };

        VariableSelectionNetwork {
            prescaler_slots,
            network_slots,
            weight_network,
        }
    }
}
