use std::collections::BTreeMap;

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::batchitem::BatchItem;
use crate::data::variables::{SampleDims, VariableGroups};
use crate::error::TftError;
use crate::utils::{expand_time, slice_features, slice_time, split_columns};

use super::grn::{GatedResidualNetwork, GatedResidualNetworkConfig};
use super::registry::{VariableRegistry, VariableRegistryBuilder};
use super::tfd::{TemporalFusionDecoder, TemporalFusionDecoderConfig};
use super::tfe::{TemporalFusionEncoder, TemporalFusionEncoderConfig};
use super::vsn::VariableSelectionNetwork;

/// Quantile levels predicted by default.
pub const DEFAULT_QUANTILES: [f32; 7] = [0.02, 0.1, 0.25, 0.5, 0.75, 0.9, 0.98];

/// Loss the model is trained with. Only its output arity matters here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LossKind {
    Quantile { quantiles: Vec<f32> },
    Mse,
}

impl LossKind {
    pub fn quantile() -> Self {
        LossKind::Quantile {
            quantiles: DEFAULT_QUANTILES.to_vec(),
        }
    }

    /// Output width per target.
    pub fn output_size(&self) -> usize {
        match self {
            LossKind::Quantile { quantiles } => quantiles.len(),
            LossKind::Mse => 1,
        }
    }

    /// Output column holding the point forecast: the quantile closest to the
    /// median.
    pub fn point_index(&self) -> usize {
        match self {
            LossKind::Quantile { quantiles } => quantiles
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (*a - 0.5).abs().total_cmp(&(*b - 0.5).abs()))
                .map(|(idx, _)| idx)
                .unwrap_or(0),
            LossKind::Mse => 0,
        }
    }
}

/// Forecast of one forward pass, `[N, H, output_size]` per target.
#[derive(Clone, Debug)]
pub enum ModelOutput<B: Backend> {
    Single(Tensor<B, 3>),
    Multi(Vec<Tensor<B, 3>>),
}

impl<B: Backend> ModelOutput<B> {
    pub fn into_vec(self) -> Vec<Tensor<B, 3>> {
        match self {
            ModelOutput::Single(output) => vec![output],
            ModelOutput::Multi(outputs) => outputs,
        }
    }
}

#[derive(Module, Debug)]
pub struct TemporalFusionTransformerModel<B: Backend> {
    input_chunk_length: usize,
    output_chunk_length: usize,
    d_hidden: usize,
    point_index: usize,
    registry: VariableRegistry<B>,
    static_selector: Option<VariableSelectionNetwork<B>>,
    ctx_selector: VariableSelectionNetwork<B>,
    tgt_selector: VariableSelectionNetwork<B>,
    selection: GatedResidualNetwork<B>,
    state_h: GatedResidualNetwork<B>,
    state_c: GatedResidualNetwork<B>,
    enrichment: GatedResidualNetwork<B>,
    temporal_encoder: TemporalFusionEncoder<B>,
    temporal_decoder: TemporalFusionDecoder<B>,
    output_proj: Vec<Linear<B>>,
}

impl<B: Backend> TemporalFusionTransformerModel<B> {
    /// Static context of every sample, `[N, d_hidden]`.
    ///
    /// Static covariates are not threaded through the forward inputs, so
    /// this is always the zero vector; `static_selector` is built for the
    /// declared static variables but not evaluated.
    fn static_embedding(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 2> {
        Tensor::zeros([batch_size, self.d_hidden]).to_device(device)
    }

    pub fn forward(&self, batch: BatchItem<B>) -> crate::error::Result<ModelOutput<B>> {
        let batch_size = batch.batch_size();
        let device = batch.past_target.device();
        let context_length = self.input_chunk_length;
        let total_length = self.input_chunk_length + self.output_chunk_length;

        batch.check_lengths(context_length, self.output_chunk_length)?;

        let past_input = batch.past_input();
        TftError::check_dim(
            "past features",
            self.ctx_selector.num_vars(),
            past_input.dims()[2],
        )?;

        let future_input = if self.tgt_selector.is_empty() {
            None
        } else {
            let future = batch
                .future_covariates
                .ok_or(TftError::MissingInput("future covariates"))?;
            TftError::check_dim("future features", self.tgt_selector.num_vars(), future.dims()[2])?;
            Some(future)
        };

        let static_var = self.static_embedding(batch_size, &device);

        let c_selection = expand_time(self.selection.forward(static_var.clone(), None), total_length);
        let ctx_selection = slice_time(c_selection.clone(), 0..context_length);
        let tgt_selection = slice_time(c_selection, context_length..total_length);

        let (ctx_input, _) = self.ctx_selector.forward(
            &self.registry,
            split_columns(past_input),
            Some(ctx_selection),
        );
        let tgt_input = match future_input {
            Some(future) => {
                let (tgt_input, _) = self.tgt_selector.forward(
                    &self.registry,
                    split_columns(future),
                    Some(tgt_selection),
                );
                tgt_input
            }
            None => Tensor::zeros([batch_size, self.output_chunk_length, self.d_hidden])
                .to_device(&device),
        };

        let c_h = self.state_h.forward(static_var.clone(), None);
        let c_c = self.state_c.forward(static_var.clone(), None);
        let states = (0..self.temporal_encoder.num_layers())
            .map(|_| (c_c.clone(), c_h.clone()))
            .collect();

        let encoding = self.temporal_encoder.forward(ctx_input, tgt_input, states);

        let c_enrichment = self.enrichment.forward(static_var, None);
        let encoder_lengths = vec![context_length; batch_size];
        let decoding = self
            .temporal_decoder
            .forward(encoding, c_enrichment, &encoder_lengths);

        let output = if self.output_proj.len() > 1 {
            ModelOutput::Multi(
                self.output_proj
                    .iter()
                    .map(|proj| proj.forward(decoding.clone()))
                    .collect(),
            )
        } else {
            ModelOutput::Single(self.output_proj[0].forward(decoding))
        };

        Ok(output)
    }

    /// Point forecast, `[N, H, n_targets]`: the median quantile (or the only
    /// output) of every target.
    pub fn predict(&self, batch: BatchItem<B>) -> crate::error::Result<Tensor<B, 3>> {
        let point = self.point_index;
        let outputs: Vec<Tensor<B, 3>> = self
            .forward(batch)?
            .into_vec()
            .into_iter()
            .map(|output| slice_features(output, point..point + 1))
            .collect();

        Ok(Tensor::cat(outputs, 2))
    }

    pub fn input_chunk_length(&self) -> usize {
        self.input_chunk_length
    }

    pub fn output_chunk_length(&self) -> usize {
        self.output_chunk_length
    }

    pub fn n_targets(&self) -> usize {
        self.output_proj.len()
    }
}

#[derive(Config, Debug)]
pub struct TemporalFusionTransformerConfig {
    input_chunk_length: usize,
    output_chunk_length: usize,

    /// Output width per target; one entry applies to every target. Derived
    /// from the loss when `None`.
    #[config(default = "None")]
    output_size: Option<Vec<usize>>,

    #[config(default = 16)]
    hidden_size: usize,

    #[config(default = 1)]
    lstm_layers: usize,

    #[config(default = 0.1)]
    dropout: f64,

    #[config(default = 4)]
    attention_head_size: usize,

    #[config(default = 8)]
    hidden_continuous_size: usize,

    #[config(default = "BTreeMap::new()")]
    hidden_continuous_sizes: BTreeMap<String, usize>,

    /// Categorical embeddings as `(cardinality, dim)`; any entry is rejected.
    #[config(default = "BTreeMap::new()")]
    embedding_sizes: BTreeMap<String, (usize, usize)>,

    #[config(default = false)]
    share_single_variable_networks: bool,

    #[config(default = "LossKind::quantile()")]
    loss: LossKind,
}

impl TemporalFusionTransformerConfig {
    /// Checks the hyper-parameters and resolves the output width of every
    /// target.
    pub fn output_sizes(&self, n_targets: usize) -> crate::error::Result<Vec<usize>> {
        if !self.embedding_sizes.is_empty() {
            return Err(TftError::Unsupported("categorical variables".to_string()));
        }
        if self.input_chunk_length == 0 || self.output_chunk_length == 0 {
            return Err(TftError::InvalidConfig(
                "chunk lengths must be positive".to_string(),
            ));
        }
        if self.lstm_layers == 0 {
            return Err(TftError::InvalidConfig(
                "at least one LSTM layer is required".to_string(),
            ));
        }
        if self.attention_head_size == 0 || self.attention_head_size > self.hidden_size {
            return Err(TftError::InvalidConfig(format!(
                "attention_head_size must be in 1..={}, got {}",
                self.hidden_size, self.attention_head_size
            )));
        }
        if n_targets == 0 {
            return Err(TftError::InvalidConfig("no target to forecast".to_string()));
        }

        let sizes = match &self.output_size {
            None => vec![self.loss.output_size(); n_targets],
            Some(sizes) if sizes.len() == 1 => vec![sizes[0]; n_targets],
            Some(sizes) if sizes.len() == n_targets => sizes.clone(),
            Some(sizes) => {
                return Err(TftError::InvalidConfig(format!(
                    "{} output sizes given for {} targets",
                    sizes.len(),
                    n_targets
                )))
            }
        };

        let expected = self.loss.output_size();
        if let Some(size) = sizes.iter().find(|size| **size != expected) {
            let reason = match &self.loss {
                LossKind::Quantile { .. } => format!(
                    "output_size must equal the number of quantiles ({expected}) with a quantile loss, got {size}"
                ),
                LossKind::Mse => format!("output_size must be 1 without a quantile loss, got {size}"),
            };
            return Err(TftError::InvalidConfig(reason));
        }

        Ok(sizes)
    }

    /// Builds a model for samples of the given widths.
    pub fn init_model<B: Backend>(&self, dims: &SampleDims) -> crate::error::Result<TemporalFusionTransformerModel<B>> {
        let variables = VariableGroups::from_sample(dims);
        self.init_with_groups(variables, dims.input_dim(), dims.n_targets())
    }

    pub fn init_with_groups<B: Backend>(
        &self,
        variables: VariableGroups,
        input_dim: usize,
        n_targets: usize,
    ) -> crate::error::Result<TemporalFusionTransformerModel<B>> {
        let output_sizes = self.output_sizes(n_targets)?;

        if variables.encoder_variables().len() != input_dim {
            return Err(TftError::InvalidConfig(format!(
                "{} encoder variables for {} input features",
                variables.encoder_variables().len(),
                input_dim
            )));
        }
        if variables.encoder_variables().is_empty() {
            return Err(TftError::InvalidConfig("no encoder variables".to_string()));
        }

        let d_hidden = self.hidden_size;

        debug!(
            encoder = ?variables.encoder_variables(),
            decoder = ?variables.decoder_variables(),
            statics = ?variables.static_variables(),
            shared = self.share_single_variable_networks,
            "building temporal fusion transformer"
        );

        let mut registry = VariableRegistryBuilder::new(
            variables.reals(),
            d_hidden,
            self.hidden_continuous_size,
            self.hidden_continuous_sizes.clone(),
            self.dropout,
            self.share_single_variable_networks,
        );

        // encoder first, so shared decoder variables reuse encoder networks
        let ctx_selector = registry.selection(variables.encoder_variables(), d_hidden);
        let tgt_selector = registry.selection(variables.decoder_variables(), d_hidden);
        let static_selector = if variables.static_variables().is_empty() {
            None
        } else {
            Some(registry.selection(variables.static_variables(), 0))
        };
        let registry = registry.build();

        debug!(
            prescalers = registry.num_prescalers(),
            networks = registry.num_networks(),
            "variable registry ready"
        );

        let context_grn = || {
            GatedResidualNetworkConfig::new(d_hidden)
                .with_dropout(self.dropout)
                .init()
        };

        let temporal_encoder = TemporalFusionEncoderConfig::new(d_hidden)
            .with_num_layers(self.lstm_layers)
            .with_dropout(self.dropout)
            .init();
        let temporal_decoder = TemporalFusionDecoderConfig::new(
            self.input_chunk_length,
            self.output_chunk_length,
            d_hidden,
            self.attention_head_size,
        )
        .with_dropout(self.dropout)
        .init();

        let output_proj = output_sizes
            .iter()
            .map(|size| LinearConfig::new(d_hidden, *size).init())
            .collect();

        Ok(TemporalFusionTransformerModel {
            input_chunk_length: self.input_chunk_length,
            output_chunk_length: self.output_chunk_length,
            d_hidden,
            point_index: self.loss.point_index(),
            registry,
            static_selector,
            ctx_selector,
            tgt_selector,
            selection: context_grn(),
            state_h: context_grn(),
            state_c: context_grn(),
            enrichment: context_grn(),
            temporal_encoder,
            temporal_decoder,
            output_proj,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn dims(n_targets: usize, past: Option<usize>, future: Option<usize>) -> SampleDims {
        SampleDims {
            past_target: n_targets,
            past_covariates: past,
            historic_future_covariates: future,
            future_covariates: future,
            future_target: n_targets,
            static_covariates: None,
        }
    }

    fn batch<B: Backend>(
        size: usize,
        dims: &SampleDims,
        input_chunk_length: usize,
        output_chunk_length: usize,
    ) -> BatchItem<B> {
        let random = |steps: usize, width: usize| -> Tensor<B, 3> {
            Tensor::random([size, steps, width], Distribution::Default)
        };

        let mut item = BatchItem::new(random(input_chunk_length, dims.past_target));
        if let Some(width) = dims.past_covariates {
            item = item.with_past_covariates(random(input_chunk_length, width));
        }
        if let Some(width) = dims.future_covariates {
            item = item.with_future_covariates(
                random(input_chunk_length, width),
                random(output_chunk_length, width),
            );
        }
        item
    }

    #[test]
    fn forward_shape_with_all_covariates() {
        let dims = dims(1, Some(2), Some(3));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(6, 3)
                .with_lstm_layers(2)
                .init_model(&dims)
                .unwrap();

        match model.forward(batch(4, &dims, 6, 3)).unwrap() {
            ModelOutput::Single(output) => assert_eq!(output.dims(), [4, 3, 7]),
            ModelOutput::Multi(_) => panic!("single target expected"),
        }
    }

    #[test]
    fn forward_returns_one_output_per_target() {
        let dims = dims(2, None, Some(1));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .with_loss(LossKind::Mse)
                .init_model(&dims)
                .unwrap();

        let outputs = model.forward(batch(3, &dims, 4, 2)).unwrap();
        assert!(matches!(outputs, ModelOutput::Multi(_)));

        let outputs = outputs.into_vec();
        assert_eq!(outputs.len(), 2);
        for output in outputs {
            assert_eq!(output.dims(), [3, 2, 1]);
        }
    }

    #[test]
    fn predict_takes_median_quantile() {
        let dims = dims(2, Some(1), Some(1));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(5, 2)
                .with_hidden_size(8)
                .init_model(&dims)
                .unwrap();
        let item = batch(2, &dims, 5, 2);

        let outputs = model.forward(item.clone()).unwrap().into_vec();
        let point = model.predict(item).unwrap();
        assert_eq!(point.dims(), [2, 2, 2]);

        // DEFAULT_QUANTILES[3] == 0.5
        for (target, output) in outputs.into_iter().enumerate() {
            slice_features(point.clone(), target..target + 1)
                .into_data()
                .assert_approx_eq(&slice_features(output, 3..4).into_data(), 6);
        }
    }

    #[test]
    fn forward_is_deterministic_without_autodiff() {
        let dims = dims(1, Some(1), Some(1));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .init_model(&dims)
                .unwrap();
        let item = batch(2, &dims, 4, 2);

        let a = model.predict(item.clone()).unwrap().into_data();
        let b = model.predict(item).unwrap().into_data();
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn runs_on_autodiff_backend() {
        let dims = dims(1, None, Some(2));
        let model: TemporalFusionTransformerModel<Autodiff<TestBackend>> =
            TemporalFusionTransformerConfig::new(4, 2)
                .with_hidden_size(8)
                .init_model(&dims)
                .unwrap();

        let output = model.predict(batch(2, &dims, 4, 2)).unwrap();
        assert_eq!(output.dims(), [2, 2, 1]);

        let grads = output.sum().backward();
        let weight = model.output_proj[0].weight.val();
        assert!(weight.grad(&grads).is_some());
    }

    #[test]
    fn shared_networks_are_one_instance() {
        let dims = dims(1, None, Some(1));
        let config = TemporalFusionTransformerConfig::new(4, 2)
            .with_hidden_size(8)
            .with_share_single_variable_networks(true);
        let mut model: TemporalFusionTransformerModel<TestBackend> = config.init_model(&dims).unwrap();

        // encoder: target_0, future_covariate_0; decoder: future_covariate_0
        let shared = model.ctx_selector.network_slots()[1];
        assert_eq!(model.tgt_selector.network_slots(), &[shared]);
        assert_eq!(model.registry.num_networks(), 2);

        let past: Vec<Tensor<TestBackend, 3>> = vec![Tensor::ones([1, 4, 1]), Tensor::ones([1, 4, 1])];
        let future: Vec<Tensor<TestBackend, 3>> = vec![Tensor::ones([1, 2, 1])];

        let run = |model: &TemporalFusionTransformerModel<TestBackend>| {
            let (encoder, _) = model.ctx_selector.forward(&model.registry, past.clone(), None);
            let (decoder, _) = model.tgt_selector.forward(&model.registry, future.clone(), None);
            (encoder, decoder)
        };

        let (encoder_before, decoder_before) = run(&model);
        model.registry.replace_network(
            shared,
            GatedResidualNetworkConfig::new(8)
                .with_d_input(Some(8))
                .init(),
        );
        let (encoder_after, decoder_after) = run(&model);

        let changed = |a: Tensor<TestBackend, 3>, b: Tensor<TestBackend, 3>| {
            (a - b).abs().sum().into_scalar() > 0.0
        };
        assert!(changed(encoder_before, encoder_after));
        assert!(changed(decoder_before, decoder_after));
    }

    #[test]
    fn unshared_decoder_network_is_independent() {
        let dims = dims(1, None, Some(1));
        let mut model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .with_hidden_size(8)
                .init_model(&dims)
                .unwrap();

        let decoder_slot = model.tgt_selector.network_slots()[0];
        assert!(!model.ctx_selector.network_slots().contains(&decoder_slot));

        let past: Vec<Tensor<TestBackend, 3>> = vec![Tensor::ones([1, 4, 1]), Tensor::ones([1, 4, 1])];
        let (before, _) = model.ctx_selector.forward(&model.registry, past.clone(), None);
        model.registry.replace_network(
            decoder_slot,
            GatedResidualNetworkConfig::new(8).with_d_input(Some(8)).init(),
        );
        let (after, _) = model.ctx_selector.forward(&model.registry, past, None);

        before.into_data().assert_approx_eq(&after.into_data(), 6);
    }

    #[test]
    fn sharing_reduces_parameter_count() {
        let dims = dims(1, Some(1), Some(2));
        let config = TemporalFusionTransformerConfig::new(4, 2).with_hidden_size(8);

        let unshared: TemporalFusionTransformerModel<TestBackend> = config.init_model(&dims).unwrap();
        let shared: TemporalFusionTransformerModel<TestBackend> = config
            .clone()
            .with_share_single_variable_networks(true)
            .init_model(&dims)
            .unwrap();

        assert!(shared.num_params() < unshared.num_params());
    }

    #[test]
    fn missing_future_covariates() {
        let dims = dims(1, None, Some(1));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .init_model(&dims)
                .unwrap();

        let mut item = batch(1, &dims, 4, 2);
        item.future_covariates = None;

        assert_eq!(
            model.forward(item).unwrap_err(),
            TftError::MissingInput("future covariates")
        );
    }

    #[test]
    fn wrong_past_width_is_rejected() {
        let dims = dims(1, Some(2), None);
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .init_model(&dims)
                .unwrap();

        let item = BatchItem::new(Tensor::zeros([1, 4, 1])).with_past_covariates(Tensor::zeros([1, 4, 3]));

        assert_eq!(
            model.forward(item).unwrap_err(),
            TftError::DimensionMismatch {
                what: "past features",
                expected: 3,
                actual: 4
            }
        );
    }

    #[test]
    fn mismatched_covariate_windows_are_errors() {
        let dims = dims(1, Some(2), Some(1));
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .init_model(&dims)
                .unwrap();

        let short_past = BatchItem::new(Tensor::zeros([1, 4, 1]))
            .with_past_covariates(Tensor::zeros([1, 3, 2]))
            .with_future_covariates(Tensor::zeros([1, 4, 1]), Tensor::zeros([1, 2, 1]));
        assert_eq!(
            model.forward(short_past).unwrap_err(),
            TftError::DimensionMismatch {
                what: "past covariates length",
                expected: 4,
                actual: 3
            }
        );

        let long_future = BatchItem::new(Tensor::zeros([1, 4, 1]))
            .with_past_covariates(Tensor::zeros([1, 4, 2]))
            .with_future_covariates(Tensor::zeros([1, 4, 1]), Tensor::zeros([1, 3, 1]));
        assert_eq!(
            model.forward(long_future).unwrap_err(),
            TftError::DimensionMismatch {
                what: "output chunk length",
                expected: 2,
                actual: 3
            }
        );

        let other_batch = BatchItem::new(Tensor::zeros([2, 4, 1]))
            .with_past_covariates(Tensor::zeros([2, 4, 2]))
            .with_future_covariates(Tensor::zeros([2, 4, 1]), Tensor::zeros([1, 2, 1]));
        assert_eq!(
            model.forward(other_batch).unwrap_err(),
            TftError::DimensionMismatch {
                what: "future covariates batch size",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn quantile_loss_requires_matching_width() {
        let config = TemporalFusionTransformerConfig::new(4, 2).with_output_size(Some(vec![3]));
        assert!(matches!(config.output_sizes(1), Err(TftError::InvalidConfig(_))));

        let config = TemporalFusionTransformerConfig::new(4, 2)
            .with_loss(LossKind::Quantile {
                quantiles: vec![0.1, 0.5, 0.9],
            })
            .with_output_size(Some(vec![3]));
        assert_eq!(config.output_sizes(2).unwrap(), vec![3, 3]);
    }

    #[test]
    fn point_loss_requires_unit_width() {
        let config = TemporalFusionTransformerConfig::new(4, 2)
            .with_loss(LossKind::Mse)
            .with_output_size(Some(vec![2]));
        assert!(matches!(config.output_sizes(1), Err(TftError::InvalidConfig(_))));

        let config = TemporalFusionTransformerConfig::new(4, 2).with_loss(LossKind::Mse);
        assert_eq!(config.output_sizes(3).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn rejects_categoricals_and_bad_heads() {
        let config = TemporalFusionTransformerConfig::new(4, 2)
            .with_embedding_sizes(BTreeMap::from([("day".to_string(), (7, 3))]));
        assert!(matches!(config.output_sizes(1), Err(TftError::Unsupported(_))));

        let config = TemporalFusionTransformerConfig::new(4, 2)
            .with_hidden_size(4)
            .with_attention_head_size(8);
        assert!(matches!(config.output_sizes(1), Err(TftError::InvalidConfig(_))));

        let config = TemporalFusionTransformerConfig::new(4, 2).with_output_size(Some(vec![7, 7, 7]));
        assert!(matches!(config.output_sizes(2), Err(TftError::InvalidConfig(_))));
    }

    #[test]
    fn point_index_picks_nearest_median() {
        assert_eq!(LossKind::quantile().point_index(), 3);
        assert_eq!(
            LossKind::Quantile {
                quantiles: vec![0.1, 0.45, 0.9]
            }
            .point_index(),
            1
        );
        assert_eq!(LossKind::Mse.point_index(), 0);
    }

    #[test]
    fn static_variables_build_a_selector() {
        let sample = SampleDims {
            static_covariates: Some(2),
            ..dims(1, None, Some(1))
        };
        let model: TemporalFusionTransformerModel<TestBackend> =
            TemporalFusionTransformerConfig::new(4, 2)
                .init_model(&sample)
                .unwrap();
        assert_eq!(model.static_selector.as_ref().map(|s| s.num_vars()), Some(2));

        // forward still runs on the zero static context
        let output = model.predict(batch(1, &sample, 4, 2)).unwrap();
        assert_eq!(output.dims(), [1, 2, 1]);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TemporalFusionTransformerConfig::new(12, 3)
            .with_hidden_size(32)
            .with_loss(LossKind::Mse)
            .with_hidden_continuous_sizes(BTreeMap::from([("target_0".to_string(), 4)]));

        let json = config.to_string();
        let loaded = TemporalFusionTransformerConfig::load_binary(json.as_bytes()).unwrap();

        assert_eq!(loaded.hidden_size, 32);
        assert_eq!(loaded.loss, LossKind::Mse);
        assert_eq!(loaded.hidden_continuous_sizes.get("target_0"), Some(&4));
        assert_eq!(loaded.output_sizes(1).unwrap(), vec![1]);
    }
}
