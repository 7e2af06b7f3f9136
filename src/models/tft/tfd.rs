use burn::config::Config;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

use crate::utils::{expand_time, slice_time};

use super::add_norm::{GateAddNorm, GateAddNormConfig};
use super::attention::{
    attention_mask, InterpretableMultiHeadAttention, InterpretableMultiHeadAttentionConfig,
};
use super::grn::{GatedResidualNetwork, GatedResidualNetworkConfig};

/// Static enrichment, masked self-attention and the position-wise output
/// block, producing one vector per forecast step.
#[derive(Module, Debug)]
pub struct TemporalFusionDecoder<B: Backend> {
    context_length: usize,
    prediction_length: usize,
    enrich: GatedResidualNetwork<B>,
    attention: InterpretableMultiHeadAttention<B>,
    att_gate_norm: GateAddNorm<B>,
    ff_grn: GatedResidualNetwork<B>,
    ff_gate_norm: GateAddNorm<B>,
}

impl<B: Backend> TemporalFusionDecoder<B> {
    /// `x` is the LSTM output over encoder and decoder steps, `[N, T + H, d]`;
    /// `statics` the enrichment context, `[N, d]`. Returns `[N, H, d]`.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        statics: Tensor<B, 2>,
        encoder_lengths: &[usize],
    ) -> Tensor<B, 3> {
        let total_length = self.context_length + self.prediction_length;
        let decoder_steps = self.context_length..total_length;

        let expanded_static = expand_time(statics, total_length);
        let skip = slice_time(x.clone(), decoder_steps.clone());
        let x = self.enrich.forward(x, Some(expanded_static));

        let mask =
            attention_mask::<B>(encoder_lengths, self.prediction_length).to_device(&x.device());

        let query = slice_time(x.clone(), decoder_steps);
        let (attn_output, _) = self
            .attention
            .forward(query.clone(), x.clone(), x, Some(mask));

        let x = self.att_gate_norm.forward(attn_output, query);
        let x = self.ff_grn.forward(x, None);

        // bypasses enrichment and attention
        self.ff_gate_norm.forward(x, skip)
    }
}

#[derive(Config, Debug)]
pub struct TemporalFusionDecoderConfig {
    context_length: usize,
    prediction_length: usize,
    d_hidden: usize,
    num_heads: usize,

    #[config(default = 0.0)]
    dropout: f64,
}

impl TemporalFusionDecoderConfig {
    pub fn init<B: Backend>(&self) -> TemporalFusionDecoder<B> {
        let enrich = GatedResidualNetworkConfig::new(self.d_hidden)
            .with_d_context(self.d_hidden)
            .with_dropout(self.dropout)
            .init();

        let attention = InterpretableMultiHeadAttentionConfig::new(self.d_hidden, self.num_heads)
            .with_dropout(self.dropout)
            .init();

        let att_gate_norm = GateAddNormConfig::new(self.d_hidden)
            .with_dropout(Some(self.dropout))
            .init();

        let ff_grn = GatedResidualNetworkConfig::new(self.d_hidden)
            .with_dropout(self.dropout)
            .init();
        let ff_gate_norm = GateAddNormConfig::new(self.d_hidden).init();

        TemporalFusionDecoder {
            context_length: self.context_length,
            prediction_length: self.prediction_length,
            enrich,
            attention,
            att_gate_norm,
            ff_grn,
            ff_gate_norm,
        }
    }
}
