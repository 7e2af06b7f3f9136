use burn::config::Config;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

use super::add_norm::{AddNorm, AddNormConfig};
use super::glu::{GatedLinearUnit, GatedLinearUnitConfig};
use super::lstm::{LstmState, StackedLstm, StackedLstmConfig};

/// Encoder/decoder LSTM pair followed by a gated skip connection back to
/// the selected inputs.
#[derive(Module, Debug)]
pub struct TemporalFusionEncoder<B: Backend> {
    encoder_lstm: StackedLstm<B>,
    decoder_lstm: StackedLstm<B>,
    gate: GatedLinearUnit<B>,
    add_norm: AddNorm<B>,
}

impl<B: Backend> TemporalFusionEncoder<B> {
    /// `ctx_input` is `[N, T, d_hidden]`, `tgt_input` is `[N, H, d_hidden]`;
    /// the result covers both, `[N, T + H, d_hidden]`.
    ///
    /// Every layer of the encoder starts from `states`; the decoder continues
    /// from the encoder's final states.
    pub fn forward(
        &self,
        ctx_input: Tensor<B, 3>,
        tgt_input: Tensor<B, 3>,
        states: Vec<LstmState<B>>,
    ) -> Tensor<B, 3> {
        let (ctx_encodings, last_states) = self.encoder_lstm.forward(ctx_input.clone(), states);
        let (tgt_encodings, _) = self.decoder_lstm.forward(tgt_input.clone(), last_states);

        // the gate is position-wise, so one pass over the concatenation
        // applies the same weights to encoder and decoder steps
        let encodings = Tensor::cat(vec![ctx_encodings, tgt_encodings], 1);
        let skip = Tensor::cat(vec![ctx_input, tgt_input], 1);

        let encodings = self.gate.forward(encodings);
        self.add_norm.forward(encodings, skip)
    }

    pub fn num_layers(&self) -> usize {
        self.encoder_lstm.num_layers()
    }
}

#[derive(Config, Debug)]
pub struct TemporalFusionEncoderConfig {
    d_hidden: usize,

    #[config(default = 1)]
    num_layers: usize,

    #[config(default = 0.0)]
    dropout: f64,
}

impl TemporalFusionEncoderConfig {
    pub fn init<B: Backend>(&self) -> TemporalFusionEncoder<B> {
        let lstm = StackedLstmConfig::new(self.d_hidden, self.d_hidden)
            .with_num_layers(self.num_layers)
            .with_dropout(self.dropout);

        TemporalFusionEncoder {
            encoder_lstm: lstm.init(),
            decoder_lstm: lstm.init(),
            gate: GatedLinearUnitConfig::new(self.d_hidden)
                .with_dropout(Some(self.dropout))
                .init(),
            add_norm: AddNormConfig::new(self.d_hidden).init(),
        }
    }
}
