use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::{backend::Backend, Bool, Data, Shape, Tensor};

const MASK_FILL: f32 = -1e9;

/// Causal and padding mask for decoder queries over encoder + decoder keys.
///
/// Shape `[batch, decoder_length, max_encoder_length + decoder_length]`.
/// An entry is `true` (attention disallowed) when the key is an encoder step
/// at or past that sample's encoder length, or a decoder step after the
/// query step.
pub fn attention_mask<B: Backend>(
    encoder_lengths: &[usize],
    decoder_length: usize,
) -> Tensor<B, 3, Bool> {
    let batch = encoder_lengths.len();
    let max_encoder_length = encoder_lengths.iter().copied().max().unwrap_or(0);
    let num_keys = max_encoder_length + decoder_length;

    let mut values = Vec::with_capacity(batch * decoder_length * num_keys);
    for &encoder_length in encoder_lengths {
        for query in 0..decoder_length {
            values.extend((0..max_encoder_length).map(|key| key >= encoder_length));
            values.extend((0..decoder_length).map(|key| key > query));
        }
    }

    Tensor::from_data(Data::new(
        values,
        Shape::new([batch, decoder_length, num_keys]),
    ))
}

/// Multi-head attention whose heads share the value projection, so the
/// head-averaged weights read as one attention pattern.
#[derive(Module, Debug)]
pub struct InterpretableMultiHeadAttention<B: Backend> {
    query_layers: Vec<Linear<B>>,
    key_layers: Vec<Linear<B>>,
    value_layer: Linear<B>,
    output_layer: Linear<B>,
    dropout: Dropout,
    d_head: usize,
}

impl<B: Backend> InterpretableMultiHeadAttention<B> {
    /// Returns the attended values `[batch, q_len, d_model]` and the
    /// per-head weights `[batch, q_len, n_heads, k_len]`.
    pub fn forward(
        &self,
        query: Tensor<B, 3>,
        key: Tensor<B, 3>,
        value: Tensor<B, 3>,
        mask: Option<Tensor<B, 3, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let values = self.value_layer.forward(value);
        let scale = (self.d_head as f64).sqrt();

        let (heads, weights): (Vec<Tensor<B, 3>>, Vec<Tensor<B, 3>>) = self
            .query_layers
            .iter()
            .zip(self.key_layers.iter())
            .map(|(q_layer, k_layer)| {
                let q = q_layer.forward(query.clone());
                let k = k_layer.forward(key.clone());

                let scores = q.matmul(k.swap_dims(1, 2)) / scale;
                let scores = match &mask {
                    Some(mask) => scores.mask_fill(mask.clone(), MASK_FILL),
                    None => scores,
                };
                let attn = activation::softmax(scores, 2);

                let head = attn.clone().matmul(values.clone());
                (self.dropout.forward(head), attn)
            })
            .unzip();

        let output = if heads.len() > 1 {
            let heads: Tensor<B, 4> = Tensor::stack(heads, 2);
            heads.mean_dim(2).squeeze(2)
        } else {
            heads.into_iter().next().unwrap_or_else(|| query.zeros_like())
        };

        let output = self.dropout.forward(self.output_layer.forward(output));

        (output, Tensor::stack(weights, 2))
    }
}

#[derive(Config, Debug)]
pub struct InterpretableMultiHeadAttentionConfig {
    d_model: usize,
    n_heads: usize,

    #[config(default = 0.0)]
    dropout: f64,
}

impl InterpretableMultiHeadAttentionConfig {
    /// `n_heads` must be in `1..=d_model`; each head works on
    /// `d_model / n_heads` channels.
    pub fn init<B: Backend>(&self) -> InterpretableMultiHeadAttention<B> {
        let d_head = self.d_model / self.n_heads;

        InterpretableMultiHeadAttention {
            query_layers: (0..self.n_heads)
                .map(|_| LinearConfig::new(self.d_model, d_head).init())
                .collect(),
            key_layers: (0..self.n_heads)
                .map(|_| LinearConfig::new(self.d_model, d_head).init())
                .collect(),
            value_layer: LinearConfig::new(self.d_model, d_head).init(),
            output_layer: LinearConfig::new(d_head, self.d_model).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            d_head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn mask_at(mask: &[bool], dims: [usize; 3], b: usize, q: usize, k: usize) -> bool {
        mask[(b * dims[1] + q) * dims[2] + k]
    }

    #[test]
    fn mask_blocks_padding_and_future_steps() {
        let mask = attention_mask::<TestBackend>(&[5, 3], 4);
        let dims = mask.dims();
        assert_eq!(dims, [2, 4, 9]);

        let values = mask.into_data().value;
        for b in 0..2 {
            let encoder_length = [5, 3][b];
            for q in 0..4 {
                for k in 0..9 {
                    let expected = if k < 5 { k >= encoder_length } else { k - 5 > q };
                    assert_eq!(mask_at(&values, dims, b, q, k), expected, "b={b} q={q} k={k}");
                }
            }
        }

        // padded encoder step of the shorter sample
        assert!(mask_at(&values, dims, 1, 0, 3));
        assert!(!mask_at(&values, dims, 0, 0, 3));
        // a query sees itself and earlier decoder steps only
        assert!(!mask_at(&values, dims, 0, 2, 5 + 2));
        assert!(mask_at(&values, dims, 0, 2, 5 + 3));
    }

    #[test]
    fn masked_keys_get_no_weight() {
        let attention: InterpretableMultiHeadAttention<TestBackend> =
            InterpretableMultiHeadAttentionConfig::new(8, 2).init();

        let x: Tensor<TestBackend, 3> = Tensor::random([2, 6, 8], Distribution::Default);
        let query = x.clone().slice([0..2, 4..6, 0..8]);
        let mask = attention_mask::<TestBackend>(&[4, 3], 2);

        let (output, weights) = attention.forward(query, x.clone(), x, Some(mask));
        assert_eq!(output.dims(), [2, 2, 8]);
        assert_eq!(weights.dims(), [2, 2, 2, 6]);

        // [b, q, head, k]; sample 1 pads encoder step 3, key 5 is decoder step 1
        let weights = weights.into_data().value;
        let at = |b: usize, q: usize, h: usize, k: usize| weights[((b * 2 + q) * 2 + h) * 6 + k];
        for h in 0..2 {
            assert!(at(1, 0, h, 3) < 1e-6);
            assert!(at(1, 0, h, 5) < 1e-6);
            assert!(at(0, 0, h, 3) > 0.0);
            assert!(at(1, 1, h, 5) > 0.0);

            let total: f32 = (0..6).map(|k| at(1, 1, h, k)).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn weights_stay_normalised_with_dropout_active() {
        type AutodiffBackend = burn::backend::Autodiff<TestBackend>;

        let attention: InterpretableMultiHeadAttention<AutodiffBackend> =
            InterpretableMultiHeadAttentionConfig::new(8, 2)
                .with_dropout(0.5)
                .init();
        let x: Tensor<AutodiffBackend, 3> = Tensor::random([2, 5, 8], Distribution::Default);

        let (_, weights) = attention.forward(x.clone(), x.clone(), x, None);
        let sums = weights.sum_dim(3).into_data().value;

        assert_eq!(sums.len(), 2 * 5 * 2);
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn single_head_output_shape() {
        let attention: InterpretableMultiHeadAttention<TestBackend> =
            InterpretableMultiHeadAttentionConfig::new(4, 1).init();
        let x: Tensor<TestBackend, 3> = Tensor::ones([3, 5, 4]);

        let (output, weights) = attention.forward(x.clone(), x.clone(), x, None);
        assert_eq!(output.dims(), [3, 5, 4]);
        assert_eq!(weights.dims(), [3, 5, 1, 5]);
    }
}
