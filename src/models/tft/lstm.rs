use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Lstm, LstmConfig};
use burn::tensor::{backend::Backend, Tensor};

/// `(cell, hidden)`, each `[batch, d_hidden]`.
pub type LstmState<B> = (Tensor<B, 2>, Tensor<B, 2>);

/// Several LSTM layers run one after the other, with dropout between
/// layers.
#[derive(Module, Debug)]
pub struct StackedLstm<B: Backend> {
    layers: Vec<Lstm<B>>,
    dropout: Dropout,
}

impl<B: Backend> StackedLstm<B> {
    /// Runs every layer from its own initial state.
    ///
    /// Returns the hidden states of the last layer, `[batch, seq, d_hidden]`,
    /// and the final state of every layer.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        states: Vec<LstmState<B>>,
    ) -> (Tensor<B, 3>, Vec<LstmState<B>>) {
        debug_assert_eq!(states.len(), self.layers.len());

        let num_layers = self.layers.len();
        let mut x = x;
        let mut final_states = Vec::with_capacity(num_layers);

        for (idx, (lstm, state)) in self.layers.iter().zip(states).enumerate() {
            let (cell_state, hidden_state) = lstm.forward(x, Some(state));

            final_states.push((last_step(cell_state), last_step(hidden_state.clone())));

            x = if idx + 1 < num_layers {
                self.dropout.forward(hidden_state)
            } else {
                hidden_state
            };
        }

        (x, final_states)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

fn last_step<B: Backend>(states: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, d_seq, d_hidden] = states.dims();
    states
        .slice([0..batch, d_seq - 1..d_seq, 0..d_hidden])
        .squeeze(1)
}

#[derive(Config, Debug)]
pub struct StackedLstmConfig {
    d_input: usize,
    d_hidden: usize,

    #[config(default = 1)]
    num_layers: usize,

    /// Only applied between layers.
    #[config(default = 0.0)]
    dropout: f64,
}

impl StackedLstmConfig {
    pub fn init<B: Backend>(&self) -> StackedLstm<B> {
        let layers = (0..self.num_layers)
            .map(|idx| {
                let d_input = if idx == 0 { self.d_input } else { self.d_hidden };
                LstmConfig::new(d_input, self.d_hidden, true).init()
            })
            .collect();

        let dropout = if self.num_layers > 1 { self.dropout } else { 0.0 };

        StackedLstm {
            layers,
            dropout: DropoutConfig::new(dropout).init(),
        }
    }
}
