use std::collections::{BTreeMap, HashMap};

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};
use tracing::trace;

use super::grn::{GatedResidualNetwork, GatedResidualNetworkConfig};
use super::vsn::{VariableSelectionNetwork, VariableSelectionNetworkConfig};

/// Per-variable sub-networks shared by the selection gates.
///
/// Every real variable owns one prescaler, a `Linear(1, d)` lifting its
/// single column to the continuous hidden width. Single-variable GRNs live in
/// one pool; a gate refers to them by slot, so two gates can hold the same
/// slot and therefore the same parameters.
#[derive(Module, Debug)]
pub struct VariableRegistry<B: Backend> {
    prescalers: Vec<Linear<B>>,
    networks: Vec<GatedResidualNetwork<B>>,
}

impl<B: Backend> VariableRegistry<B> {
    pub fn prescale<const D: usize>(&self, slot: usize, x: Tensor<B, D>) -> Tensor<B, D> {
        self.prescalers[slot].forward(x)
    }

    pub fn encode<const D: usize>(&self, slot: usize, x: Tensor<B, D>) -> Tensor<B, D> {
        self.networks[slot].forward(x, None)
    }

    pub fn num_prescalers(&self) -> usize {
        self.prescalers.len()
    }

    pub fn num_networks(&self) -> usize {
        self.networks.len()
    }

    #[cfg(test)]
    pub(crate) fn replace_network(&mut self, slot: usize, network: GatedResidualNetwork<B>) {
        self.networks[slot] = network;
    }
}

/// Allocates prescalers and single-variable networks while the selection
/// gates are built.
pub struct VariableRegistryBuilder<B: Backend> {
    d_hidden: usize,
    d_continuous: usize,
    d_continuous_overrides: BTreeMap<String, usize>,
    dropout: f64,
    prescaler_slots: HashMap<String, usize>,
    prescalers: Vec<Linear<B>>,
    shared_slots: Option<HashMap<String, usize>>,
    networks: Vec<GatedResidualNetwork<B>>,
}

impl<B: Backend> VariableRegistryBuilder<B> {
    /// Creates the prescalers of `reals`, in order.
    ///
    /// With `share_networks`, a name gets a single network no matter how many
    /// gates select it; the first gate to ask creates it.
    pub fn new(
        reals: &[String],
        d_hidden: usize,
        d_continuous: usize,
        d_continuous_overrides: BTreeMap<String, usize>,
        dropout: f64,
        share_networks: bool,
    ) -> Self {
        let mut builder = Self {
            d_hidden,
            d_continuous,
            d_continuous_overrides,
            dropout,
            prescaler_slots: HashMap::new(),
            prescalers: Vec::new(),
            shared_slots: share_networks.then(HashMap::new),
            networks: Vec::new(),
        };

        for name in reals {
            builder.prescaler_slot(name);
        }

        builder
    }

    pub fn input_size(&self, name: &str) -> usize {
        self.d_continuous_overrides
            .get(name)
            .copied()
            .unwrap_or(self.d_continuous)
    }

    fn prescaler_slot(&mut self, name: &str) -> usize {
        if let Some(slot) = self.prescaler_slots.get(name) {
            return *slot;
        }

        let slot = self.prescalers.len();
        self.prescalers
            .push(LinearConfig::new(1, self.input_size(name)).init());
        self.prescaler_slots.insert(name.to_string(), slot);
        slot
    }

    fn network_slot(&mut self, name: &str) -> usize {
        if let Some(slot) = self
            .shared_slots
            .as_ref()
            .and_then(|shared| shared.get(name))
        {
            trace!(name, slot, "reusing shared single variable network");
            return *slot;
        }

        let d_input = self.input_size(name);
        let slot = self.networks.len();
        self.networks.push(
            GatedResidualNetworkConfig::new(d_input.min(self.d_hidden))
                .with_d_input(Some(d_input))
                .with_d_output(Some(self.d_hidden))
                .with_dropout(self.dropout)
                .init(),
        );

        if let Some(shared) = self.shared_slots.as_mut() {
            shared.insert(name.to_string(), slot);
        }
        slot
    }

    /// Builds a selection gate over `names`, conditioned on a context of
    /// width `d_context` (0 for none).
    pub fn selection(&mut self, names: &[String], d_context: usize) -> VariableSelectionNetwork<B> {
        let prescaler_slots: Vec<usize> = names.iter().map(|n| self.prescaler_slot(n)).collect();
        let network_slots: Vec<usize> = names.iter().map(|n| self.network_slot(n)).collect();
        let d_total: usize = names.iter().map(|n| self.input_size(n)).sum();

        VariableSelectionNetworkConfig::new(self.d_hidden, d_total)
            .with_d_context(d_context)
            .with_dropout(self.dropout)
            .init(prescaler_slots, network_slots)
    }

    pub fn build(self) -> VariableRegistry<B> {
        VariableRegistry {
            prescalers: self.prescalers,
            networks: self.networks,
        }
    }
}
