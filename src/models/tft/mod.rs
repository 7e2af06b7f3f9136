//! Temporal Fusion Transformer and its autoregressive rollout.

pub mod add_norm;
pub mod attention;
pub mod glu;
pub mod grn;
pub mod lstm;
pub mod model;
pub mod registry;
pub mod rollout;
pub mod tfd;
pub mod tfe;
pub mod vsn;

pub use model::{LossKind, ModelOutput, TemporalFusionTransformerConfig, TemporalFusionTransformerModel};
pub use rollout::{rollout, ChunkForecaster, RolloutConfig};
