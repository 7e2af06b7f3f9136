//! Temporal Fusion Transformer forecasting on top of burn.
//!
//! The [`models::tft`] module holds the network itself and the
//! autoregressive [`models::tft::rollout`] controller that extends its
//! forecasts past a single output chunk.

pub mod data;
pub mod error;
pub mod models;
pub mod modules;
pub mod utils;

pub use error::{Result, TftError};
