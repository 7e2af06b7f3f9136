use burn::config::Config;
use burn::tensor::{backend::Backend, Tensor};
use tracing::debug;

use crate::data::batchitem::{BatchItem, RolloutBatch};
use crate::error::TftError;
use crate::utils::slice_time;

use super::model::TemporalFusionTransformerModel;

/// A model that forecasts one fixed-length chunk from a fixed-length past.
pub trait ChunkForecaster<B: Backend> {
    fn input_chunk_length(&self) -> usize;

    fn output_chunk_length(&self) -> usize;

    /// Point forecast `[N, output_chunk_length, n_targets]`.
    fn forecast(&self, batch: BatchItem<B>) -> crate::error::Result<Tensor<B, 3>>;
}

impl<B: Backend> ChunkForecaster<B> for TemporalFusionTransformerModel<B> {
    fn input_chunk_length(&self) -> usize {
        TemporalFusionTransformerModel::input_chunk_length(self)
    }

    fn output_chunk_length(&self) -> usize {
        TemporalFusionTransformerModel::output_chunk_length(self)
    }

    fn forecast(&self, batch: BatchItem<B>) -> crate::error::Result<Tensor<B, 3>> {
        self.predict(batch)
    }
}

#[derive(Config, Debug)]
pub struct RolloutConfig {
    /// Number of steps to forecast.
    n: usize,

    /// Steps committed per model call before the windows move forward.
    /// Defaults to the usable chunk length.
    #[config(default = "None")]
    roll_size: Option<usize>,

    /// Leading output steps of every call that are discarded.
    #[config(default = 0)]
    first_prediction_index: usize,
}

/// How the past window absorbs the rows committed by one roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowUpdate {
    /// Drop the oldest `roll` rows and append the new ones.
    Shift { roll: usize },
    /// The new rows fill the whole window.
    Replace,
}

impl WindowUpdate {
    fn for_roll(roll: usize, input_chunk_length: usize) -> Self {
        if roll < input_chunk_length {
            WindowUpdate::Shift { roll }
        } else {
            WindowUpdate::Replace
        }
    }

    /// Rows of the window that the update keeps, `min(roll, icl)`.
    fn new_rows(self, input_chunk_length: usize) -> usize {
        match self {
            WindowUpdate::Shift { roll } => roll,
            WindowUpdate::Replace => input_chunk_length,
        }
    }

    fn apply<B: Backend>(self, window: Tensor<B, 3>, rows: Tensor<B, 3>) -> Tensor<B, 3> {
        match self {
            WindowUpdate::Shift { roll } => {
                let steps = window.dims()[1];
                Tensor::cat(vec![slice_time(window, roll..steps), rows], 1)
            }
            WindowUpdate::Replace => rows,
        }
    }
}

/// Validated rollout parameters.
#[derive(Debug, Clone, Copy)]
struct RolloutPlan {
    n: usize,
    roll_size: usize,
    first_prediction_index: usize,
    chunk_length: usize,
}

impl RolloutPlan {
    fn new(config: &RolloutConfig, output_chunk_length: usize) -> crate::error::Result<Self> {
        if config.n == 0 {
            return Err(TftError::InvalidRollout("n must be positive".to_string()));
        }
        if config.first_prediction_index >= output_chunk_length {
            return Err(TftError::InvalidRollout(format!(
                "first_prediction_index {} must be below the output chunk length {}",
                config.first_prediction_index, output_chunk_length
            )));
        }

        let chunk_length = output_chunk_length - config.first_prediction_index;
        let roll_size = config.roll_size.unwrap_or(chunk_length);
        if roll_size == 0 || roll_size > chunk_length {
            return Err(TftError::InvalidRollout(format!(
                "roll_size must be in 1..={chunk_length}, got {roll_size}"
            )));
        }

        Ok(Self {
            n: config.n,
            roll_size,
            first_prediction_index: config.first_prediction_index,
            chunk_length,
        })
    }

    /// Horizon steps committed before the last call.
    fn committed_horizon(&self) -> usize {
        self.n.max(self.chunk_length) - self.chunk_length
    }
}

fn check_horizon<B: Backend>(what: &'static str, tensor: &Tensor<B, 3>, required: usize) -> crate::error::Result<()> {
    let actual = tensor.dims()[1];
    if actual < required {
        return Err(TftError::DimensionMismatch {
            what,
            expected: required,
            actual,
        });
    }
    Ok(())
}

/// Forecasts `n` steps by repeatedly calling `forecaster` and feeding its
/// predictions back into the past window.
///
/// The future tensors of `batch` start at the forecast origin. Future
/// covariates must cover the last call's window, `max(n, L) - L + ocl`
/// steps where `L = ocl - first_prediction_index`; future past covariates
/// must cover the committed horizon, `max(n, L) - L` steps.
///
/// Returns `[N, n, n_targets]`.
pub fn rollout<B, F>(forecaster: &F, batch: RolloutBatch<B>, config: &RolloutConfig) -> crate::error::Result<Tensor<B, 3>>
where
    B: Backend,
    F: ChunkForecaster<B> + ?Sized,
{
    let input_chunk_length = forecaster.input_chunk_length();
    let output_chunk_length = forecaster.output_chunk_length();
    let plan = RolloutPlan::new(config, output_chunk_length)?;
    let committed_horizon = plan.committed_horizon();

    batch.check_lengths(input_chunk_length)?;

    let RolloutBatch {
        mut past_target,
        mut past_covariates,
        mut historic_future_covariates,
        future_covariates,
        future_past_covariates,
    } = batch;

    if let Some(future) = &future_covariates {
        check_horizon("future covariates horizon", future, committed_horizon + output_chunk_length)?;
    }
    // rolled rows of the past window are taken from the horizon tensors
    if committed_horizon > 0 {
        if let Some(past) = &past_covariates {
            let future_past = future_past_covariates
                .as_ref()
                .ok_or(TftError::MissingInput("future past covariates"))?;
            check_horizon("future past covariates horizon", future_past, committed_horizon)?;
            TftError::check_dim(
                "future past covariates features",
                past.dims()[2],
                future_past.dims()[2],
            )?;
        }
        if let Some(historic) = &historic_future_covariates {
            let future = future_covariates
                .as_ref()
                .ok_or(TftError::MissingInput("future covariates"))?;
            TftError::check_dim("future covariates features", historic.dims()[2], future.dims()[2])?;
        }
    }

    let forecast_chunk = |past_target: Tensor<B, 3>,
                          past_covariates: Option<Tensor<B, 3>>,
                          historic_future_covariates: Option<Tensor<B, 3>>,
                          start: usize|
     -> crate::error::Result<Tensor<B, 3>> {
        let item = BatchItem {
            past_target,
            past_covariates,
            historic_future_covariates,
            future_covariates: future_covariates
                .as_ref()
                .map(|future| slice_time(future.clone(), start..start + output_chunk_length)),
        };

        let output = forecaster.forecast(item)?;
        TftError::check_dim("forecast length", output_chunk_length, output.dims()[1])?;
        Ok(slice_time(output, plan.first_prediction_index..output_chunk_length))
    };

    let mut current = forecast_chunk(
        past_target.clone(),
        past_covariates.clone(),
        historic_future_covariates.clone(),
        0,
    )?;
    TftError::check_dim("forecast targets", past_target.dims()[2], current.dims()[2])?;

    let mut chunks = Vec::new();
    let mut committed = 0;

    while committed + plan.chunk_length < plan.n {
        // the last chunk must end exactly at n
        let roll = plan.roll_size.min(plan.n - plan.chunk_length - committed);
        let kept = slice_time(current, 0..roll);

        let update = WindowUpdate::for_roll(roll, input_chunk_length);
        let rows = update.new_rows(input_chunk_length);
        let horizon_rows = committed + roll - rows..committed + roll;

        past_target = update.apply(past_target, slice_time(kept.clone(), roll - rows..roll));
        past_covariates = match (past_covariates, &future_past_covariates) {
            (Some(past), Some(future)) => {
                Some(update.apply(past, slice_time(future.clone(), horizon_rows.clone())))
            }
            (past, _) => past,
        };
        historic_future_covariates = match (historic_future_covariates, &future_covariates) {
            (Some(historic), Some(future)) => {
                Some(update.apply(historic, slice_time(future.clone(), horizon_rows)))
            }
            (historic, _) => historic,
        };

        chunks.push(kept);
        committed += roll;

        debug!(?update, roll, committed, n = plan.n, "rolling forecast window");

        current = forecast_chunk(
            past_target.clone(),
            past_covariates.clone(),
            historic_future_covariates.clone(),
            committed,
        )?;
    }
    chunks.push(current);

    let forecast = Tensor::cat(chunks, 1);
    Ok(slice_time(forecast, 0..plan.n))
}
