use burn::tensor::{backend::Backend, Tensor};

use crate::data::variables::SampleDims;
use crate::error::{Result, TftError};
use crate::utils::cat_present;

/// Inputs of one forward pass.
#[derive(Clone, Debug)]
pub struct BatchItem<B: Backend> {
    pub past_target: Tensor<B, 3>,                        // [N, T, D_t]
    pub past_covariates: Option<Tensor<B, 3>>,            // [N, T, D_pc]
    pub historic_future_covariates: Option<Tensor<B, 3>>, // [N, T, D_fc]
    pub future_covariates: Option<Tensor<B, 3>>,          // [N, H, D_fc]
}

impl<B: Backend> BatchItem<B> {
    pub fn new(past_target: Tensor<B, 3>) -> Self {
        Self {
            past_target,
            past_covariates: None,
            historic_future_covariates: None,
            future_covariates: None,
        }
    }

    pub fn with_past_covariates(mut self, past_covariates: Tensor<B, 3>) -> Self {
        self.past_covariates = Some(past_covariates);
        self
    }

    pub fn with_future_covariates(
        mut self,
        historic_future_covariates: Tensor<B, 3>,
        future_covariates: Tensor<B, 3>,
    ) -> Self {
        self.historic_future_covariates = Some(historic_future_covariates);
        self.future_covariates = Some(future_covariates);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.past_target.dims()[0]
    }

    /// Checks that every present tensor has the batch size of the past
    /// target, `input_chunk_length` past steps and `output_chunk_length`
    /// future steps.
    pub fn check_lengths(&self, input_chunk_length: usize, output_chunk_length: usize) -> Result<()> {
        let [batch_size, past_steps, _] = self.past_target.dims();
        TftError::check_dim("input chunk length", input_chunk_length, past_steps)?;

        check_series(
            self.past_covariates.as_ref(),
            ("past covariates batch size", "past covariates length"),
            batch_size,
            Some(input_chunk_length),
        )?;
        check_series(
            self.historic_future_covariates.as_ref(),
            ("historic future covariates batch size", "historic future covariates length"),
            batch_size,
            Some(input_chunk_length),
        )?;
        check_series(
            self.future_covariates.as_ref(),
            ("future covariates batch size", "output chunk length"),
            batch_size,
            Some(output_chunk_length),
        )
    }

    /// Past target, past covariates and historic future covariates joined on
    /// the feature axis: `[N, T, D_t + D_pc + D_fc]`.
    pub fn past_input(&self) -> Tensor<B, 3> {
        let past = cat_present(
            vec![
                Some(self.past_target.clone()),
                self.past_covariates.clone(),
                self.historic_future_covariates.clone(),
            ],
            2,
        );
        // the past target is always present
        past.unwrap_or_else(|| self.past_target.clone())
    }
}

/// Inputs of a multi-chunk rollout.
///
/// The future tensors start at the forecast origin and span the whole
/// horizon. `future_past_covariates` holds the observed values of the past
/// covariates over that horizon.
#[derive(Clone, Debug)]
pub struct RolloutBatch<B: Backend> {
    pub past_target: Tensor<B, 3>,                        // [N, T, D_t]
    pub past_covariates: Option<Tensor<B, 3>>,            // [N, T, D_pc]
    pub historic_future_covariates: Option<Tensor<B, 3>>, // [N, T, D_fc]
    pub future_covariates: Option<Tensor<B, 3>>,          // [N, n, D_fc]
    pub future_past_covariates: Option<Tensor<B, 3>>,     // [N, n, D_pc]
}

impl<B: Backend> RolloutBatch<B> {
    pub fn new(past_target: Tensor<B, 3>) -> Self {
        Self {
            past_target,
            past_covariates: None,
            historic_future_covariates: None,
            future_covariates: None,
            future_past_covariates: None,
        }
    }

    pub fn with_past_covariates(
        mut self,
        past_covariates: Tensor<B, 3>,
        future_past_covariates: Tensor<B, 3>,
    ) -> Self {
        self.past_covariates = Some(past_covariates);
        self.future_past_covariates = Some(future_past_covariates);
        self
    }

    pub fn with_future_covariates(
        mut self,
        historic_future_covariates: Tensor<B, 3>,
        future_covariates: Tensor<B, 3>,
    ) -> Self {
        self.historic_future_covariates = Some(historic_future_covariates);
        self.future_covariates = Some(future_covariates);
        self
    }
}

impl<B: Backend> RolloutBatch<B> {
    /// Checks the past window against `input_chunk_length` and the batch
    /// size of every tensor. Horizon lengths depend on the rollout and are
    /// checked there.
    pub fn check_lengths(&self, input_chunk_length: usize) -> Result<()> {
        let [batch_size, past_steps, _] = self.past_target.dims();
        TftError::check_dim("input chunk length", input_chunk_length, past_steps)?;

        check_series(
            self.past_covariates.as_ref(),
            ("past covariates batch size", "past covariates length"),
            batch_size,
            Some(input_chunk_length),
        )?;
        check_series(
            self.historic_future_covariates.as_ref(),
            ("historic future covariates batch size", "historic future covariates length"),
            batch_size,
            Some(input_chunk_length),
        )?;
        check_series(
            self.future_covariates.as_ref(),
            ("future covariates batch size", ""),
            batch_size,
            None,
        )?;
        check_series(
            self.future_past_covariates.as_ref(),
            ("future past covariates batch size", ""),
            batch_size,
            None,
        )
    }
}

/// `what` names the batch and time checks.
fn check_series<B: Backend>(
    series: Option<&Tensor<B, 3>>,
    what: (&'static str, &'static str),
    batch_size: usize,
    steps: Option<usize>,
) -> Result<()> {
    let Some(series) = series else {
        return Ok(());
    };

    let [series_batch, series_steps, _] = series.dims();
    TftError::check_dim(what.0, batch_size, series_batch)?;
    match steps {
        Some(steps) => TftError::check_dim(what.1, steps, series_steps),
        None => Ok(()),
    }
}

impl SampleDims {
    /// Reads the widths of a batch; the future target mirrors the past one.
    pub fn from_batch<B: Backend>(batch: &BatchItem<B>) -> Self {
        let width = |t: &Tensor<B, 3>| t.dims()[2];
        let n_targets = width(&batch.past_target);

        SampleDims {
            past_target: n_targets,
            past_covariates: batch.past_covariates.as_ref().map(width),
            historic_future_covariates: batch.historic_future_covariates.as_ref().map(width),
            future_covariates: batch.future_covariates.as_ref().map(width),
            future_target: n_targets,
            static_covariates: None,
        }
    }
}
