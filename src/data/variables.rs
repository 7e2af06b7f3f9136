use serde::{Deserialize, Serialize};

use crate::error::{Result, TftError};

/// Widths of the tensors in one training sample.
///
/// The optional entries are `None` when the series carries no such
/// covariates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleDims {
    pub past_target: usize,
    pub past_covariates: Option<usize>,
    pub historic_future_covariates: Option<usize>,
    pub future_covariates: Option<usize>,
    pub future_target: usize,
    pub static_covariates: Option<usize>,
}

impl SampleDims {
    /// Number of features on the past side of the model.
    pub fn input_dim(&self) -> usize {
        self.past_target
            + self.past_covariates.unwrap_or(0)
            + self.historic_future_covariates.unwrap_or(0)
    }

    pub fn n_targets(&self) -> usize {
        self.future_target
    }
}

/// Partition of the model's feature columns into static, encoder and
/// decoder roles.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableGroups {
    reals: Vec<String>,
    static_variables: Vec<String>,
    encoder_variables: Vec<String>,
    decoder_variables: Vec<String>,
}

impl VariableGroups {
    pub fn new(
        static_variables: Vec<String>,
        encoder_variables: Vec<String>,
        decoder_variables: Vec<String>,
    ) -> Self {
        let reals = dedup(
            encoder_variables
                .iter()
                .chain(decoder_variables.iter())
                .chain(static_variables.iter())
                .cloned(),
        );

        Self {
            reals,
            static_variables: dedup(static_variables),
            encoder_variables: dedup(encoder_variables),
            decoder_variables: dedup(decoder_variables),
        }
    }

    /// Names every column of a training sample.
    ///
    /// Historic and future covariates get the same names so the encoder and
    /// the decoder see them as one variable.
    pub fn from_sample(dims: &SampleDims) -> Self {
        let groups: [(Role, &str, Option<usize>); 6] = [
            (Role::Encoder, "target", Some(dims.past_target)),
            (Role::Encoder, "past_covariate", dims.past_covariates),
            (Role::Encoder, "future_covariate", dims.historic_future_covariates),
            (Role::Decoder, "future_covariate", dims.future_covariates),
            (Role::Target, "target", Some(dims.future_target)),
            (Role::Static, "static_covariate", dims.static_covariates),
        ];

        let mut reals = Vec::new();
        let mut static_variables = Vec::new();
        let mut encoder_variables = Vec::new();
        let mut decoder_variables = Vec::new();

        for (role, prefix, width) in groups {
            let Some(width) = width else {
                continue;
            };
            let names: Vec<String> = (0..width).map(|i| format!("{prefix}_{i}")).collect();

            reals.extend(names.iter().cloned());
            match role {
                Role::Encoder => encoder_variables.extend(names),
                Role::Decoder => decoder_variables.extend(names),
                Role::Static => static_variables.extend(names),
                Role::Target => {}
            }
        }

        Self {
            reals: dedup(reals),
            static_variables: dedup(static_variables),
            encoder_variables: dedup(encoder_variables),
            decoder_variables: dedup(decoder_variables),
        }
    }

    /// All continuous variables of the model.
    pub fn reals(&self) -> &[String] {
        &self.reals
    }

    /// Categorical variables are not implemented.
    pub fn categoricals(&self) -> Result<&[String]> {
        Err(TftError::Unsupported("categorical variables".to_string()))
    }

    pub fn static_variables(&self) -> &[String] {
        &self.static_variables
    }

    /// Past-known variables, in the column order of the past input block.
    pub fn encoder_variables(&self) -> &[String] {
        &self.encoder_variables
    }

    /// Future-known variables, in the column order of the future input block.
    pub fn decoder_variables(&self) -> &[String] {
        &self.decoder_variables
    }
}

enum Role {
    Encoder,
    Decoder,
    Static,
    Target,
}

fn dedup<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
