use std::{ops::RangeInclusive, path::Path};

use serde::{Deserialize, Serialize};

use super::NgramOrder;
use crate::{
    error::{BovError, Result},
    pre_processor::DimensionPolicy,
};

pub const DEFAULT_OUTPUT_PREFIX: &str = "bov_ng";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildParams {
    /// Largest everygram order; one matrix is built per order `1..=max_order`.
    max_order: NgramOrder,
    /// Matrix files are named `<output_prefix><order>`.
    output_prefix: String,
    /// Handling of embedding rows whose width disagrees with the first row.
    dimension_policy: DimensionPolicy,
    /// Aggregate documents on the rayon pool when the corpus is large enough.
    parallel: bool,
}

impl BuildParams {
    pub fn new(max_order: NgramOrder) -> Result<Self> {
        let params = Self {
            max_order,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    /// Read params from a JSON object; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BovError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let params: Self = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_order == 0 {
            return Err(BovError::Config(
                "n-gram order must be a natural number (>= 1)".into(),
            ));
        }
        if self.output_prefix.is_empty() {
            return Err(BovError::Config("output prefix must not be empty".into()));
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err(BovError::Config(format!(
                "output prefix {:?} must be a file name, not a path",
                self.output_prefix
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_max_order(mut self, max_order: NgramOrder) -> Self {
        self.max_order = max_order;
        self
    }

    #[must_use]
    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_dimension_policy(mut self, policy: DimensionPolicy) -> Self {
        self.dimension_policy = policy;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn max_order(&self) -> NgramOrder {
        self.max_order
    }

    #[must_use]
    pub fn orders(&self) -> RangeInclusive<NgramOrder> {
        1..=self.max_order
    }

    #[must_use]
    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    #[must_use]
    pub fn dimension_policy(&self) -> DimensionPolicy {
        self.dimension_policy
    }

    #[must_use]
    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// File name of the matrix for `order`.
    #[must_use]
    pub fn file_name(&self, order: NgramOrder) -> String {
        format!("{}{order}", self.output_prefix)
    }
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            max_order: 1,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_owned(),
            dimension_policy: DimensionPolicy::Strict,
            parallel: true,
        }
    }
}
