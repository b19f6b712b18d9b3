//! Pipeline step identifiers and step selection
//!
//! The master list fixes execution order. Selection only filters it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Selection keyword expanding to the default step set
pub const ALL_STEPS: &str = "all";

/// One named pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Download,
    BasicCleaning,
    DataCheck,
    DataSplit,
    TrainRandomForest,
    TestRegressionModel,
}

impl StepName {
    /// Master list, in execution order
    pub const MASTER: [StepName; 6] = [
        StepName::Download,
        StepName::BasicCleaning,
        StepName::DataCheck,
        StepName::DataSplit,
        StepName::TrainRandomForest,
        StepName::TestRegressionModel,
    ];

    /// Step name as used in configuration and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::BasicCleaning => "basic_cleaning",
            Self::DataCheck => "data_check",
            Self::DataSplit => "data_split",
            Self::TrainRandomForest => "train_random_forest",
            Self::TestRegressionModel => "test_regression_model",
        }
    }

    /// Whether `all` expands to this step
    ///
    /// `test_regression_model` needs a model promoted to `prod` first and
    /// only runs when named explicitly.
    pub fn in_default_selection(self) -> bool {
        !matches!(self, Self::TestRegressionModel)
    }

    /// Position in the master list
    pub fn position(self) -> usize {
        Self::MASTER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(Self::MASTER.len())
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MASTER
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| {
                ContractError::config_validation(
                    "main.steps",
                    format!(
                        "unknown step '{s}', expected one of: {}",
                        Self::MASTER.map(StepName::as_str).join(", ")
                    ),
                )
            })
    }
}

/// Ordered, de-duplicated set of steps to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSelection {
    steps: Vec<StepName>,
}

impl StepSelection {
    /// Parse `all` or a comma-separated list of step names
    ///
    /// Token order is irrelevant: the result is always in master-list order.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        let raw = raw.trim();
        if raw == ALL_STEPS {
            return Ok(Self::default_steps());
        }

        let mut requested = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            requested.push(token.parse::<StepName>()?);
        }

        if requested.is_empty() {
            return Err(ContractError::config_validation(
                "main.steps",
                "step selection is empty",
            ));
        }

        Ok(Self::from_steps(requested))
    }

    /// Steps `all` expands to
    pub fn default_steps() -> Self {
        Self {
            steps: StepName::MASTER
                .into_iter()
                .filter(|s| s.in_default_selection())
                .collect(),
        }
    }

    /// Build from any collection of steps, reordering to the master list
    pub fn from_steps(steps: impl IntoIterator<Item = StepName>) -> Self {
        let mut steps: Vec<StepName> = steps.into_iter().collect();
        steps.sort_by_key(|s| s.position());
        steps.dedup();
        Self { steps }
    }

    pub fn contains(&self, step: StepName) -> bool {
        self.steps.contains(&step)
    }

    pub fn steps(&self) -> &[StepName] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl IntoIterator for StepSelection {
    type Item = StepName;
    type IntoIter = std::vec::IntoIter<StepName>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
