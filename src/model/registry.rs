//! Model registry: run-time identifier → classifier family
//!
//! The identifier is resolved once, before any data is touched. The
//! configuration is carried unvalidated until [`ModelSpec::build`], where the
//! chosen family parses it into its own parameter struct.

use super::{Estimator, LogisticRegression, MlpClassifier, RandomForest};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parameter name → value mapping supplied for one model.
pub type ModelConfig = serde_json::Map<String, serde_json::Value>;

/// Registered classifier families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// `rf`
    RandomForest,
    /// `lr`
    LogisticRegression,
    /// `mlp`
    Mlp,
}

impl ModelKind {
    /// Every registered family, in registry order.
    pub const ALL: [Self; 3] = [Self::RandomForest, Self::LogisticRegression, Self::Mlp];

    /// Short identifier used on the command line and in `params.yaml`.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::RandomForest => "rf",
            Self::LogisticRegression => "lr",
            Self::Mlp => "mlp",
        }
    }

    /// Look up a family by identifier.
    ///
    /// # Errors
    /// Returns [`Error::UnknownModel`] if no family has that identifier
    pub fn from_identifier(identifier: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.identifier() == identifier)
            .ok_or_else(|| Error::UnknownModel(identifier.to_string()))
    }

    fn construct(self, config: &ModelConfig) -> Result<Estimator> {
        Ok(match self {
            Self::RandomForest => Estimator::RandomForest(RandomForest::from_config(config)?),
            Self::LogisticRegression => {
                Estimator::LogisticRegression(LogisticRegression::from_config(config)?)
            }
            Self::Mlp => Estimator::Mlp(MlpClassifier::from_config(config)?),
        })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_identifier(s)
    }
}

/// A resolved model choice: family plus the configuration to build it with.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    kind: ModelKind,
    config: ModelConfig,
}

impl ModelSpec {
    /// Resolve `identifier` against the registry.
    ///
    /// # Errors
    /// Returns [`Error::UnknownModel`] if the identifier is not registered
    pub fn resolve(identifier: &str, config: ModelConfig) -> Result<Self> {
        Ok(Self {
            kind: ModelKind::from_identifier(identifier)?,
            config,
        })
    }

    /// Resolved family.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Registry identifier.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.kind.identifier()
    }

    /// Configuration as supplied.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Construct the unfitted classifier.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if the family rejects the
    /// configuration (unknown name, wrong type, out of range)
    pub fn build(&self) -> Result<Estimator> {
        self.kind.construct(&self.config)
    }
}

/// Resolve `identifier` against the registry.
///
/// # Errors
/// Returns [`Error::UnknownModel`] if the identifier is not registered
pub fn resolve(identifier: &str, config: ModelConfig) -> Result<ModelSpec> {
    ModelSpec::resolve(identifier, config)
}

/// Merge `config` over a family's parameter defaults.
pub(crate) fn parse_params<T: DeserializeOwned>(kind: ModelKind, config: &ModelConfig) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(|e| {
        Error::InvalidParameter {
            model: kind.identifier().to_string(),
            reason: e.to_string(),
        }
    })
}
