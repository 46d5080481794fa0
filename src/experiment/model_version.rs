//! Model Version Record - numbered model registered under a lineage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment stage of a model version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelStage {
    /// Freshly registered, not assigned to any stage
    #[default]
    None,
    /// Being validated
    Staging,
    /// Serving
    Production,
    /// Retired
    Archived,
}

impl ModelStage {
    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Archived => "Archived",
        }
    }
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered version of a model lineage.
///
/// Versions within a lineage start at 1 and increase by one per
/// registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersionRecord {
    lineage: String,
    version: u32,
    stage: ModelStage,
    run_id: String,
    source: String,
    created_at: DateTime<Utc>,
}

impl ModelVersionRecord {
    /// Create a version record in [`ModelStage::None`].
    #[must_use]
    pub fn new(
        lineage: impl Into<String>,
        version: u32,
        run_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            lineage: lineage.into(),
            version,
            stage: ModelStage::None,
            run_id: run_id.into(),
            source: source.into(),
            created_at: Utc::now(),
        }
    }

    /// Get the lineage (registered model name).
    #[must_use]
    pub fn lineage(&self) -> &str {
        &self.lineage
    }

    /// Get the version number.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Get the stage.
    #[must_use]
    pub const fn stage(&self) -> ModelStage {
        self.stage
    }

    /// Get the producing run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the model artifact location.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
