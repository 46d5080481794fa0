//! Run Record - one training execution inside an experiment

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Open and accepting log entries.
    Running,
    /// Closed normally.
    Finished,
    /// Closed on an error path.
    Failed,
}

impl RunStatus {
    /// Whether the run has been closed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Upper-case name as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run: status, timestamps and the string parameters logged against it.
///
/// Runs are created in [`RunStatus::Running`]; once closed they reject
/// further changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    params: BTreeMap<String, String>,
}

impl RunRecord {
    /// Open a new run now.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        run_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            params: BTreeMap::new(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the human-readable run name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, if closed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Logged parameters, sorted by name.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Fail unless the run is still open.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] for a closed run
    pub fn ensure_active(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::ExternalStore(format!(
                "run `{}` is already {}",
                self.run_id, self.status
            )));
        }
        Ok(())
    }

    /// Record a parameter. Re-logging the same value is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] if the run is closed or the key
    /// already holds a different value
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.params.get(&key) {
            if *existing != value {
                return Err(Error::ExternalStore(format!(
                    "parameter `{key}` of run `{}` already logged as `{existing}`",
                    self.run_id
                )));
            }
            return Ok(());
        }
        self.params.insert(key, value);
        Ok(())
    }

    /// Close the run with a terminal status.
    ///
    /// # Errors
    /// Returns [`Error::ExternalStore`] if already closed or `status` is
    /// [`RunStatus::Running`]
    pub fn finish(&mut self, status: RunStatus) -> Result<()> {
        self.ensure_active()?;
        if !status.is_terminal() {
            return Err(Error::ExternalStore(format!(
                "cannot end run `{}` with status {status}",
                self.run_id
            )));
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_starts_running() {
        let run = RunRecord::new("run-000001", "0", "rf_run");
        assert_eq!(run.status(), RunStatus::Running);
        assert_eq!(run.run_name(), "rf_run");
        assert!(run.ended_at().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::new("run-000001", "0", "rf_run");
        run.finish(RunStatus::Finished).unwrap();
        assert_eq!(run.status(), RunStatus::Finished);
        assert!(run.ended_at().unwrap() >= run.started_at());
        assert!(run.finish(RunStatus::Failed).is_err());
    }

    #[test]
    fn test_param_conflict() {
        let mut run = RunRecord::new("r", "0", "n");
        run.set_param("model_name", "rf").unwrap();
        run.set_param("model_name", "rf").unwrap();
        assert!(matches!(
            run.set_param("model_name", "lr"),
            Err(Error::ExternalStore(_))
        ));
    }

    #[test]
    fn test_closed_run_rejects_params() {
        let mut run = RunRecord::new("r", "0", "n");
        run.finish(RunStatus::Failed).unwrap();
        assert!(run.set_param("a", "1").is_err());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&RunStatus::Finished).unwrap(), "\"FINISHED\"");
        assert!(RunRecord::new("r", "0", "n").finish(RunStatus::Running).is_err());
    }
}
