use std::path::{Path, PathBuf};

use async_trait::async_trait;
use triage::FailureRecord;

use crate::collaborators::{CollaboratorError, TestResultSource};

/// Offline [`TestResultSource`] reading a JSON array of failure records.
///
/// The pipeline id is only used to fill in records that carry no job id.
#[derive(Debug, Clone)]
pub struct ReportFileSource {
    path: PathBuf,
}

impl ReportFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TestResultSource for ReportFileSource {
    async fn fetch_failures(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<FailureRecord>, CollaboratorError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut failures: Vec<FailureRecord> = serde_json::from_str(&raw)
            .map_err(|e| CollaboratorError::Decode(format!("{}: {}", self.path.display(), e)))?;

        for failure in &mut failures {
            if failure.job_id.is_empty() {
                failure.job_id = pipeline_id.to_string();
            }
        }

        tracing::info!(path = %self.path.display(), count = failures.len(), "loaded failure report");
        Ok(failures)
    }
}
