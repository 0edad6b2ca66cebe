//! CircleCI test-result source.
//!
//! ```text
//! GET v2   /pipeline/{id}/workflow        → workflows
//! GET v2   /workflow/{id}/job             → jobs (keep status == "failed")
//! GET v1.1 /project/{slug}/{job_number}   → vcs_revision, branch, steps
//! GET      steps["Run tests"].actions[failed].output_url → [{message}]
//! ```
//!
//! The joined step output is parsed as Jest console output. A job whose log
//! cannot be retrieved is logged and skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use triage::jest::parse_jest_output;
use triage::FailureRecord;

use crate::collaborators::{CollaboratorError, TestResultSource};

const SERVICE: &str = "CircleCI";
/// Step whose failed action carries the test runner output.
pub const TEST_STEP_NAME: &str = "Run tests";

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Workflow {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Job {
    #[serde(default)]
    id: String,
    #[serde(default)]
    job_number: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    project_slug: String,
}

#[derive(Debug, Deserialize)]
struct JobDetails {
    #[serde(default)]
    vcs_revision: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    name: String,
    #[serde(default)]
    actions: Vec<StepAction>,
}

#[derive(Debug, Deserialize)]
struct StepAction {
    #[serde(default)]
    status: String,
    #[serde(default)]
    output_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StepOutput {
    Messages(Vec<OutputMessage>),
    Single(OutputMessage),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    message: Option<String>,
}

impl StepOutput {
    fn into_text(self) -> String {
        match self {
            Self::Messages(items) => items
                .into_iter()
                .filter_map(|m| m.message)
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Single(item) => item.message.unwrap_or_default(),
            Self::Text(text) => text,
        }
    }
}

/// [`TestResultSource`] backed by the CircleCI v2 and v1.1 APIs.
pub struct CircleCiClient {
    token: String,
    base_url: String,
    v1_base_url: String,
    client: reqwest::Client,
}

impl CircleCiClient {
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        v1_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            v1_base_url: v1_base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CollaboratorError> {
        let response = self
            .client
            .get(url)
            .header("Circle-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CollaboratorError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::api(SERVICE, status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(format!("{url}: {e}")))
    }

    async fn failed_jobs(&self, pipeline_id: &str) -> Result<Vec<Job>, CollaboratorError> {
        let workflows: Page<Workflow> = self
            .get_json(&format!("{}/pipeline/{}/workflow", self.base_url, pipeline_id))
            .await?;

        let mut failed = Vec::new();
        for workflow in workflows.items {
            let jobs: Page<Job> = self
                .get_json(&format!("{}/workflow/{}/job", self.base_url, workflow.id))
                .await?;
            failed.extend(jobs.items.into_iter().filter(|job| job.status == "failed"));
        }
        Ok(failed)
    }

    async fn job_details(&self, slug: &str, job_number: u64) -> Result<JobDetails, CollaboratorError> {
        self.get_json(&format!("{}/project/{}/{}", self.v1_base_url, slug, job_number))
            .await
    }

    /// Output of the failed "Run tests" action.
    async fn test_step_output(&self, details: &JobDetails) -> Result<String, CollaboratorError> {
        let step = details
            .steps
            .iter()
            .find(|s| s.name == TEST_STEP_NAME)
            .ok_or_else(|| CollaboratorError::NotFound(format!("no \"{TEST_STEP_NAME}\" step in job")))?;

        let output_url = step
            .actions
            .iter()
            .find(|a| a.status == "failed")
            .and_then(|a| a.output_url.as_deref())
            .ok_or_else(|| CollaboratorError::NotFound("no failed action in test step".into()))?;

        let output: StepOutput = self.get_json(output_url).await?;
        Ok(output.into_text())
    }

    fn to_failure_record(
        job: &Job,
        job_number: u64,
        output: String,
        commit_sha: &str,
        branch: Option<&str>,
    ) -> FailureRecord {
        let parsed = parse_jest_output(&output);

        let test_name = parsed
            .test_name
            .or_else(|| (!job.name.is_empty()).then(|| job.name.clone()))
            .unwrap_or_else(|| "Unknown Test".to_string());
        let test_file = parsed.test_file.unwrap_or_else(|| "Unknown".to_string());
        let error_message = if output.trim().is_empty() {
            "No error message available".to_string()
        } else {
            output
        };

        let mut record = FailureRecord::new(test_name, test_file, error_message)
            .with_stack_trace(parsed.stack_trace.unwrap_or_default())
            .with_build(job.id.as_str(), job_number, commit_sha)
            .with_timestamp(job.started_at.unwrap_or_else(Utc::now));
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            record = record.with_branch(branch);
        }
        record
    }
}

impl std::fmt::Debug for CircleCiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircleCiClient")
            .field("base_url", &self.base_url)
            .field("v1_base_url", &self.v1_base_url)
            .finish()
    }
}

#[async_trait]
impl TestResultSource for CircleCiClient {
    async fn fetch_failures(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<FailureRecord>, CollaboratorError> {
        let jobs = self.failed_jobs(pipeline_id).await?;
        tracing::info!(pipeline = pipeline_id, failed_jobs = jobs.len(), "fetched failed jobs");

        let mut commit_sha = String::new();
        let mut branch: Option<String> = None;
        let mut failures = Vec::with_capacity(jobs.len());

        for job in &jobs {
            let Some(job_number) = job.job_number else {
                tracing::warn!(job = %job.name, "failed job has no job number, skipping");
                continue;
            };

            let details = match self.job_details(&job.project_slug, job_number).await {
                Ok(details) => details,
                Err(e) => {
                    tracing::warn!(job_number, error = %e, "failed to fetch job details, skipping");
                    continue;
                }
            };

            // Every job in a pipeline builds the same commit.
            if commit_sha.is_empty() {
                commit_sha = details.vcs_revision.clone().unwrap_or_default();
                branch = details.branch.clone();
            }

            match self.test_step_output(&details).await {
                Ok(output) => failures.push(Self::to_failure_record(
                    job,
                    job_number,
                    output,
                    &commit_sha,
                    branch.as_deref(),
                )),
                Err(e) => {
                    tracing::warn!(job_number, error = %e, "failed to read test output, skipping");
                }
            }
        }

        Ok(failures)
    }
}
