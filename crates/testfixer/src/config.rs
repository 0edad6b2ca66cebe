//! Runtime configuration for the test fixer.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (e.g. `GITHUB_TOKEN`, `OPENAI_MODEL`)
//! 2. Values from the TOML file passed with `--config`
//! 3. Built-in defaults (public CircleCI / GitHub / OpenAI endpoints)
//!
//! ## Environment variables
//!
//! | Variable                         | Field                      | Default                          |
//! |----------------------------------|----------------------------|----------------------------------|
//! | `CIRCLE_CI_TOKEN`                | `circleci.token`           | (none)                           |
//! | `CIRCLECI_BASE_URL`              | `circleci.base_url`        | `https://circleci.com/api/v2`    |
//! | `CIRCLECI_V1_BASE_URL`           | `circleci.v1_base_url`     | `https://circleci.com/api/v1.1`  |
//! | `GITHUB_TOKEN`                   | `github.token`             | (none)                           |
//! | `GITHUB_OWNER` / `GITHUB_REPO`   | `github.owner` / `.repo`   | (none)                           |
//! | `GITHUB_BASE_URL`                | `github.base_url`          | `https://api.github.com`         |
//! | `OPENAI_API_KEY` (`OPENAI_TOKEN`)| `openai.api_key`           | (none)                           |
//! | `OPENAI_MODEL`                   | `openai.model`             | `gpt-4`                          |
//! | `OPENAI_BASE_URL`                | `openai.base_url`          | `https://api.openai.com/v1`      |
//! | `TESTFIXER_CONFIDENCE_THRESHOLD` | `confidence_threshold`     | `0.5`                            |
//! | `TESTFIXER_DEFAULT_BRANCH`       | `default_branch`           | `main`                           |
//! | `TESTFIXER_HTTP_TIMEOUT_SECS`    | `http_timeout_secs`        | `120`                            |

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use triage::dispatcher::{DispatchConfig, DEFAULT_CONFIDENCE_THRESHOLD};

use crate::errors::OrchestrationError;

const DEFAULT_CIRCLECI_BASE_URL: &str = "https://circleci.com/api/v2";
const DEFAULT_CIRCLECI_V1_BASE_URL: &str = "https://circleci.com/api/v1.1";
const DEFAULT_GITHUB_BASE_URL: &str = "https://api.github.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

const ENV_CIRCLECI_TOKEN: &str = "CIRCLE_CI_TOKEN";
const ENV_CIRCLECI_BASE_URL: &str = "CIRCLECI_BASE_URL";
const ENV_CIRCLECI_V1_BASE_URL: &str = "CIRCLECI_V1_BASE_URL";
const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const ENV_GITHUB_OWNER: &str = "GITHUB_OWNER";
const ENV_GITHUB_REPO: &str = "GITHUB_REPO";
const ENV_GITHUB_BASE_URL: &str = "GITHUB_BASE_URL";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_OPENAI_TOKEN: &str = "OPENAI_TOKEN";
const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_CONFIDENCE_THRESHOLD: &str = "TESTFIXER_CONFIDENCE_THRESHOLD";
const ENV_DEFAULT_BRANCH: &str = "TESTFIXER_DEFAULT_BRANCH";
const ENV_HTTP_TIMEOUT_SECS: &str = "TESTFIXER_HTTP_TIMEOUT_SECS";

/// CircleCI API access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleCiSettings {
    pub token: Option<String>,
    pub base_url: String,
    pub v1_base_url: String,
}

impl Default for CircleCiSettings {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_CIRCLECI_BASE_URL.to_string(),
            v1_base_url: DEFAULT_CIRCLECI_V1_BASE_URL.to_string(),
        }
    }
}

/// GitHub API access and the repository fixes are published to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub base_url: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            base_url: DEFAULT_GITHUB_BASE_URL.to_string(),
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

/// Owner and name of the repository fixes are read from and published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repo: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestFixerConfig {
    pub circleci: CircleCiSettings,
    pub github: GitHubSettings,
    pub openai: OpenAiSettings,
    /// Minimum classifier confidence before a strategy runs.
    pub confidence_threshold: f64,
    /// Pull-request target when the failing build has no branch.
    pub default_branch: String,
    pub http_timeout_secs: u64,
}

impl Default for TestFixerConfig {
    fn default() -> Self {
        Self {
            circleci: CircleCiSettings::default(),
            github: GitHubSettings::default(),
            openai: OpenAiSettings::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            default_branch: DEFAULT_BRANCH.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl TestFixerConfig {
    /// Defaults, overlaid by `path` (if given), overlaid by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML configuration")
    }

    /// Overlay values from `lookup` (normally `std::env::var`). Blank values
    /// are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_CIRCLECI_TOKEN) {
            self.circleci.token = Some(v);
        }
        if let Some(v) = get(ENV_CIRCLECI_BASE_URL) {
            self.circleci.base_url = v;
        }
        if let Some(v) = get(ENV_CIRCLECI_V1_BASE_URL) {
            self.circleci.v1_base_url = v;
        }
        if let Some(v) = get(ENV_GITHUB_TOKEN) {
            self.github.token = Some(v);
        }
        if let Some(v) = get(ENV_GITHUB_OWNER) {
            self.github.owner = Some(v);
        }
        if let Some(v) = get(ENV_GITHUB_REPO) {
            self.github.repo = Some(v);
        }
        if let Some(v) = get(ENV_GITHUB_BASE_URL) {
            self.github.base_url = v;
        }
        if let Some(v) = get(ENV_OPENAI_API_KEY).or_else(|| get(ENV_OPENAI_TOKEN)) {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_MODEL) {
            self.openai.model = v;
        }
        if let Some(v) = get(ENV_OPENAI_BASE_URL) {
            self.openai.base_url = v;
        }
        if let Some(v) = get(ENV_CONFIDENCE_THRESHOLD) {
            self.confidence_threshold = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CONFIDENCE_THRESHOLD} must be a number, got {v:?}"))?;
        }
        if let Some(v) = get(ENV_DEFAULT_BRANCH) {
            self.default_branch = v;
        }
        if let Some(v) = get(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_HTTP_TIMEOUT_SECS} must be an integer, got {v:?}"))?;
        }
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be greater than zero");
        }
        if self.default_branch.trim().is_empty() {
            bail!("default_branch must not be empty");
        }
        Ok(())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new(self.confidence_threshold)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn require_circleci_token(&self) -> Result<&str, OrchestrationError> {
        require(self.circleci.token.as_deref(), ENV_CIRCLECI_TOKEN)
    }

    pub fn require_github_token(&self) -> Result<&str, OrchestrationError> {
        require(self.github.token.as_deref(), ENV_GITHUB_TOKEN)
    }

    pub fn require_repository(&self) -> Result<RepositoryTarget, OrchestrationError> {
        Ok(RepositoryTarget {
            owner: require(self.github.owner.as_deref(), ENV_GITHUB_OWNER)?.to_string(),
            repo: require(self.github.repo.as_deref(), ENV_GITHUB_REPO)?.to_string(),
        })
    }

    /// The OpenAI key is optional: without it generative strategies report
    /// "AI client not configured" instead of failing the run.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.circleci.token = copy.circleci.token.as_deref().map(mask);
        copy.github.token = copy.github.token.as_deref().map(mask);
        copy.openai.api_key = copy.openai.api_key.as_deref().map(mask);
        copy
    }
}

fn require<'a>(value: Option<&'a str>, var: &str) -> Result<&'a str, OrchestrationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| OrchestrationError::Configuration(format!("{var} is not set")))
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
