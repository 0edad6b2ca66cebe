//! Test Fixer
//!
//! Wires the [`triage`] core to the outside world:
//! - Collaborator traits for the CI provider and the source host
//! - HTTP adapters for CircleCI, GitHub and an OpenAI-compatible chat API
//! - Layered configuration (defaults, TOML file, environment)
//! - The orchestrator that runs one pipeline from failing build to pull request
//!
//! # Usage
//!
//! ```bash
//! # Classify the failures of a pipeline
//! testfixer analyze 5034460f-c7c4-4c43-9457-de07e2029e7b
//!
//! # Propose fixes from a saved report without touching CircleCI
//! testfixer --report failures.json propose local
//!
//! # Propose and open a pull request
//! GITHUB_OWNER=acme GITHUB_REPO=web testfixer fix 5034460f-c7c4-4c43-9457-de07e2029e7b
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod adapters;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod orchestrator;

pub use collaborators::{CollaboratorError, SourceRepository, TestResultSource};
pub use config::{RepositoryTarget, TestFixerConfig};
pub use errors::{OrchestrationError, RetryCategory};
pub use orchestrator::TestFixOrchestrator;
