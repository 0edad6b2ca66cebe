//! HTTP and file-backed implementations of the collaborator traits.

pub mod circleci;
pub mod github;
pub mod openai;
pub mod report_file;

pub use circleci::CircleCiClient;
pub use github::GitHubClient;
pub use openai::OpenAiBackend;
pub use report_file::ReportFileSource;
