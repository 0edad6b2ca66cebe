//! HTTP adapters exercised against WireMock servers.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use testfixer::adapters::{CircleCiClient, GitHubClient, OpenAiBackend};
use testfixer::{CollaboratorError, SourceRepository, TestResultSource};
use triage::backend::{BackendError, FixBackend, FixRequest};
use triage::{ChangeOperation, FileChange, PullRequestDraft};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

const JEST_LOG: &str = "\
FAIL src/user.test.ts
  ● User › formats the display name

    expect(received).toBe(expected)

    Expected: \"Jane Doe\"
    Received: \"Doe, Jane\"

      at Object.<anonymous> (src/user.test.ts:14:32)";

// ── CircleCI ────────────────────────────────────────────────────────────

fn circleci(server: &MockServer) -> CircleCiClient {
    CircleCiClient::new(
        "circle-token",
        format!("{}/api/v2", server.uri()),
        format!("{}/api/v1.1", server.uri()),
        TIMEOUT,
    )
    .unwrap()
}

async fn mount_workflow(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/pipeline/pipe-1/workflow"))
        .and(header("Circle-Token", "circle-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "wf-1", "name": "build-and-test" }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/workflow/wf-1/job"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "job-ok",
                    "job_number": 100,
                    "name": "lint",
                    "status": "success",
                    "project_slug": "gh/acme/web"
                },
                {
                    "id": "job-failed",
                    "job_number": 101,
                    "name": "test",
                    "status": "failed",
                    "started_at": "2024-03-01T10:00:00Z",
                    "project_slug": "gh/acme/web"
                }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn circleci_collects_failed_job_output() {
    let server = MockServer::start().await;
    mount_workflow(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1.1/project/gh/acme/web/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vcs_revision": "0123456789abcdef",
            "branch": "feature/names",
            "steps": [
                { "name": "Checkout code", "actions": [{ "status": "success" }] },
                {
                    "name": "Run tests",
                    "actions": [{
                        "status": "failed",
                        "output_url": format!("{}/output/101", server.uri())
                    }]
                }
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/output/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "message": "yarn run v1.22.19" },
            { "message": JEST_LOG }
        ])))
        .mount(&server)
        .await;

    let failures = circleci(&server).fetch_failures("pipe-1").await.unwrap();
    assert_eq!(failures.len(), 1);

    let failure = &failures[0];
    assert_eq!(failure.test_file, "src/user.test.ts");
    assert_eq!(failure.test_name, "User › formats the display name");
    assert_eq!(failure.job_id, "job-failed");
    assert_eq!(failure.build_number, 101);
    assert_eq!(failure.commit_sha, "0123456789abcdef");
    assert_eq!(failure.branch.as_deref(), Some("feature/names"));
    assert!(failure.error_message.contains("Expected: \"Jane Doe\""));
    assert!(failure.stack_trace.contains("src/user.test.ts:14:32"));
}

#[tokio::test]
async fn circleci_skips_jobs_without_test_output() {
    let server = MockServer::start().await;
    mount_workflow(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v1.1/project/gh/acme/web/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vcs_revision": "0123456789abcdef",
            "steps": [{ "name": "Build", "actions": [{ "status": "failed" }] }]
        })))
        .mount(&server)
        .await;

    let failures = circleci(&server).fetch_failures("pipe-1").await.unwrap();
    assert!(failures.is_empty());
}

#[tokio::test]
async fn circleci_unknown_pipeline_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/pipeline/missing/workflow"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let err = circleci(&server).fetch_failures("missing").await.unwrap_err();
    assert!(matches!(err, CollaboratorError::NotFound(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn circleci_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/pipeline/pipe-1/workflow"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = circleci(&server).fetch_failures("pipe-1").await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Api { status: 503, .. }));
    assert!(err.is_transient());
}

// ── GitHub ──────────────────────────────────────────────────────────────

fn github(server: &MockServer) -> GitHubClient {
    GitHubClient::new("gh-token", server.uri(), TIMEOUT).unwrap()
}

#[tokio::test]
async fn github_reads_file_at_ref() {
    let server = MockServer::start().await;
    let source = "it('formats', () => {\n  expect(name).toBe('Doe, Jane');\n});\n";
    let encoded = BASE64.encode(source);
    let wrapped = format!("{}\n{}", &encoded[..20], &encoded[20..]);

    Mock::given(method("GET"))
        .and(path("/repos/acme/web/contents/src/user.test.ts"))
        .and(query_param("ref", "0123456"))
        .and(header("Authorization", "Bearer gh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": wrapped,
            "encoding": "base64",
            "sha": "blob-sha"
        })))
        .mount(&server)
        .await;

    let content = github(&server)
        .get_file_content("acme", "web", "src/user.test.ts", Some("0123456"))
        .await
        .unwrap();
    assert_eq!(content, source);
}

#[tokio::test]
async fn github_missing_file_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/web/contents/nope.test.ts"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = github(&server)
        .get_file_content("acme", "web", "nope.test.ts", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::NotFound(_)));
}

#[tokio::test]
async fn github_fetches_commit_diff() {
    let server = MockServer::start().await;
    let diff = "diff --git a/src/user.ts b/src/user.ts\n-  return first;\n+  return last;\n";
    Mock::given(method("GET"))
        .and(path("/repos/acme/web/commits/0123456"))
        .and(header("Accept", "application/vnd.github.v3.diff"))
        .respond_with(ResponseTemplate::new(200).set_body_string(diff))
        .mount(&server)
        .await;

    let fetched = github(&server)
        .get_commit_diff("acme", "web", "0123456")
        .await
        .unwrap();
    assert_eq!(fetched, diff);
}

#[tokio::test]
async fn github_opens_pull_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/web/commits/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sha": "base-head" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/web/git/refs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ref": "refs/heads/x" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/web/contents/src/user.test.ts"))
        .and(query_param("ref", "testfixer/build-101-0123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "",
            "encoding": "base64",
            "sha": "old-blob"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/web/contents/src/user.test.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/web/pulls"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "html_url": "https://github.com/acme/web/pull/12",
            "number": 12
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/web/issues/12/labels"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let draft = PullRequestDraft {
        owner: "acme".into(),
        repo: "web".into(),
        base_branch: "main".into(),
        title: "Fix 1 failing test from build #101".into(),
        description: "## Automated Test Fixes".into(),
        branch_name: "testfixer/build-101-0123456".into(),
        changes: vec![FileChange {
            path: "src/user.test.ts".into(),
            content: "expect(name).toBe('Jane Doe');\n".into(),
            operation: ChangeOperation::Update,
        }],
        commit_message: "fix(tests): automated fixes for build #101".into(),
        labels: vec!["automated-fix".into(), "tests".into()],
    };

    // Label failures are tolerated.
    let created = github(&server).create_pull_request(&draft).await.unwrap();
    assert_eq!(created.number, 12);
    assert_eq!(created.url, "https://github.com/acme/web/pull/12");
    assert_eq!(created.branch_name, "testfixer/build-101-0123456");
    assert_eq!(created.files_changed, 1);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.url.path() == "/repos/acme/web/contents/src/user.test.ts" && !r.body.is_empty())
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body["sha"], "old-blob");
    assert_eq!(body["branch"], "testfixer/build-101-0123456");
    assert_eq!(
        body["content"],
        BASE64.encode("expect(name).toBe('Jane Doe');\n")
    );

    let refs = requests
        .iter()
        .find(|r| r.url.path() == "/repos/acme/web/git/refs")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&refs.body).unwrap();
    assert_eq!(body["ref"], "refs/heads/testfixer/build-101-0123456");
    assert_eq!(body["sha"], "base-head");
}

// ── OpenAI ──────────────────────────────────────────────────────────────

fn fix_request() -> FixRequest {
    FixRequest {
        test_file: "src/user.test.ts".into(),
        file_content: "expect(name).toBe('Doe, Jane');".into(),
        error_message: "Expected: \"Jane Doe\"\nReceived: \"Doe, Jane\"".into(),
        stack_trace: "at Object.<anonymous> (src/user.test.ts:14:32)".into(),
        code_diff: None,
    }
}

fn openai(server: &MockServer) -> OpenAiBackend {
    OpenAiBackend::new("sk-test", "gpt-4", server.uri(), TIMEOUT).unwrap()
}

#[tokio::test]
async fn openai_parses_fenced_fix() {
    let server = MockServer::start().await;
    let content = "FIXED_CODE:\n```typescript\nexpect(name).toBe('Jane Doe');\n```\n\nEXPLANATION:\nThe formatter now puts the first name first.";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 200, "completion_tokens": 40, "total_tokens": 240 }
        })))
        .mount(&server)
        .await;

    let backend = openai(&server);
    assert_eq!(backend.model_name(), "gpt-4");

    let fix = backend.generate_test_fix(&fix_request()).await.unwrap();
    assert_eq!(fix.fixed_code, "expect(name).toBe('Jane Doe');");
    assert_eq!(fix.explanation, "The formatter now puts the first name first.");
    assert_eq!(fix.tokens_used, 240);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "gpt-4");
    assert_eq!(body["max_tokens"], 3000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("src/user.test.ts"));
}

#[tokio::test]
async fn openai_rate_limit_is_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let err = openai(&server)
        .generate_test_fix(&fix_request())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::RateLimited));
    assert!(err.is_transient());
}

#[tokio::test]
async fn openai_api_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = openai(&server)
        .generate_test_fix(&fix_request())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API returned 401: invalid api key");
}

#[tokio::test]
async fn openai_blank_key_is_not_configured() {
    let server = MockServer::start().await;
    let backend = OpenAiBackend::new("  ", "gpt-4", server.uri(), TIMEOUT).unwrap();
    let err = backend.generate_test_fix(&fix_request()).await.unwrap_err();
    assert!(matches!(err, BackendError::NotConfigured));
    assert!(server.received_requests().await.unwrap().is_empty());
}
