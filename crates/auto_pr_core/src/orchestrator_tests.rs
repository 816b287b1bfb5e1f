use super::*;
use crate::config::{Identity, NotificationSettings};
use crate::test_support::{RecordingVersionControl, VcsCall};
use github_client::RetryPolicy;
use secrecy::SecretString;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_json(extra: &str) -> String {
    format!(
        r#"{{
            "github": {{
                "repository": {{ "owner": "acme", "name": "widgets" }},
                "merge": {{ "method": "squash" }}
            }},
            "files": {{ "to_modify": ["README.md", "docs/CHANGELOG.md"] }},
            "coauthor": {{ "name": "Jane Doe", "email": "jane@example.com" }},
            "pull_request": {{
                "title": "Nightly refresh",
                "template_path": "definitely/missing/template.md"
            }}{extra}
        }}"#
    )
}

fn github_client(server: &MockServer) -> GitHubClient {
    GitHubClient::new(
        &server.uri(),
        "acme",
        "widgets",
        SecretString::from("test-token".to_string()),
        RetryPolicy {
            backoff_base: Duration::ZERO,
            ..RetryPolicy::default()
        },
    )
    .unwrap()
}

fn creator(
    server: &MockServer,
    config: AppConfig,
    vcs: Arc<RecordingVersionControl>,
) -> AutoPrCreator {
    let notifier = NotificationDispatcher::new(
        "acme/widgets",
        Some(format!("{}/discord", server.uri())),
        Some(format!("{}/slack", server.uri())),
        NotificationSettings::default(),
    );
    AutoPrCreator::new(config, Arc::new(github_client(server)), vcs, notifier)
}

fn pr_response(number: u64, title: &str, head: &str) -> serde_json::Value {
    json!({
        "number": number,
        "title": title,
        "body": "",
        "html_url": format!("https://github.com/acme/widgets/pull/{number}"),
        "state": "open",
        "draft": false,
        "head": { "ref": head },
        "base": { "ref": "main" },
        "user": { "login": "octocat" }
    })
}

/// Echoes the requested title and head back in a created pull request.
struct EchoPullRequest(u64);

impl wiremock::Respond for EchoPullRequest {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        ResponseTemplate::new(201).set_body_json(pr_response(
            self.0,
            body["title"].as_str().unwrap(),
            body["head"].as_str().unwrap(),
        ))
    }
}

async fn mount_happy_path(server: &MockServer, labels: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(EchoPullRequest(42))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/42/labels"))
        .and(body_partial_json(json!({ "labels": labels })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/pulls/42/merge"))
        .and(body_partial_json(json!({
            "merge_method": "squash",
            "commit_title": "Merge PR #42 (automated)"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "merged": true,
            "message": "Pull Request successfully merged"
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

async fn request_body(server: &MockServer, request_path: &str) -> serde_json::Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| r.url.path() == request_path)
        .unwrap_or_else(|| panic!("no request to {request_path}"));
    serde_json::from_slice(&request.body).unwrap()
}

#[test]
fn test_run_mode_parsing() {
    assert_eq!("single".parse::<RunMode>(), Ok(RunMode::Single));
    assert_eq!("collaborator".parse::<RunMode>(), Ok(RunMode::Collaborator));
    assert!("team".parse::<RunMode>().is_err());
    assert_eq!(RunMode::default(), RunMode::Single);
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        RunOutcome::DryRun {
            branch: "b".to_string()
        }
        .exit_code(),
        0
    );
    assert_eq!(RunOutcome::NothingToDo.exit_code(), 1);
    assert_eq!(
        RunOutcome::Failed(Error::VcsOperation("x".to_string())).exit_code(),
        1
    );
}

#[tokio::test]
async fn test_single_mode_end_to_end() {
    let server = MockServer::start().await;
    mount_happy_path(&server, json!(["automated"])).await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(&config_json("")).unwrap();

    let outcome = creator(&server, config, vcs.clone())
        .run(&RunOptions::default())
        .await;

    let pr = match outcome {
        RunOutcome::Completed { pull_request } => pull_request,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(pr.number, 42);
    assert!(pr.merged);

    let calls = vcs.calls();
    let branch = match &calls[0] {
        VcsCall::CreateBranch(name) => name.clone(),
        other => panic!("expected branch creation first, got {other:?}"),
    };
    assert!(branch.starts_with("auto-pr-"));
    assert_eq!(
        calls[1..],
        [
            VcsCall::ModifyFiles(vec!["README.md".to_string(), "docs/CHANGELOG.md".to_string()]),
            VcsCall::Commit {
                paths: vec![PathBuf::from("README.md"), PathBuf::from("docs/CHANGELOG.md")],
                coauthor: Some(Identity::new("Jane Doe", "jane@example.com")),
            },
            VcsCall::Push(branch.clone()),
        ]
    );

    let create = request_body(&server, "/repos/acme/widgets/pulls").await;
    assert_eq!(create["title"], "Nightly refresh");
    assert_eq!(create["head"], branch.as_str());
    assert_eq!(create["base"], "main");
    let body = create["body"].as_str().unwrap();
    assert!(body.contains(&format!("- **Branch:** {branch}")));
    assert!(!body.contains("{timestamp}"));

    let discord = request_body(&server, "/discord").await;
    assert!(discord["content"]
        .as_str()
        .unwrap()
        .contains("Auto PR Creator - MERGED"));
    assert_eq!(discord["embeds"][0]["color"], 0x2ecc71);
}

#[tokio::test]
async fn test_configured_merge_method_is_ignored_in_favour_of_squash() {
    let server = MockServer::start().await;
    mount_happy_path(&server, json!(["automated"])).await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/pulls/42/merge"))
        .and(body_partial_json(json!({ "merge_method": "rebase" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(
        &config_json("").replace(r#""method": "squash""#, r#""method": "rebase""#),
    )
    .unwrap();
    assert_eq!(config.merge_method(), Some(MergeMethod::Rebase));

    let outcome = creator(&server, config, vcs).run(&RunOptions::default()).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let merge = request_body(&server, "/repos/acme/widgets/pulls/42/merge").await;
    assert_eq!(merge["merge_method"], "squash");
}

#[tokio::test]
async fn test_collaborator_mode_end_to_end() {
    let server = MockServer::start().await;
    mount_happy_path(&server, json!(["automated", "collaborative"])).await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(&config_json(
        r#", "collaboration": { "collaborators": [
            { "name": "Alice", "email": "alice@example.com" },
            { "name": "Bob", "email": "bob@example.com" }
        ] }"#,
    ))
    .unwrap();
    let options = RunOptions {
        mode: RunMode::Collaborator,
        dry_run: false,
        commits_per_collaborator: Some(3),
    };

    let outcome = creator(&server, config, vcs.clone()).run(&options).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let commits = vcs
        .calls()
        .iter()
        .filter(|c| matches!(c, VcsCall::CommitAs { .. }))
        .count();
    assert_eq!(commits, 6);
    assert!(matches!(vcs.calls().last(), Some(VcsCall::Push(b)) if b.starts_with("collab-pr-")));

    let create = request_body(&server, "/repos/acme/widgets/pulls").await;
    assert_eq!(create["title"], "🤝 Collaborative PR with 2 contributors");
    let body = create["body"].as_str().unwrap();
    assert!(body.contains("- Alice\n- Bob\n"));
    assert!(body.contains("**Total commits:** 6"));
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let server = MockServer::start().await;
    Mock::given(path_regex(".*"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(&config_json("")).unwrap();

    for mode in [RunMode::Single, RunMode::Collaborator] {
        let options = RunOptions {
            mode,
            dry_run: true,
            commits_per_collaborator: None,
        };
        let outcome = creator(&server, config.clone(), vcs.clone())
            .run(&options)
            .await;

        assert!(matches!(outcome, RunOutcome::DryRun { .. }));
        assert_eq!(outcome.exit_code(), 0);
    }
    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_empty_file_list_is_nothing_to_do() {
    let server = MockServer::start().await;
    Mock::given(path_regex(".*"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(
        r#"{
            "github": { "repository": { "owner": "acme", "name": "widgets" } },
            "files": { "to_modify": [] }
        }"#,
    )
    .unwrap();

    let outcome = creator(&server, config, vcs.clone())
        .run(&RunOptions::default())
        .await;

    assert!(matches!(outcome, RunOutcome::NothingToDo));
    assert_eq!(outcome.exit_code(), 1);
    assert!(vcs.calls().is_empty());
}

#[tokio::test]
async fn test_push_failure_aborts_and_sends_error_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let vcs = Arc::new(RecordingVersionControl::failing_on("push"));
    let config = AppConfig::from_json(&config_json("")).unwrap();

    let outcome = creator(&server, config, vcs)
        .run(&RunOptions::default())
        .await;

    assert!(matches!(outcome, RunOutcome::Failed(Error::VcsOperation(_))));
    let discord = request_body(&server, "/discord").await;
    let content = discord["content"].as_str().unwrap();
    assert!(content.contains("Auto PR Creator - ERROR"));
    assert!(content.contains("**Type:** `VcsOperationError`"));
    assert!(content.contains("mode=single"));
    let slack = request_body(&server, "/slack").await;
    assert!(slack["text"].as_str().unwrap().contains("push failed"));
}

#[tokio::test]
async fn test_merge_conflict_fails_run_without_merged_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(EchoPullRequest(7))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/7/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/pulls/7/merge"))
        .respond_with(
            ResponseTemplate::new(405)
                .set_body_json(json!({ "message": "Pull Request is not mergeable" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let vcs = Arc::new(RecordingVersionControl::new());
    let config = AppConfig::from_json(&config_json("")).unwrap();

    let outcome = creator(&server, config, vcs)
        .run(&RunOptions::default())
        .await;

    match outcome {
        RunOutcome::Failed(Error::Api(err)) => {
            assert_eq!(err.status(), Some(405));
            assert!(err.to_string().contains("Pull Request is not mergeable"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let discord = request_body(&server, "/discord").await;
    assert!(discord["content"]
        .as_str()
        .unwrap()
        .contains("Auto PR Creator - ERROR"));
}

#[test]
fn test_initialize_requires_token_before_any_request() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, config_json("")).unwrap();
    let resolver = crate::secrets::DotEnvSecretResolver::parse("SLACK_WEBHOOK=https://slack\n");

    let result = AutoPrCreator::initialize(&config_path, &resolver);

    assert!(matches!(result, Err(Error::MissingCredential { .. })));
}

#[test]
fn test_initialize_reports_missing_config() {
    let temp_dir = TempDir::new().unwrap();
    let resolver = crate::secrets::DotEnvSecretResolver::parse("GITHUB_TOKEN=t\n");

    let result = AutoPrCreator::initialize(&temp_dir.path().join("missing.json"), &resolver);

    assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
}

#[test]
fn test_initialize_builds_creator() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, config_json("")).unwrap();
    let resolver = crate::secrets::DotEnvSecretResolver::parse("GITHUB_TOKEN=t\n");

    let creator = AutoPrCreator::initialize(&config_path, &resolver).unwrap();

    assert_eq!(creator.config().repository().full_name(), "acme/widgets");
}
