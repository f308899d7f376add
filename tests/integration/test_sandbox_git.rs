#[path = "../common/mod.rs"]
mod common;

use common::{Harness, ScriptedProbe};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use tracefix::core::config::SandboxConfig;
use tracefix::core::git::{GitRunner, VersionControlSandbox};
use tracefix::core::{Environment, ErrorCategory, Runner};

fn git(path: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a repository with one commit holding everything under `path`.
fn init_git_repo(path: &Path) -> String {
    git(path, &["init"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Tracefix Test"]);
    git(path, &["config", "commit.gpgsign", "false"]);
    if fs::read_dir(path).unwrap().count() == 1 {
        fs::write(path.join("README"), "fixture\n").unwrap();
    }
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "initial"]);
    git(path, &["symbolic-ref", "--short", "HEAD"])
}

fn local_branches(path: &Path) -> Vec<String> {
    git(path, &["branch", "--format=%(refname:short)"])
        .lines()
        .map(str::to_string)
        .collect()
}

fn sandbox(path: &Path) -> VersionControlSandbox {
    let config = SandboxConfig {
        retry_backoff_ms: 0,
        ..SandboxConfig::default()
    };
    VersionControlSandbox::new(Arc::new(GitRunner::new(path)), &config)
}

#[tokio::test]
async fn test_current_branch_reads_checked_out_branch() {
    let temp_dir = TempDir::new().unwrap();
    let initial = init_git_repo(temp_dir.path());
    let sandbox = sandbox(temp_dir.path());

    assert_eq!(sandbox.current_branch().await.unwrap(), initial);

    git(temp_dir.path(), &["checkout", "-b", "feature/x"]);
    assert_eq!(sandbox.current_branch().await.unwrap(), "feature/x");
}

#[tokio::test]
async fn test_scratch_lifecycle_leaves_no_trace() {
    let temp_dir = TempDir::new().unwrap();
    let initial = init_git_repo(temp_dir.path());
    let sandbox = sandbox(temp_dir.path());

    let scratch = sandbox.scratch_branch("refactor").await.unwrap();
    assert_eq!(scratch, "scratch-refactor-0");
    assert_eq!(sandbox.current_branch().await.unwrap(), scratch);

    fs::write(temp_dir.path().join("README"), "instrumented\n").unwrap();
    sandbox.restore(&initial).await.unwrap();

    assert_eq!(sandbox.current_branch().await.unwrap(), initial);
    assert_eq!(local_branches(temp_dir.path()), vec![initial]);
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("README")).unwrap(),
        "fixture\n"
    );
    assert!(sandbox.scratch_branch_name().is_none());
}

#[tokio::test]
async fn test_restore_without_changes_fails_on_commit() {
    let temp_dir = TempDir::new().unwrap();
    let initial = init_git_repo(temp_dir.path());
    let sandbox = sandbox(temp_dir.path());

    let scratch = sandbox.scratch_branch("refactor").await.unwrap();
    let err = sandbox.restore(&initial).await.unwrap_err();

    assert_eq!(err.category, ErrorCategory::VcsError);
    assert_eq!(
        err.context.get("command").map(String::as_str),
        Some("git commit --no-verify -m done")
    );
    assert_eq!(sandbox.current_branch().await.unwrap(), scratch);

    sandbox.abandon(&initial).await.unwrap();
    assert_eq!(local_branches(temp_dir.path()), vec![initial]);
}

#[tokio::test]
async fn test_existing_scratch_name_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    init_git_repo(temp_dir.path());
    git(temp_dir.path(), &["branch", "scratch-refactor-0"]);
    let sandbox = sandbox(temp_dir.path());

    let scratch = sandbox.scratch_branch("refactor").await.unwrap();

    assert_eq!(scratch, "scratch-refactor-1");
    assert_eq!(sandbox.current_branch().await.unwrap(), "scratch-refactor-1");
}

#[tokio::test]
async fn test_modify_run_returns_to_original_branch_in_real_repo() {
    let harness = Harness::new(ScriptedProbe::new(&[
        ("/a", json!({"x": 1})),
        ("/b", json!({"x": 2})),
    ]));
    let initial = init_git_repo(harness.root());
    let env = Arc::new(
        Environment::builder(harness.root(), harness.config(&["/a", "/b"]))
            .vcs(Arc::new(GitRunner::new(harness.root())))
            .probe(harness.probe.clone())
            .build_runner(harness.build.clone())
            .confirmer(harness.confirmer.clone())
            .observer(harness.observer.clone())
            .registry(harness.registry())
            .build()
            .unwrap(),
    );
    let runner = Runner::new(env);

    let outcome = runner
        .run("template", "disambiguate", &harness.target, "modify")
        .await
        .unwrap();

    assert_eq!(outcome.original_branch.as_deref(), Some(initial.as_str()));
    assert_eq!(
        git(harness.root(), &["symbolic-ref", "--short", "HEAD"]),
        initial
    );
    assert_eq!(local_branches(harness.root()), vec![initial]);
    // Instrumentation lived only on the scratch branch.
    assert_eq!(harness.read_target("index.js"), "export default {};");
    assert_eq!(
        common::entries(&harness.plugin_log),
        vec!["instrument", r#"modify [{"x":1},{"x":2}]"#]
    );
    assert_eq!(git(harness.root(), &["status", "--porcelain"]), "");
}
