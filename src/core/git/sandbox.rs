#![allow(clippy::result_large_err)] // Sandbox operations bubble AppError so the runner can annotate them with stage context.

use super::{VcsError, VcsRunner};
use crate::core::config::SandboxConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const COMMIT_MESSAGE: &str = "done";
const ABANDON_MESSAGE: &str = "abandoned";
/// Upper bound for the wait between branch-creation attempts.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Scratch-branch lifecycle over a version-control runner.
///
/// Owns the guid counter used for scratch names, so two sandboxes never share naming state.
/// Only one scratch branch is tracked at a time.
pub struct VersionControlSandbox {
    runner: Arc<dyn VcsRunner>,
    guid: AtomicU64,
    current_scratch: Mutex<Option<String>>,
    max_branch_attempts: u32,
    retry_backoff: Duration,
}

impl VersionControlSandbox {
    pub fn new(runner: Arc<dyn VcsRunner>, config: &SandboxConfig) -> Self {
        Self {
            runner,
            guid: AtomicU64::new(0),
            current_scratch: Mutex::new(None),
            max_branch_attempts: config.max_branch_attempts.max(1),
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Name of the branch checked out right now, read from `git branch`.
    pub async fn current_branch(&self) -> Result<String, AppError> {
        let listing = self.git(&["branch"]).await?;
        listing
            .lines()
            .find(|line| line.starts_with('*'))
            .map(|line| line.get(2..).unwrap_or("").trim_end().to_string())
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::VcsError,
                    "Could not determine the current branch from `git branch`",
                )
                .with_suggestion("Make sure the repository has at least one commit")
            })
    }

    /// Create and check out `scratch-<label>-<guid>`, retrying with fresh names on failure.
    pub async fn scratch_branch(&self, label: &str) -> Result<String, AppError> {
        let mut attempt = 0u32;
        loop {
            let name = self.next_scratch_name(label);
            *self.scratch_slot() = Some(name.clone());

            match self.git(&["checkout", "-b", &name]).await {
                Ok(_) => {
                    tracing::info!(branch = %name, "created scratch branch");
                    return Ok(name);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_branch_attempts {
                        *self.scratch_slot() = None;
                        return Err(AppError::from(err)
                            .with_context("attempts", attempt.to_string())
                            .with_suggestion("Check for a stale .git/index.lock"));
                    }
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        branch = %name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying branch"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Wait after the `attempt`-th failure: doubles each time, capped at [`MAX_RETRY_BACKOFF`].
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .map_or(MAX_RETRY_BACKOFF, |backoff| backoff.min(MAX_RETRY_BACKOFF))
    }

    /// The scratch branch currently alive, if any.
    pub fn scratch_branch_name(&self) -> Option<String> {
        self.scratch_slot().clone()
    }

    /// Stage everything and commit. Fails when there is nothing to commit.
    pub async fn commit(&self) -> Result<(), AppError> {
        self.git(&["add", "."]).await?;
        self.git(&["commit", "--no-verify", "-m", COMMIT_MESSAGE])
            .await?;
        Ok(())
    }

    pub async fn checkout_branch(&self, name: &str) -> Result<(), AppError> {
        self.git(&["checkout", name]).await?;
        tracing::info!(branch = %name, "checked out branch");
        Ok(())
    }

    /// Force-delete the recorded scratch branch. Call only after checking out another branch.
    pub async fn delete_scratch_branch(&self) -> Result<(), AppError> {
        let name = self.scratch_branch_name().ok_or_else(|| {
            AppError::new(ErrorCategory::StateError, "No scratch branch to delete")
        })?;
        self.git(&["branch", "-D", &name]).await?;
        *self.scratch_slot() = None;
        tracing::info!(branch = %name, "deleted scratch branch");
        Ok(())
    }

    /// Seal the scratch branch and return to `original`: commit, checkout, delete.
    pub async fn restore(&self, original: &str) -> Result<(), AppError> {
        self.commit().await?;
        self.checkout_branch(original).await?;
        self.delete_scratch_branch().await
    }

    /// Best-effort recovery after a failed run: capture whatever is in the tree on the
    /// scratch branch, return to `original`, and drop the scratch branch.
    ///
    /// When `original` is already checked out (the failure came after the checkout), only the
    /// delete runs so nothing is staged or committed on the operator's branch.
    pub async fn abandon(&self, original: &str) -> Result<(), AppError> {
        if self.scratch_branch_name().is_none() {
            return Ok(());
        }
        if self.current_branch().await? == original {
            tracing::debug!(branch = %original, "already on original branch");
            return self.delete_scratch_branch().await;
        }
        self.git(&["add", "."]).await?;
        if let Err(err) = self
            .git(&["commit", "--no-verify", "-m", ABANDON_MESSAGE])
            .await
        {
            tracing::debug!(error = %err, "nothing to commit on abandoned scratch branch");
        }
        self.checkout_branch(original).await?;
        self.delete_scratch_branch().await
    }

    fn next_scratch_name(&self, label: &str) -> String {
        let guid = self.guid.fetch_add(1, Ordering::SeqCst);
        format!("scratch-{}-{}", label, guid)
    }

    fn scratch_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.current_scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn git(&self, args: &[&str]) -> Result<String, VcsError> {
        self.runner.run(args).await
    }
}
