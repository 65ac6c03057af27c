use chrono::Utc;
use tracing::{error, info, warn, Instrument, Span};

use super::errors::SetupError;
use super::naming::{commit_message, source_branch_name, Clock, SystemClock};
use super::plan::{DeletionPlan, DeletionRequest};
use super::results::{
    BranchResult, BranchStatus, DepartmentFailure, PlannedDepartment, RunSummary, VcsStage,
};
use crate::git::{FileRemoval, GitError, GitOperations};
use crate::gitlab::{MergeRequest, MergeRequestClient};
use crate::notify::{merge_request_message, Notifier, DEFAULT_CHANNEL};
use crate::telemetry;

/// Per-run settings that are not credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Stable branch every source branch starts from and merges into
    pub target_branch: String,
    pub remote: String,
    pub channel: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            target_branch: "master".to_string(),
            remote: "origin".to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

fn vcs_failure(stage: VcsStage) -> impl FnOnce(GitError) -> DepartmentFailure {
    move |err| DepartmentFailure::Vcs {
        stage,
        message: err.to_string(),
    }
}

/// Sequential best-effort sweep over a [`DeletionPlan`].
///
/// Departments share one working tree, so they are processed strictly one at
/// a time and the target branch is checked out again after each of them.
pub struct OffboardingRunner<G, M, N> {
    git: G,
    merge_requests: M,
    notifier: N,
    settings: WorkflowSettings,
    clock: Box<dyn Clock>,
}

impl<G, M, N> OffboardingRunner<G, M, N>
where
    G: GitOperations,
    M: MergeRequestClient,
    N: Notifier,
{
    pub fn new(git: G, merge_requests: M, notifier: N, settings: WorkflowSettings) -> Self {
        Self {
            git,
            merge_requests,
            notifier,
            settings,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Process every department in plan order.
    ///
    /// Only a working tree with uncommitted tracked changes or a failed initial
    /// checkout of the target branch is returned as an error; per-department
    /// failures end up in the summary.
    pub async fn run(&self, plan: &DeletionPlan) -> Result<RunSummary, SetupError> {
        let run_id = telemetry::generate_correlation_id();
        let started_at = Utc::now();
        let target = &self.settings.target_branch;

        info!(
            correlation.id = %run_id,
            target_branch = %target,
            departments = plan.len(),
            users = plan.user_count(),
            "Starting offboarding run"
        );

        let modified = self.git.modified_paths().map_err(SetupError::Repository)?;
        if !modified.is_empty() {
            return Err(SetupError::DirtyWorkingTree { paths: modified });
        }

        self.git
            .checkout_branch(target)
            .map_err(|source| SetupError::TargetCheckout {
                branch: target.clone(),
                source,
            })?;

        let mut results = Vec::with_capacity(plan.len());
        for request in plan.iter() {
            let span = telemetry::create_department_span(&request.department, &run_id);
            let result = self.process_department(request).instrument(span).await;
            results.push(result);
        }

        let summary = RunSummary {
            run_id,
            host: telemetry::host_name(),
            target_branch: target.clone(),
            started_at,
            finished_at: Utc::now(),
            results,
        };

        info!(
            correlation.id = %summary.run_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Offboarding run finished"
        );

        Ok(summary)
    }

    /// Report what a run would do without touching the working tree or remotes
    pub fn preview(&self, plan: &DeletionPlan) -> Result<Vec<PlannedDepartment>, SetupError> {
        let target = &self.settings.target_branch;
        let now = self.clock.now();

        plan.iter()
            .map(|request| -> Result<PlannedDepartment, SetupError> {
                let mut planned = PlannedDepartment {
                    department: request.department.clone(),
                    source_branch: source_branch_name(&request.department, &now),
                    existing_files: Vec::new(),
                    missing_files: Vec::new(),
                };

                for user in &request.users {
                    let relative = request.user_file(user);
                    let exists = self
                        .git
                        .file_exists_on_branch(target, &relative)
                        .map_err(|source| SetupError::TargetLookup {
                            branch: target.clone(),
                            source,
                        })?;
                    let file = relative.display().to_string();
                    if exists {
                        planned.existing_files.push(file);
                    } else {
                        planned.missing_files.push(file);
                    }
                }

                Ok(planned)
            })
            .collect()
    }

    async fn process_department(&self, request: &DeletionRequest) -> BranchResult {
        let department = request.department.as_str();
        let source_branch = source_branch_name(department, &self.clock.now());
        Span::current().record("source_branch", source_branch.as_str());

        let mut result = BranchResult::new(department, &source_branch);

        match self.prepare_branch(request, &source_branch, &mut result) {
            Ok(true) => self.open_merge_request(department, &mut result).await,
            Ok(false) => {
                info!("No user files found, nothing to commit");
                result.status = BranchStatus::Skipped;
            }
            Err(failure) => {
                error!(error = %failure, "Department failed");
                result.fail(failure);
            }
        }

        if let Err(e) = self.git.checkout_branch(&self.settings.target_branch) {
            error!(
                error = %e,
                target_branch = %self.settings.target_branch,
                "Failed to return to target branch"
            );
        }

        if result.status == BranchStatus::Skipped {
            if let Err(e) = self.git.delete_branch(&source_branch) {
                warn!(error = %e, "Failed to delete empty source branch");
            }
        }

        result
    }

    /// Branch, delete, commit and push. `Ok(false)` when nothing was deleted.
    fn prepare_branch(
        &self,
        request: &DeletionRequest,
        source_branch: &str,
        result: &mut BranchResult,
    ) -> Result<bool, DepartmentFailure> {
        self.git
            .create_branch(source_branch, &self.settings.target_branch)
            .map_err(vcs_failure(VcsStage::CreateBranch))?;
        self.git
            .checkout_branch(source_branch)
            .map_err(vcs_failure(VcsStage::CheckoutBranch))?;

        for user in &request.users {
            let relative = request.user_file(user);
            let file = relative.display().to_string();

            match self
                .git
                .remove_file(&relative)
                .map_err(vcs_failure(VcsStage::RemoveFile))?
            {
                FileRemoval::Removed => {
                    info!(path = %file, user = %user, "Deleted user file");
                    result.files_deleted.push(file);
                }
                FileRemoval::Missing => {
                    warn!(path = %file, user = %user, "User file is not tracked");
                    result.files_missing.push(file);
                }
            }
        }

        if result.files_deleted.is_empty() {
            return Ok(false);
        }

        let commit_id = self
            .git
            .commit(&commit_message(&request.department))
            .map_err(vcs_failure(VcsStage::Commit))?;
        info!(commit = %commit_id, files = result.files_deleted.len(), "Committed deletions");
        result.commit_id = Some(commit_id);

        self.git
            .push(&self.settings.remote, source_branch)
            .map_err(vcs_failure(VcsStage::Push))?;
        info!(remote = %self.settings.remote, "Pushed source branch");

        Ok(true)
    }

    async fn open_merge_request(&self, department: &str, result: &mut BranchResult) {
        let request = MergeRequest::for_department(
            department,
            &result.source_branch,
            &self.settings.target_branch,
        );

        let created = match self.merge_requests.create_merge_request(&request).await {
            Ok(created) => created,
            Err(e) => {
                error!(status = ?e.status(), error = %e, "Failed to create merge request");
                result.fail(DepartmentFailure::RemoteApi {
                    status: e.status(),
                    message: e.to_string(),
                });
                return;
            }
        };

        info!(url = %created.web_url, "Merge request created");
        result.status = BranchStatus::Succeeded;
        result.merge_request_url = Some(created.web_url.clone());

        let text = merge_request_message(department, &created.web_url);
        match self
            .notifier
            .post_message(&self.settings.channel, &text)
            .await
        {
            Ok(()) => {
                info!(channel = %self.settings.channel, "Notification sent");
                result.notified = true;
            }
            Err(e) => {
                error!(channel = %self.settings.channel, error = %e, "Failed to send notification");
                result.notification_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::operations::MockGitOperations;
    use crate::gitlab::merge_requests::MockMergeRequestClient;
    use crate::gitlab::{CreatedMergeRequest, GitLabError};
    use crate::notify::{MockNotifier, NotificationError};
    use crate::offboarding::naming::FixedClock;
    use chrono::{Local, TimeZone};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::path::Path;

    const BRANCH: &str = "delete-deactivated-accounts-eng-20240826012000";

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 8, 26, 1, 20, 0).unwrap())
    }

    fn plan(json: &str) -> DeletionPlan {
        DeletionPlan::from_json(json).unwrap()
    }

    fn created(url: &str) -> CreatedMergeRequest {
        CreatedMergeRequest {
            web_url: url.to_string(),
            iid: Some(1),
        }
    }

    fn clean_git() -> MockGitOperations {
        let mut git = MockGitOperations::new();
        git.expect_modified_paths().returning(|| Ok(Vec::new()));
        git
    }

    /// Git double where every operation succeeds and every file exists
    fn permissive_git() -> MockGitOperations {
        let mut git = clean_git();
        git.expect_checkout_branch().returning(|_| Ok(()));
        git.expect_create_branch().returning(|_, _| Ok(()));
        git.expect_remove_file().returning(|_| Ok(FileRemoval::Removed));
        git.expect_commit().returning(|_| Ok("abc123".to_string()));
        git.expect_push().returning(|_, _| Ok(()));
        git
    }

    #[tokio::test]
    async fn test_successful_department_is_notified() {
        let mut git = MockGitOperations::new();
        let mut seq = Sequence::new();
        git.expect_modified_paths()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        git.expect_checkout_branch()
            .with(eq("master"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_create_branch()
            .with(eq(BRANCH), eq("master"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        git.expect_checkout_branch()
            .with(eq(BRANCH))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_remove_file()
            .withf(|p| p == Path::new("department/eng/alice.yaml"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(FileRemoval::Removed));
        git.expect_commit()
            .with(eq("Delete deactivated accounts in eng department"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("abc123".to_string()));
        git.expect_push()
            .with(eq("origin"), eq(BRANCH))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        git.expect_checkout_branch()
            .with(eq("master"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut gitlab = MockMergeRequestClient::new();
        gitlab
            .expect_create_merge_request()
            .withf(|mr| {
                mr.source_branch == BRANCH
                    && mr.target_branch == "master"
                    && mr.title == "Delete deactivated accounts in eng department"
            })
            .times(1)
            .returning(|_| Ok(created("http://x/mr/1")));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_post_message()
            .withf(|channel, text| {
                channel == "chimera-users"
                    && text.contains("http://x/mr/1")
                    && text.contains("@eng-owners")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default())
            .with_clock(clock());
        let summary = runner.run(&plan(r#"{"eng": ["alice"]}"#)).await.unwrap();

        let result = summary.result_for("eng").unwrap();
        assert_eq!(result.status, BranchStatus::Succeeded);
        assert_eq!(result.source_branch, BRANCH);
        assert_eq!(result.files_deleted, vec!["department/eng/alice.yaml"]);
        assert_eq!(result.commit_id.as_deref(), Some("abc123"));
        assert_eq!(result.merge_request_url.as_deref(), Some("http://x/mr/1"));
        assert!(result.notified);
    }

    #[tokio::test]
    async fn test_initial_checkout_failure_is_fatal() {
        let mut git = clean_git();
        git.expect_checkout_branch().times(1).returning(|branch| {
            Err(GitError::BranchNotFound {
                branch: branch.to_string(),
            })
        });
        git.expect_create_branch().never();

        let mut gitlab = MockMergeRequestClient::new();
        gitlab.expect_create_merge_request().never();
        let notifier = MockNotifier::new();

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default());
        let err = runner.run(&plan(r#"{"eng": ["alice"]}"#)).await.unwrap_err();
        assert!(matches!(err, SetupError::TargetCheckout { ref branch, .. } if branch == "master"));
    }

    #[tokio::test]
    async fn test_uncommitted_changes_stop_the_run() {
        let mut git = MockGitOperations::new();
        git.expect_modified_paths()
            .times(1)
            .returning(|| Ok(vec!["department/eng/alice.yaml".to_string()]));
        git.expect_checkout_branch().never();
        git.expect_create_branch().never();

        let runner = OffboardingRunner::new(
            git,
            MockMergeRequestClient::new(),
            MockNotifier::new(),
            WorkflowSettings::default(),
        );
        let err = runner.run(&plan(r#"{"eng": ["alice"]}"#)).await.unwrap_err();
        assert!(
            matches!(err, SetupError::DirtyWorkingTree { ref paths } if paths == &["department/eng/alice.yaml"])
        );
    }

    #[tokio::test]
    async fn test_merge_request_rejection_skips_notification_and_continues() {
        let git = permissive_git();

        let mut gitlab = MockMergeRequestClient::new();
        gitlab
            .expect_create_merge_request()
            .withf(|mr| mr.title.contains(" eng "))
            .times(1)
            .returning(|_| {
                Err(GitLabError::Api {
                    status: 400,
                    body: "{\"message\":\"bad\"}".to_string(),
                })
            });
        gitlab
            .expect_create_merge_request()
            .withf(|mr| mr.title.contains(" sales "))
            .times(1)
            .returning(|_| Ok(created("http://x/mr/2")));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_post_message()
            .withf(|_, text| text.starts_with("@sales-owners"))
            .times(1)
            .returning(|_, _| Ok(()));

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default())
            .with_clock(clock());
        let summary = runner
            .run(&plan(r#"{"eng": ["alice"], "sales": ["bob"]}"#))
            .await
            .unwrap();

        let eng = summary.result_for("eng").unwrap();
        assert_eq!(eng.status, BranchStatus::Failed);
        assert!(!eng.notified);
        assert_eq!(
            eng.failure,
            Some(DepartmentFailure::RemoteApi {
                status: Some(400),
                message: "GitLab API returned HTTP 400: {\"message\":\"bad\"}".to_string(),
            })
        );

        let sales = summary.result_for("sales").unwrap();
        assert_eq!(sales.status, BranchStatus::Succeeded);
        assert!(sales.notified);
    }

    #[tokio::test]
    async fn test_push_failure_recovers_and_continues() {
        let mut git = clean_git();
        git.expect_checkout_branch()
            .with(eq("master"))
            .times(3)
            .returning(|_| Ok(()));
        git.expect_checkout_branch().returning(|_| Ok(()));
        git.expect_create_branch().times(2).returning(|_, _| Ok(()));
        git.expect_remove_file().returning(|_| Ok(FileRemoval::Removed));
        git.expect_commit().returning(|_| Ok("abc123".to_string()));
        git.expect_push()
            .withf(|_, branch| branch.contains("-eng-"))
            .times(1)
            .returning(|_, branch| {
                Err(GitError::PushRejected {
                    branch: branch.to_string(),
                    message: "non-fast-forward".to_string(),
                })
            });
        git.expect_push().times(1).returning(|_, _| Ok(()));

        let mut gitlab = MockMergeRequestClient::new();
        gitlab
            .expect_create_merge_request()
            .times(1)
            .returning(|_| Ok(created("http://x/mr/2")));

        let mut notifier = MockNotifier::new();
        notifier.expect_post_message().times(1).returning(|_, _| Ok(()));

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default())
            .with_clock(clock());
        let summary = runner
            .run(&plan(r#"{"eng": ["alice"], "sales": ["bob"]}"#))
            .await
            .unwrap();

        let eng = summary.result_for("eng").unwrap();
        assert_eq!(eng.status, BranchStatus::Failed);
        assert!(matches!(
            eng.failure,
            Some(DepartmentFailure::Vcs {
                stage: VcsStage::Push,
                ..
            })
        ));
        assert_eq!(summary.result_for("sales").unwrap().status, BranchStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_missing_files_are_not_fatal() {
        let mut git = clean_git();
        git.expect_checkout_branch().returning(|_| Ok(()));
        git.expect_create_branch().returning(|_, _| Ok(()));
        git.expect_remove_file()
            .withf(|p| p.ends_with("ghost.yaml"))
            .returning(|_| Ok(FileRemoval::Missing));
        git.expect_remove_file().returning(|_| Ok(FileRemoval::Removed));
        git.expect_commit().returning(|_| Ok("abc123".to_string()));
        git.expect_push().returning(|_, _| Ok(()));

        let mut gitlab = MockMergeRequestClient::new();
        gitlab
            .expect_create_merge_request()
            .returning(|_| Ok(created("http://x/mr/1")));
        let mut notifier = MockNotifier::new();
        notifier.expect_post_message().returning(|_, _| Ok(()));

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default());
        let summary = runner
            .run(&plan(r#"{"eng": ["ghost", "alice"]}"#))
            .await
            .unwrap();

        let eng = summary.result_for("eng").unwrap();
        assert_eq!(eng.status, BranchStatus::Succeeded);
        assert_eq!(eng.files_missing, vec!["department/eng/ghost.yaml"]);
        assert_eq!(eng.files_deleted, vec!["department/eng/alice.yaml"]);
    }

    #[tokio::test]
    async fn test_department_without_files_is_skipped() {
        let mut git = clean_git();
        git.expect_checkout_branch().returning(|_| Ok(()));
        git.expect_create_branch().times(1).returning(|_, _| Ok(()));
        git.expect_remove_file().returning(|_| Ok(FileRemoval::Missing));
        git.expect_commit().never();
        git.expect_push().never();
        git.expect_delete_branch()
            .with(eq(BRANCH))
            .times(1)
            .returning(|_| Ok(()));

        let mut gitlab = MockMergeRequestClient::new();
        gitlab.expect_create_merge_request().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_post_message().never();

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default())
            .with_clock(clock());
        let summary = runner.run(&plan(r#"{"eng": ["ghost"]}"#)).await.unwrap();

        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.result_for("eng").unwrap().failure, None);
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_success() {
        let git = permissive_git();
        let mut gitlab = MockMergeRequestClient::new();
        gitlab
            .expect_create_merge_request()
            .returning(|_| Ok(created("http://x/mr/1")));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_post_message()
            .times(1)
            .returning(|_, _| Err(NotificationError::Api("channel_not_found".to_string())));

        let runner = OffboardingRunner::new(git, gitlab, notifier, WorkflowSettings::default());
        let summary = runner.run(&plan(r#"{"eng": ["alice"]}"#)).await.unwrap();

        let eng = summary.result_for("eng").unwrap();
        assert_eq!(eng.status, BranchStatus::Succeeded);
        assert!(!eng.notified);
        assert_eq!(
            eng.notification_error.as_deref(),
            Some("Chat API rejected the message: channel_not_found")
        );
    }

    #[test]
    fn test_preview_reads_target_branch_only() {
        let mut git = MockGitOperations::new();
        git.expect_file_exists_on_branch()
            .withf(|branch, path| branch == "master" && path.ends_with("alice.yaml"))
            .returning(|_, _| Ok(true));
        git.expect_file_exists_on_branch().returning(|_, _| Ok(false));
        git.expect_checkout_branch().never();
        git.expect_remove_file().never();

        let runner = OffboardingRunner::new(
            git,
            MockMergeRequestClient::new(),
            MockNotifier::new(),
            WorkflowSettings::default(),
        )
        .with_clock(clock());
        let preview = runner.preview(&plan(r#"{"eng": ["alice", "ghost"]}"#)).unwrap();

        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].source_branch, BRANCH);
        assert_eq!(preview[0].existing_files, vec!["department/eng/alice.yaml"]);
        assert_eq!(preview[0].missing_files, vec!["department/eng/ghost.yaml"]);
    }
}
