use anyhow::Result;

use super::Command;
use crate::cli::RunArgs;
use crate::config::OffboardingConfig;
use crate::git::Git2Operations;
use crate::gitlab::GitLabClient;
use crate::lock;
use crate::notify::SlackClient;
use crate::offboarding::{
    BranchStatus, DeletionPlan, OffboardingRunner, PlannedDepartment, RunSummary, SetupError,
    WorkflowSettings,
};

pub struct RunCommand {
    args: RunArgs,
    config: OffboardingConfig,
}

impl RunCommand {
    pub fn new(args: RunArgs, config: OffboardingConfig) -> Self {
        Self { args, config }
    }

    fn load_plan(&self) -> Result<DeletionPlan, SetupError> {
        let plan = match (&self.args.users_file, &self.args.users) {
            (Some(path), _) => DeletionPlan::from_file(path)?,
            (None, Some(inline)) => DeletionPlan::from_json(inline)?,
            (None, None) => DeletionPlan::default(),
        };
        Ok(plan)
    }

    fn settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            target_branch: self.args.target_branch.clone(),
            remote: self.config.git.remote.clone(),
            channel: self.config.slack.channel.clone(),
        }
    }
}

impl Command for RunCommand {
    async fn execute(&self) -> Result<()> {
        let plan = self.load_plan()?;
        if plan.is_empty() {
            tracing::warn!("Deletion plan is empty, nothing to do");
        }

        let git = Git2Operations::new(&self.args.repo_path)
            .map_err(SetupError::Repository)?
            .with_remote(&self.config.git.remote)
            .with_push_token(&self.args.access_token)
            .with_author(&self.config.git.author_name, &self.config.git.author_email);
        let git_dir = git.git_dir().to_path_buf();

        let timeout = self.config.http.timeout();
        let gitlab = GitLabClient::new(
            &self.args.base_url,
            &self.args.project_id,
            &self.args.access_token,
            timeout,
        )
        .map_err(SetupError::from)?;
        let slack = SlackClient::new(&self.config.slack.api_url, &self.args.slack_token, timeout)
            .map_err(SetupError::from)?;

        let runner = OffboardingRunner::new(git, gitlab, slack, self.settings());

        if self.args.dry_run {
            let preview = runner.preview(&plan)?;
            if self.args.json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                print_preview(&self.args.target_branch, &preview);
            }
            return Ok(());
        }

        let mut working_tree_lock = lock::open_lock(&git_dir)?;
        let _guard = lock::try_acquire(&mut working_tree_lock, &git_dir)?;

        let summary = runner.run(&plan).await?;
        if self.args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }

        Ok(())
    }
}

fn print_preview(target_branch: &str, preview: &[PlannedDepartment]) {
    println!("🔍 DRY RUN against '{target_branch}' - no changes will be made");
    println!();
    for planned in preview {
        println!("📂 {} → {}", planned.department, planned.source_branch);
        for file in &planned.existing_files {
            println!("   🗑️  would delete {file}");
        }
        for file in &planned.missing_files {
            println!("   ⚠️  missing {file}");
        }
        if planned.existing_files.is_empty() {
            println!("   ⏭️  nothing to delete, no merge request would be opened");
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "🧹 Offboarding run {} against '{}'",
        summary.run_id, summary.target_branch
    );
    println!();

    for result in &summary.results {
        match result.status {
            BranchStatus::Succeeded => {
                let url = result.merge_request_url.as_deref().unwrap_or_default();
                println!("   ✅ {}: {}", result.department, url);
                if let Some(error) = &result.notification_error {
                    println!("      ⚠️  notification failed: {error}");
                }
            }
            BranchStatus::Failed => {
                let reason = result
                    .failure
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                println!("   ❌ {}: {}", result.department, reason);
            }
            BranchStatus::Skipped => {
                println!("   ⏭️  {}: no user files found", result.department);
            }
        }
        for file in &result.files_missing {
            println!("      ⚠️  missing {file}");
        }
    }

    println!();
    println!(
        "📊 {} succeeded, {} failed, {} skipped",
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    );
}
