use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "offboarding")]
#[command(about = "Remove deactivated accounts from the department repository")]
#[command(long_about = "Deletes department/<department>/<user>.yaml for every deactivated user, \
                       pushes one branch per department, opens a GitLab merge request for it \
                       and notifies the department owners on Slack.")]
pub struct Cli {
    /// Settings file (defaults to ./offboarding.toml when present)
    #[arg(long, global = true, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete deactivated accounts and open one merge request per department
    Run(RunArgs),
    /// Print the declaration of the scheduled pipeline that triggers this job
    Pipeline {
        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: OutputFormat,
        /// Pipeline owner recorded in the default arguments
        #[arg(long, default_value = "data-platform")]
        owner: String,
        /// Address notified by the scheduler
        #[arg(long, default_value = "data-platform@example.com")]
        email: String,
    },
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("plan").required(true).args(["users_file", "users"])))]
pub struct RunArgs {
    /// GitLab access token
    #[arg(long, env = "GITLAB_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Base URL of the GitLab API, e.g. https://gitlab.example.com/api/v4
    #[arg(long)]
    pub base_url: String,

    /// Project ID or namespace/project_name
    #[arg(long)]
    pub project_id: String,

    /// The branch to merge into
    #[arg(long, default_value = "master")]
    pub target_branch: String,

    /// Path to the local Git repository
    #[arg(long)]
    pub repo_path: PathBuf,

    /// Slack token for authenticating the Slack API
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: String,

    /// JSON or TOML file mapping departments to deactivated users
    #[arg(long, help = "Department/user map file (.json or .toml)")]
    pub users_file: Option<PathBuf>,

    /// Inline JSON mapping, e.g. '{"eng": ["alice"]}'
    #[arg(long, help = "Department/user map as inline JSON")]
    pub users: Option<String>,

    /// Show what would be deleted without making changes
    #[arg(long, help = "Preview deletions without touching the repository or remotes")]
    pub dry_run: bool,

    /// Print the result as JSON instead of a human readable report
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Toml,
    Json,
}
