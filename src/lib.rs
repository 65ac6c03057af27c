// Offboarding - removes deactivated accounts from the department repository
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod git;
pub mod gitlab;
pub mod lock;
pub mod notify;
pub mod offboarding;
pub mod pipeline;
pub mod telemetry;

// Re-export key types for easy access
pub use config::OffboardingConfig;
pub use git::{FileRemoval, Git2Operations, GitError, GitOperations};
pub use gitlab::{CreatedMergeRequest, GitLabClient, GitLabError, MergeRequest, MergeRequestClient};
pub use notify::{NotificationError, Notifier, SlackClient};
pub use offboarding::{
    BranchResult, BranchStatus, DeletionPlan, DeletionRequest, OffboardingRunner, RunSummary,
    SetupError, WorkflowSettings,
};
pub use pipeline::{PipelineDefinition, PipelineError};
pub use telemetry::{create_department_span, generate_correlation_id, init_telemetry};
