//! Deactivated-account offboarding workflow
//!
//! For every department of a [`DeletionPlan`] the runner branches off the
//! target branch, removes `department/<department>/<user>.yaml` files,
//! commits and pushes the branch, opens a merge request and notifies the
//! department owners.

pub mod errors;
pub mod naming;
pub mod plan;
pub mod results;
pub mod runner;

pub use errors::SetupError;
pub use naming::{source_branch_name, Clock, FixedClock, SystemClock, BRANCH_PREFIX};
pub use plan::{DeletionPlan, DeletionRequest, PlanError};
pub use results::{
    BranchResult, BranchStatus, DepartmentFailure, PlannedDepartment, RunSummary, VcsStage,
};
pub use runner::{OffboardingRunner, WorkflowSettings};
