use chrono::{DateTime, Local};

pub const BRANCH_PREFIX: &str = "delete-deactivated-accounts";

/// Timestamp format used in source branch names (second resolution)
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of the timestamp embedded in branch names
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// `delete-deactivated-accounts-<department>-<YYYYmmddHHMMSS>`
pub fn source_branch_name(department: &str, at: &DateTime<Local>) -> String {
    format!("{BRANCH_PREFIX}-{department}-{}", at.format(TIMESTAMP_FORMAT))
}

/// Commit message, also used as the merge request title
pub fn commit_message(department: &str) -> String {
    format!("Delete deactivated accounts in {department} department")
}

pub fn merge_request_description(department: &str) -> String {
    format!(
        "Automatically created MR for deleting deactivated accounts in the {department} department."
    )
}
