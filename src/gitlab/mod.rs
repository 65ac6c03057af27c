pub mod errors;
pub mod merge_requests;
pub mod types;

pub use errors::GitLabError;
pub use merge_requests::{GitLabClient, MergeRequestClient};
pub use types::{CreatedMergeRequest, MergeRequest};
