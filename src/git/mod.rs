//! Git operations module
//!
//! This module provides a trait-based interface for the git operations the
//! offboarding run needs, backed by libgit2 bindings.

pub mod operations;

pub use operations::{FileRemoval, Git2Operations, GitError, GitOperations};
