use git2::build::CheckoutBuilder;
use git2::{
    Branch, BranchType, Cred, CredentialType, PushOptions, RemoteCallbacks, Repository, Signature,
    StatusOptions,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Repository not found at {path}: {source}")]
    RepositoryNotFound {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
    #[error("Repository at {0} has no working tree")]
    BareRepository(PathBuf),
    #[error("Branch not found: {branch}")]
    BranchNotFound { branch: String },
    #[error("Remote not found: {remote}")]
    RemoteNotFound { remote: String },
    #[error("Push of '{branch}' was rejected: {message}")]
    PushRejected { branch: String, message: String },
    #[error("File system error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),
}

/// Outcome of removing a tracked file from the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRemoval {
    /// The file existed, was deleted and the deletion is staged
    Removed,
    /// Nothing to delete at that path
    Missing,
}

/// Capability interface over the single working tree the offboarding run owns.
///
/// Paths are relative to the repository working directory.
#[cfg_attr(test, mockall::automock)]
pub trait GitOperations {
    /// Check out a branch, discarding uncommitted changes (replaces `git checkout -f`)
    fn checkout_branch(&self, branch: &str) -> Result<(), GitError>;

    /// Create a new local branch pointing at `from` (replaces `git branch <name> <from>`)
    fn create_branch(&self, name: &str, from: &str) -> Result<(), GitError>;

    /// Tracked paths whose index or working-tree state differs from HEAD
    fn modified_paths(&self) -> Result<Vec<String>, GitError>;

    /// Check whether a file is tracked on a branch without checking it out
    fn file_exists_on_branch(&self, branch: &str, relative: &Path) -> Result<bool, GitError>;

    /// Delete a file and stage the deletion (replaces `rm` + `git rm`)
    fn remove_file(&self, relative: &Path) -> Result<FileRemoval, GitError>;

    /// Commit the index on top of HEAD, returning the new commit id
    fn commit(&self, message: &str) -> Result<String, GitError>;

    /// Push a local branch to the same name on the remote (replaces `git push`)
    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Delete a local branch (replaces `git branch -D`)
    fn delete_branch(&self, branch: &str) -> Result<(), GitError>;
}

/// Implementation of GitOperations using git2
pub struct Git2Operations {
    repo: Repository,
    workdir: PathBuf,
    remote: String,
    push_token: Option<String>,
    author_name: String,
    author_email: String,
}

impl Git2Operations {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|source| GitError::RepositoryNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.to_path_buf()))?
            .to_path_buf();

        Ok(Self {
            repo,
            workdir,
            remote: "origin".to_string(),
            push_token: None,
            author_name: "Offboarding Bot".to_string(),
            author_email: "noreply@offboarding.local".to_string(),
        })
    }

    /// Remote used to resolve branches that only exist as `<remote>/<branch>`
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Token offered when the remote asks for HTTPS basic credentials
    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Fallback author used when the repository has no `user.name`/`user.email`
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// The `.git` directory (or the worktree's private git directory)
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    fn get_signature(&self) -> Result<Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now(&self.author_name, &self.author_email)?),
        }
    }

    /// Create a local branch from `<remote>/<branch>` and track it
    fn track_remote_branch(&self, branch: &str) -> Result<Branch<'_>, GitError> {
        let remote_branch_name = format!("{}/{}", self.remote, branch);
        let remote_branch = self
            .repo
            .find_branch(&remote_branch_name, BranchType::Remote)
            .map_err(|_| GitError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        let commit = remote_branch.get().peel_to_commit()?;

        let mut local = self.repo.branch(branch, &commit, false)?;
        local.set_upstream(Some(remote_branch_name.as_str()))?;
        tracing::info!(branch, upstream = %remote_branch_name, "Created local tracking branch");
        Ok(local)
    }

    fn remote_callbacks<'a>(&'a self, attempts: &'a Cell<u32>) -> RemoteCallbacks<'a> {
        let token = self.push_token.as_deref();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            attempts.set(attempts.get() + 1);
            if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(token) = token {
                    return Cred::userpass_plaintext("oauth2", token);
                }
            }

            let username = username_from_url.unwrap_or("git");
            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username).or_else(|_| {
                    Cred::ssh_key(
                        username,
                        None,
                        Path::new(&format!(
                            "{}/.ssh/id_rsa",
                            std::env::var("HOME").unwrap_or_default()
                        )),
                        None,
                    )
                });
            }

            Cred::default()
        });
        callbacks
    }
}

impl GitOperations for Git2Operations {
    fn checkout_branch(&self, branch: &str) -> Result<(), GitError> {
        let local = match self.repo.find_branch(branch, BranchType::Local) {
            Ok(local) => local,
            Err(_) => self.track_remote_branch(branch)?,
        };

        let reference = local.into_reference();
        let refname = reference
            .name()
            .ok_or_else(|| GitError::BranchNotFound {
                branch: branch.to_string(),
            })?
            .to_string();
        let commit = reference.peel_to_commit()?;

        // Update the working tree before moving HEAD so files deleted on the
        // previous branch are restored against the right baseline.
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.repo.set_head(&refname)?;

        Ok(())
    }

    fn create_branch(&self, name: &str, from: &str) -> Result<(), GitError> {
        let from_commit = self
            .repo
            .find_branch(from, BranchType::Local)
            .map_err(|_| GitError::BranchNotFound {
                branch: from.to_string(),
            })?
            .get()
            .peel_to_commit()?;

        self.repo.branch(name, &from_commit, false)?;

        Ok(())
    }

    fn modified_paths(&self) -> Result<Vec<String>, GitError> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(statuses
            .iter()
            .filter(|entry| !entry.status().is_empty())
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect())
    }

    fn file_exists_on_branch(&self, branch: &str, relative: &Path) -> Result<bool, GitError> {
        let found = self
            .repo
            .find_branch(branch, BranchType::Local)
            .or_else(|_| {
                self.repo
                    .find_branch(&format!("{}/{}", self.remote, branch), BranchType::Remote)
            })
            .map_err(|_| GitError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        let tree = found.get().peel_to_tree()?;

        match tree.get_path(relative) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_file(&self, relative: &Path) -> Result<FileRemoval, GitError> {
        let full_path = self.workdir.join(relative);
        let mut index = self.repo.index()?;
        // An untracked file has no deletion to stage, so it is left alone
        if index.get_path(relative, 0).is_none() || !full_path.is_file() {
            return Ok(FileRemoval::Missing);
        }

        std::fs::remove_file(&full_path).map_err(|source| GitError::Io {
            path: full_path.clone(),
            source,
        })?;

        index.remove_path(relative)?;
        index.write()?;

        Ok(FileRemoval::Removed)
    }

    fn commit(&self, message: &str) -> Result<String, GitError> {
        let signature = self.get_signature()?;
        let tree_id = self.repo.index()?.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.repo.head()?.peel_to_commit()?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;

        Ok(oid.to_string())
    }

    fn push(&self, remote_name: &str, branch: &str) -> Result<(), GitError> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .map_err(|_| GitError::RemoteNotFound {
                remote: remote_name.to_string(),
            })?;

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let attempts = Cell::new(0);
        let rejection = RefCell::new(None);

        {
            let mut callbacks = self.remote_callbacks(&attempts);
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    *rejection.borrow_mut() = Some(format!("{refname}: {message}"));
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[&refspec], Some(&mut push_options))?;
        }

        if let Some(message) = rejection.into_inner() {
            return Err(GitError::PushRejected {
                branch: branch.to_string(),
                message,
            });
        }

        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<(), GitError> {
        let mut local = self
            .repo
            .find_branch(branch, BranchType::Local)
            .map_err(|_| GitError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        local.delete()?;
        Ok(())
    }
}
