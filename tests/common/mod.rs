//! Shared fixture: a department repository with a bare `origin`.

#![allow(dead_code)]

use git2::{BranchType, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct DepartmentRepo {
    pub workdir: TempDir,
    pub origin: TempDir,
}

impl DepartmentRepo {
    /// `files` are `(department, user)` pairs committed on `master`
    pub fn new(files: &[(&str, &str)]) -> Self {
        let workdir = TempDir::new().unwrap();
        let origin = TempDir::new().unwrap();
        Repository::init_bare(origin.path()).unwrap();

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(workdir.path(), &opts).unwrap();

        let mut index = repo.index().unwrap();
        fs::write(workdir.path().join("README.md"), "# departments\n").unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        for (department, user) in files {
            let dir = workdir.path().join("department").join(department);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{user}.yaml")), format!("name: {user}\n")).unwrap();
            index
                .add_path(&Path::new("department").join(department).join(format!("{user}.yaml")))
                .unwrap();
        }
        index.write().unwrap();

        let signature = Signature::now("Fixture", "fixture@example.com").unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        repo.commit(Some("HEAD"), &signature, &signature, "Initial commit", &tree, &[])
            .unwrap();

        let mut remote = repo
            .remote("origin", origin.path().to_str().unwrap())
            .unwrap();
        remote
            .push(&["refs/heads/master:refs/heads/master"], None)
            .unwrap();

        Self { workdir, origin }
    }

    pub fn path(&self) -> &Path {
        self.workdir.path()
    }

    pub fn file_path(&self, department: &str, user: &str) -> std::path::PathBuf {
        self.workdir
            .path()
            .join("department")
            .join(department)
            .join(format!("{user}.yaml"))
    }

    /// Branches on `origin` whose name starts with `prefix`
    pub fn origin_branches(&self, prefix: &str) -> Vec<String> {
        let bare = Repository::open_bare(self.origin.path()).unwrap();
        let mut names: Vec<String> = bare
            .branches(Some(BranchType::Local))
            .unwrap()
            .map(|b| b.unwrap().0.name().unwrap().unwrap().to_string())
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        names
    }

    /// Whether `department/<d>/<u>.yaml` is tracked on an `origin` branch
    pub fn origin_has_file(&self, branch: &str, department: &str, user: &str) -> bool {
        let bare = Repository::open_bare(self.origin.path()).unwrap();
        let tree = bare
            .find_branch(branch, BranchType::Local)
            .unwrap()
            .get()
            .peel_to_tree()
            .unwrap();
        let relative = Path::new("department")
            .join(department)
            .join(format!("{user}.yaml"));
        let found = tree.get_path(&relative).is_ok();
        found
    }

    /// Commit message at the tip of an `origin` branch
    pub fn origin_tip_message(&self, branch: &str) -> String {
        let bare = Repository::open_bare(self.origin.path()).unwrap();
        let commit = bare
            .find_branch(branch, BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        commit.message().unwrap().to_string()
    }

    pub fn head_branch(&self) -> String {
        let repo = Repository::open(self.workdir.path()).unwrap();
        let head = repo.head().unwrap();
        head.shorthand().unwrap().to_string()
    }

    pub fn local_branch_exists(&self, name: &str) -> bool {
        let repo = Repository::open(self.workdir.path()).unwrap();
        let exists = repo.find_branch(name, BranchType::Local).is_ok();
        exists
    }
}
