use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use super::naming::BRANCH_PREFIX;

/// Department and user names become path components and branch name parts,
/// so they are restricted to one safe component each.
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("name pattern is valid"));

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read deletion plan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON deletion plan: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid TOML deletion plan: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Unsupported deletion plan format for {0} (expected .json or .toml)")]
    UnsupportedFormat(PathBuf),
    #[error("Department '{0}' appears more than once")]
    DuplicateDepartment(String),
    #[error("Invalid department name '{0}'")]
    InvalidDepartment(String),
    #[error("Invalid user name '{user}' in department '{department}'")]
    InvalidUser { department: String, user: String },
}

/// Users of one department whose files should be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRequest {
    pub department: String,
    pub users: Vec<String>,
}

impl DeletionRequest {
    pub fn new(department: impl Into<String>, users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            department: department.into(),
            users: users.into_iter().map(Into::into).collect(),
        }
    }

    /// Path of a user's file relative to the repository root
    pub fn user_file(&self, user: &str) -> PathBuf {
        Path::new("department")
            .join(&self.department)
            .join(format!("{user}.yaml"))
    }

    fn validate(&self) -> Result<(), PlanError> {
        if !NAME_PATTERN.is_match(&self.department) || !forms_valid_branch(&self.department) {
            return Err(PlanError::InvalidDepartment(self.department.clone()));
        }
        if let Some(user) = self.users.iter().find(|u| !NAME_PATTERN.is_match(u)) {
            return Err(PlanError::InvalidUser {
                department: self.department.clone(),
                user: user.clone(),
            });
        }
        Ok(())
    }
}

/// The department is embedded in its source branch name, so it must also obey
/// git's reference name rules (no `..`).
fn forms_valid_branch(department: &str) -> bool {
    git2::Branch::name_is_valid(&format!("{BRANCH_PREFIX}-{department}-0")).unwrap_or(false)
}

/// Ordered department → users mapping driving one offboarding run.
///
/// Departments are processed in the order they appear in the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeletionPlan {
    requests: Vec<DeletionRequest>,
}

impl DeletionPlan {
    pub fn new(requests: Vec<DeletionRequest>) -> Result<Self, PlanError> {
        let mut seen = HashSet::new();
        for request in &requests {
            request.validate()?;
            if !seen.insert(request.department.as_str()) {
                return Err(PlanError::DuplicateDepartment(request.department.clone()));
            }
        }
        Ok(Self { requests })
    }

    /// Parse a JSON object such as `{"eng": ["alice"], "sales": ["bob"]}`
    pub fn from_json(input: &str) -> Result<Self, PlanError> {
        let raw: RawPlan = serde_json::from_str(input)?;
        Self::new(raw.0)
    }

    /// Parse a TOML table such as `eng = ["alice"]`
    pub fn from_toml(input: &str) -> Result<Self, PlanError> {
        let raw: RawPlan = toml::from_str(input)?;
        Self::new(raw.0)
    }

    /// Load a plan file, choosing the parser from its extension
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            Some("toml") => Self::from_toml(&contents),
            _ => Err(PlanError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn requests(&self) -> &[DeletionRequest] {
        &self.requests
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeletionRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.requests.iter().map(|r| r.users.len()).sum()
    }
}

/// Map entries in document order, before validation
struct RawPlan(Vec<DeletionRequest>);

impl<'de> Deserialize<'de> for RawPlan {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PlanVisitor;

        impl<'de> Visitor<'de> for PlanVisitor {
            type Value = RawPlan;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of department names to lists of user names")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut requests = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((department, users)) = map.next_entry::<String, Vec<String>>()? {
                    requests.push(DeletionRequest { department, users });
                }
                Ok(RawPlan(requests))
            }
        }

        deserializer.deserialize_map(PlanVisitor)
    }
}
