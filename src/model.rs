// src/model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index of a record inside the history store arena
pub type RecordId = usize;

/// Index of an owner (branch, tag or trunk) in the analysis owner list
pub type OwnerId = usize;

/// A revision as requested by a caller, before it is resolved against the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    Head,
    Number(u64),
}

impl From<u64> for Revision {
    fn from(rev: u64) -> Self {
        Revision::Number(rev)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Head => f.write_str("HEAD"),
            Revision::Number(rev) => write!(f, "{rev}"),
        }
    }
}

impl std::str::FromStr for Revision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("head") {
            return Ok(Revision::Head);
        }
        s.trim_start_matches('r')
            .parse::<u64>()
            .map(Revision::Number)
            .map_err(|_| format!("invalid revision '{s}', expected a number or HEAD"))
    }
}

/// Identity of a path at a resolved revision. The memoization key of the history store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionKey {
    pub path: String,
    pub revision: u64,
}

impl RevisionKey {
    pub fn new(path: impl Into<String>, revision: u64) -> Self {
        Self { path: normalize_path(&path.into()), revision }
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.revision)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "R")]
    Replaced,
}

impl ChangeAction {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(ChangeAction::Added),
            "D" => Some(ChangeAction::Deleted),
            "M" => Some(ChangeAction::Modified),
            "R" => Some(ChangeAction::Replaced),
            _ => None,
        }
    }

    /// Whether the action brings a node into existence at this revision
    pub fn creates(self) -> bool {
        matches!(self, ChangeAction::Added | ChangeAction::Replaced)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFrom {
    pub path: String,
    pub revision: u64,
}

impl CopyFrom {
    pub fn key(&self) -> RevisionKey {
        RevisionKey::new(self.path.clone(), self.revision)
    }
}

/// One changed path reported by a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub kind: NodeKind,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<CopyFrom>,
}

/// A single revision as reported by the version-control log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Repository-absolute path -> change
    pub changed_paths: BTreeMap<String, ChangedPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Trunk,
    Branch,
    Tag,
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OwnerKind::Trunk => "trunk",
            OwnerKind::Branch => "branch",
            OwnerKind::Tag => "tag",
        })
    }
}

/// A branch, tag or trunk whose history is reconstructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub kind: OwnerKind,
    pub path: String,
    pub component: Option<String>,
}

impl Owner {
    pub fn new(name: impl Into<String>, kind: OwnerKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: normalize_path(&path.into()),
            component: None,
        }
    }

    pub fn trunk(path: impl Into<String>) -> Self {
        Self::new("trunk", OwnerKind::Trunk, path)
    }

    pub fn branch(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, OwnerKind::Branch, path)
    }

    pub fn tag(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, OwnerKind::Tag, path)
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Repository path without the leading slash (`core/tags/1.0`), unique
    /// across kinds and components. Used for report file names.
    pub fn qualified_name(&self) -> String {
        match self.path.trim_start_matches('/') {
            "" => self.name.clone(),
            path => path.to_string(),
        }
    }
}

/// Canonical repository path: leading slash, no trailing slash, no empty segments
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Returns the part of `path` below `ancestor`, or `None` if `path` is not strictly below it
pub fn strip_ancestor<'a>(path: &'a str, ancestor: &str) -> Option<&'a str> {
    if ancestor == "/" {
        return path.strip_prefix('/').filter(|rest| !rest.is_empty());
    }
    path.strip_prefix(ancestor)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
}

pub fn join_path(base: &str, relative: &str) -> String {
    normalize_path(&format!("{base}/{relative}"))
}
