// src/source.rs

//! Version-control query boundary.
//!
//! The reconstruction core only ever talks to a [`HistorySource`]. Two
//! implementations exist:
//!
//! - [`crate::svn::SvnClient`] - shells out to the `svn` command-line client
//! - [`MemoryHistory`] - an in-memory history, loadable from a JSON dump
//!
//! Paths are repository-absolute (`/trunk/src`), never URLs.

use crate::error::QueryError;
use crate::model::{
    join_path, normalize_path, strip_ancestor, ChangeAction, ChangedPath, CopyFrom, DirEntry,
    LogEntry, NodeKind, RevisionKey,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Read access to a repository's history.
///
/// Implementations must be usable from several worker threads at once; each
/// worker issues at most one query at a time.
pub trait HistorySource: Send + Sync {
    /// The newest revision in the repository, used to resolve `HEAD`
    fn youngest_revision(&self) -> Result<u64, QueryError>;

    /// Log entries that touch `path`, newest first, restricted to `to..=from`.
    ///
    /// `stop` is called for every entry as it arrives; once it returns `true`
    /// that entry is the last one returned and no further history is fetched.
    fn log_entries(
        &self,
        path: &str,
        from: u64,
        to: u64,
        stop: &mut dyn FnMut(&LogEntry) -> bool,
    ) -> Result<Vec<LogEntry>, QueryError>;

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, QueryError>;
}

type Snapshot = BTreeMap<String, NodeKind>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDump {
    entries: Vec<LogEntry>,
}

/// A complete repository history held in memory.
///
/// The tree at every revision is replayed once on construction so that
/// directory listings and existence checks are cheap. Log queries are counted
/// per start key, which the tests use to check memoization.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Vec<LogEntry>,
    snapshots: BTreeMap<u64, Arc<Snapshot>>,
    queries: Mutex<HashMap<RevisionKey, usize>>,
}

impl MemoryHistory {
    pub fn new(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|e| e.revision);
        let mut snapshots: BTreeMap<u64, Arc<Snapshot>> = BTreeMap::new();
        let mut current = Snapshot::new();
        for entry in &entries {
            apply_entry(&mut current, entry, &snapshots);
            snapshots.insert(entry.revision, Arc::new(current.clone()));
        }
        Self {
            entries,
            snapshots,
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_json<R: Read>(reader: R) -> Result<Self, QueryError> {
        let dump: HistoryDump = serde_json::from_reader(reader)?;
        Ok(Self::new(dump.entries))
    }

    pub fn load(path: &Path) -> Result<Self, QueryError> {
        let file = std::fs::File::open(path)?;
        Self::from_json(std::io::BufReader::new(file))
    }

    pub fn to_json(&self) -> Result<String, QueryError> {
        let dump = HistoryDump {
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&dump)?)
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of log queries issued for `path` starting at `revision`
    pub fn query_count(&self, path: &str, revision: u64) -> usize {
        self.queries
            .lock()
            .get(&RevisionKey::new(path, revision))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_queries(&self) -> usize {
        self.queries.lock().values().sum()
    }

    /// Highest number of log queries issued for any single start key
    pub fn max_query_count(&self) -> usize {
        self.queries.lock().values().copied().max().unwrap_or(0)
    }

    fn snapshot_at(&self, revision: u64) -> Option<&Snapshot> {
        self.snapshots
            .range(..=revision)
            .next_back()
            .map(|(_, snapshot)| snapshot.as_ref())
    }

    fn exists(&self, path: &str, revision: u64) -> bool {
        path == "/" || self.snapshot_at(revision).is_some_and(|s| s.contains_key(path))
    }
}

impl HistorySource for MemoryHistory {
    fn youngest_revision(&self) -> Result<u64, QueryError> {
        Ok(self.entries.last().map_or(0, |e| e.revision))
    }

    fn log_entries(
        &self,
        path: &str,
        from: u64,
        to: u64,
        stop: &mut dyn FnMut(&LogEntry) -> bool,
    ) -> Result<Vec<LogEntry>, QueryError> {
        let path = normalize_path(path);
        *self
            .queries
            .lock()
            .entry(RevisionKey::new(path.clone(), from))
            .or_default() += 1;

        if !self.exists(&path, from) {
            return Err(QueryError::NotFound { path, revision: from });
        }

        let mut result = Vec::new();
        for entry in self.entries.iter().rev() {
            if entry.revision > from || !touches(entry, &path) {
                continue;
            }
            if entry.revision < to {
                break;
            }
            result.push(entry.clone());
            if stop(entry) {
                break;
            }
        }
        Ok(result)
    }

    fn list_directory(&self, path: &str, revision: u64) -> Result<Vec<DirEntry>, QueryError> {
        let path = normalize_path(path);
        let not_found = || QueryError::NotFound {
            path: path.clone(),
            revision,
        };
        let snapshot = self.snapshot_at(revision).ok_or_else(not_found)?;
        if path != "/" && snapshot.get(&path) != Some(&NodeKind::Dir) {
            return Err(not_found());
        }
        Ok(snapshot
            .iter()
            .filter_map(|(node, kind)| {
                strip_ancestor(node, &path)
                    .filter(|rest| !rest.contains('/'))
                    .map(|name| DirEntry {
                        name: name.to_string(),
                        kind: *kind,
                    })
            })
            .collect())
    }
}

/// Whether a log entry belongs to the history of `path`
fn touches(entry: &LogEntry, path: &str) -> bool {
    entry.changed_paths.keys().any(|changed| {
        changed == path
            || strip_ancestor(changed, path).is_some()
            || strip_ancestor(path, changed).is_some()
    })
}

fn remove_subtree(snapshot: &mut Snapshot, path: &str) {
    snapshot.retain(|node, _| node != path && strip_ancestor(node, path).is_none());
}

fn apply_entry(current: &mut Snapshot, entry: &LogEntry, history: &BTreeMap<u64, Arc<Snapshot>>) {
    let mut creations: Vec<(&String, &ChangedPath)> = Vec::new();
    for (path, change) in &entry.changed_paths {
        match change.action {
            ChangeAction::Deleted | ChangeAction::Replaced => remove_subtree(current, path),
            _ => {}
        }
        if change.action.creates() {
            creations.push((path, change));
        }
    }
    // parents before children
    creations.sort_by_key(|(path, _)| path.len());

    for (path, change) in creations {
        current.insert(path.clone(), change.kind);
        let Some(copy) = &change.copied_from else {
            continue;
        };
        let Some((_, source)) = history.range(..=copy.revision).next_back() else {
            continue;
        };
        let copied: Vec<(String, NodeKind)> = source
            .iter()
            .filter_map(|(node, kind)| {
                strip_ancestor(node, &copy.path).map(|rest| (join_path(path, rest), *kind))
            })
            .collect();
        current.extend(copied);
    }
}

/// Builds synthetic histories, one commit at a time, starting at revision 1.
///
/// ```ignore
/// let history = HistoryBuilder::new()
///     .commit("import", |c| {
///         c.add_dir("/trunk").add_file("/trunk/a.txt");
///     })
///     .commit("branch", |c| {
///         c.copy_dir("/branches/b1", "/trunk", 1);
///     })
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct HistoryBuilder {
    entries: Vec<LogEntry>,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(mut self, message: &str, changes: impl FnOnce(&mut CommitBuilder)) -> Self {
        let revision = self.entries.len() as u64 + 1;
        let mut commit = CommitBuilder::default();
        changes(&mut commit);
        self.entries.push(LogEntry {
            revision,
            timestamp: timestamp_for(revision),
            author: Some("builder".to_string()),
            message: message.to_string(),
            changed_paths: commit.changes,
        });
        self
    }

    pub fn build(self) -> MemoryHistory {
        MemoryHistory::new(self.entries)
    }
}

fn timestamp_for(revision: u64) -> DateTime<Utc> {
    let epoch = DateTime::from_timestamp(1_577_836_800, 0).unwrap_or_default();
    epoch + Duration::hours(revision as i64)
}

#[derive(Debug, Default)]
pub struct CommitBuilder {
    changes: BTreeMap<String, ChangedPath>,
}

impl CommitBuilder {
    fn change(
        &mut self,
        path: &str,
        kind: NodeKind,
        action: ChangeAction,
        copied_from: Option<(&str, u64)>,
    ) -> &mut Self {
        self.changes.insert(
            normalize_path(path),
            ChangedPath {
                kind,
                action,
                copied_from: copied_from.map(|(from, revision)| CopyFrom {
                    path: normalize_path(from),
                    revision,
                }),
            },
        );
        self
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.change(path, NodeKind::Dir, ChangeAction::Added, None)
    }

    pub fn add_file(&mut self, path: &str) -> &mut Self {
        self.change(path, NodeKind::File, ChangeAction::Added, None)
    }

    pub fn modify_file(&mut self, path: &str) -> &mut Self {
        self.change(path, NodeKind::File, ChangeAction::Modified, None)
    }

    pub fn modify_dir(&mut self, path: &str) -> &mut Self {
        self.change(path, NodeKind::Dir, ChangeAction::Modified, None)
    }

    pub fn delete(&mut self, path: &str, kind: NodeKind) -> &mut Self {
        self.change(path, kind, ChangeAction::Deleted, None)
    }

    pub fn copy_dir(&mut self, path: &str, from: &str, revision: u64) -> &mut Self {
        self.change(path, NodeKind::Dir, ChangeAction::Added, Some((from, revision)))
    }

    pub fn replace_dir(&mut self, path: &str, from: &str, revision: u64) -> &mut Self {
        self.change(path, NodeKind::Dir, ChangeAction::Replaced, Some((from, revision)))
    }

    pub fn copy_file(&mut self, path: &str, from: &str, revision: u64) -> &mut Self {
        self.change(path, NodeKind::File, ChangeAction::Added, Some((from, revision)))
    }
}
