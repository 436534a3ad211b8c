// src/record.rs

//! Analysed log entries.
//!
//! A [`RevisionRecord`] describes what one revision did to one path: plain
//! content changes, the path's own creation by copy (its origin), and
//! directories copied in from elsewhere (source copies). Records live in the
//! [`crate::store::RevisionHistoryStore`] arena and point backwards through
//! [`Link`]s.

use crate::config::LayoutConfig;
use crate::error::IntegrityError;
use crate::layout::{classify, PathClass};
use crate::model::{join_path, strip_ancestor, ChangeAction, LogEntry, NodeKind, OwnerId, RecordId, RevisionKey};
use chrono::{DateTime, Utc};

/// Backward link of a record or source copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Not resolved yet
    Pending,
    BasedOn(RecordId),
    /// No older history
    Root,
}

impl Link {
    pub fn is_resolved(self) -> bool {
        self != Link::Pending
    }

    pub fn record(self) -> Option<RecordId> {
        match self {
            Link::BasedOn(id) => Some(id),
            _ => None,
        }
    }
}

/// A directory copied into the analysed path from somewhere else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCopy {
    /// Directory below the analysed path, relative to it
    pub target: String,
    pub source: RevisionKey,
    /// Newest record of the source's own history, filled in by source-dir expansion
    pub based_on: Link,
}

#[derive(Debug, Clone)]
pub struct RevisionRecord {
    /// Owner whose walk first created this record
    pub discovered_by: OwnerId,
    pub key: RevisionKey,
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
    pub message: String,
    pub has_file_changes: bool,
    /// Set when this revision created the path by copying `origin`
    pub origin: Option<RevisionKey>,
    pub origin_hint: Option<PathClass>,
    /// The path was created here without copy history
    pub created: bool,
    pub source_dirs: Vec<SourceCopy>,
    pub based_on: Link,
}

impl RevisionRecord {
    fn new(entry: &LogEntry, path: &str, owner: OwnerId) -> Self {
        Self {
            discovered_by: owner,
            key: RevisionKey::new(path, entry.revision),
            timestamp: entry.timestamp,
            author: entry.author.clone(),
            message: entry.message.clone(),
            has_file_changes: false,
            origin: None,
            origin_hint: None,
            created: false,
            source_dirs: Vec::new(),
            based_on: Link::Pending,
        }
    }

    pub fn revision(&self) -> u64 {
        self.key.revision
    }

    pub fn is_origin(&self) -> bool {
        self.origin.is_some()
    }

    pub fn is_relevant(&self) -> bool {
        self.has_file_changes || self.is_origin() || !self.source_dirs.is_empty()
    }

    /// The record ends its path's history: nothing older belongs to this path
    pub fn is_terminal(&self) -> bool {
        self.created || self.is_origin() || self.key.revision == 0
    }

    fn set_origin(&mut self, origin: RevisionKey, layout: &LayoutConfig) -> Result<(), IntegrityError> {
        if let Some(first) = &self.origin {
            return Err(IntegrityError::DuplicateOrigin {
                key: self.key.clone(),
                first: first.clone(),
                second: origin,
            });
        }
        self.origin_hint = Some(classify(&origin.path, layout));
        self.origin = Some(origin);
        Ok(())
    }

    /// Records a source copy. Identical duplicates merge; a different source for the same target is an error.
    pub fn add_source_copy(&mut self, target: &str, source: RevisionKey) -> Result<(), IntegrityError> {
        if let Some(existing) = self.source_dirs.iter().find(|c| c.target == target) {
            if existing.source == source {
                return Ok(());
            }
            return Err(IntegrityError::ConflictingSourceCopy {
                key: self.key.clone(),
                target: target.to_string(),
                first: existing.source.clone(),
                second: source,
            });
        }
        self.source_dirs.push(SourceCopy {
            target: target.to_string(),
            source,
            based_on: Link::Pending,
        });
        Ok(())
    }
}

/// Analyses what `entry` did to `path`.
pub fn analyze_entry(
    entry: &LogEntry,
    path: &str,
    owner: OwnerId,
    layout: &LayoutConfig,
) -> Result<RevisionRecord, IntegrityError> {
    let mut record = RevisionRecord::new(entry, path, owner);

    for (changed, change) in &entry.changed_paths {
        if changed == path {
            if change.action.creates() {
                match &change.copied_from {
                    Some(copy) => record.set_origin(copy.key(), layout)?,
                    None => record.created = true,
                }
            }
        } else if let Some(relative) = strip_ancestor(changed, path) {
            match (change.kind, &change.copied_from) {
                (NodeKind::File, _) => record.has_file_changes = true,
                (NodeKind::Dir, Some(copy)) => {
                    let from_outside = copy.path != path && strip_ancestor(&copy.path, path).is_none();
                    if from_outside && change.action.creates() {
                        record.add_source_copy(relative, copy.key())?;
                    } else {
                        // moved within the path itself
                        record.has_file_changes = true;
                    }
                }
                (NodeKind::Dir, None) => {
                    if matches!(change.action, ChangeAction::Deleted | ChangeAction::Replaced) {
                        record.has_file_changes = true;
                    }
                }
            }
        } else if let Some(rest) = strip_ancestor(path, changed) {
            if change.action.creates() {
                match &change.copied_from {
                    Some(copy) => {
                        let origin = RevisionKey::new(join_path(&copy.path, rest), copy.revision);
                        record.set_origin(origin, layout)?;
                    }
                    None => record.created = true,
                }
            }
        }
    }
    Ok(record)
}
