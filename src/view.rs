// src/view.rs

use crate::error::IntegrityError;
use crate::model::RevisionKey;
use crate::record::RevisionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Where a directory's content comes from: a repository path at a revision
pub type SourceLocation = RevisionKey;

/// One mapping of a view. A `None` target is the root of the owner's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractItem {
    pub target: Option<String>,
    pub source: SourceLocation,
}

/// The directories to materialize to reproduce one revision of an owner's tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractView {
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    pub author: Option<String>,
    pub message: String,
    items: BTreeMap<Option<String>, SourceLocation>,
}

impl ExtractView {
    pub fn new(revision: u64, timestamp: DateTime<Utc>, author: Option<String>, message: String) -> Self {
        Self {
            revision,
            timestamp,
            author,
            message,
            items: BTreeMap::new(),
        }
    }

    /// View whose root is the record's path at the record's revision
    pub fn from_record(record: &RevisionRecord) -> Self {
        let mut view = Self::new(
            record.key.revision,
            record.timestamp,
            record.author.clone(),
            record.message.clone(),
        );
        view.items.insert(None, record.key.clone());
        view
    }

    /// A copy of this view describing another revision, without any mapping at or below `target`
    pub fn retimed_without(&self, record: &RevisionRecord, target: &str) -> Self {
        let mut view = Self::new(
            record.key.revision,
            record.timestamp,
            record.author.clone(),
            record.message.clone(),
        );
        view.items = self
            .items
            .iter()
            .filter(|(t, _)| !t.as_deref().is_some_and(|t| is_at_or_below(t, target)))
            .map(|(t, s)| (t.clone(), s.clone()))
            .collect();
        view
    }

    /// Adds a mapping. Re-adding an identical mapping is a no-op.
    pub fn insert(&mut self, target: Option<String>, source: SourceLocation) -> Result<(), IntegrityError> {
        match self.items.get(&target) {
            Some(existing) if *existing == source => Ok(()),
            Some(existing) => Err(IntegrityError::ConflictingViewItem {
                revision: self.revision,
                target: target.unwrap_or_else(|| "/".to_string()),
                first: existing.clone(),
                second: source,
            }),
            None => {
                self.items.insert(target, source);
                Ok(())
            }
        }
    }

    pub fn root(&self) -> Option<&SourceLocation> {
        self.items.get(&None)
    }

    pub fn source_for(&self, target: &str) -> Option<&SourceLocation> {
        self.items.get(&Some(target.to_string()))
    }

    pub fn items(&self) -> impl Iterator<Item = ExtractItem> + '_ {
        self.items.iter().map(|(target, source)| ExtractItem {
            target: target.clone(),
            source: source.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn references(&self, source: &SourceLocation) -> bool {
        self.items.values().any(|s| s == source)
    }
}

fn is_at_or_below(path: &str, target: &str) -> bool {
    path == target
        || path
            .strip_prefix(target)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(revision: u64) -> ExtractView {
        ExtractView::new(revision, DateTime::<Utc>::default(), None, String::new())
    }

    #[test]
    fn test_insert_merges_identical() {
        let mut v = view(12);
        v.insert(Some("vendor".to_string()), RevisionKey::new("/lib/util", 5)).unwrap();
        v.insert(Some("vendor".to_string()), RevisionKey::new("/lib/util", 5)).unwrap();
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_insert_conflict() {
        let mut v = view(12);
        v.insert(Some("vendor".to_string()), RevisionKey::new("/lib/util", 5)).unwrap();
        let err = v
            .insert(Some("vendor".to_string()), RevisionKey::new("/lib/util", 6))
            .unwrap_err();
        assert!(matches!(err, IntegrityError::ConflictingViewItem { revision: 12, .. }));
    }

    #[test]
    fn test_root_sorts_first() {
        let mut v = view(3);
        v.insert(Some("a".to_string()), RevisionKey::new("/x", 1)).unwrap();
        v.insert(None, RevisionKey::new("/trunk", 3)).unwrap();
        let targets: Vec<Option<String>> = v.items().map(|i| i.target).collect();
        assert_eq!(targets, vec![None, Some("a".to_string())]);
        assert_eq!(v.root(), Some(&RevisionKey::new("/trunk", 3)));
    }

    #[test]
    fn test_is_at_or_below() {
        assert!(is_at_or_below("vendor", "vendor"));
        assert!(is_at_or_below("vendor/sub", "vendor"));
        assert!(!is_at_or_below("vendored", "vendor"));
    }
}
