// src/store.rs

//! Memoizing registry of analysed revisions, shared by every owner.
//!
//! Records are kept in an arena and addressed by [`RecordId`]; links between
//! them are ids, never references. Each start key gets a slot that is
//! computed at most once: concurrent callers asking for the same key wait on
//! the slot and reuse its result. A record only becomes visible once its log
//! entry has been fully analysed, so a failed walk publishes nothing for the
//! entry that failed.

use crate::config::LayoutConfig;
use crate::error::{AnalysisError, IntegrityError, Result};
use crate::model::{OwnerId, RecordId, Revision, RevisionKey};
use crate::record::{analyze_entry, Link, RevisionRecord};
use crate::source::HistorySource;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type Slot = Arc<Mutex<Option<Option<RecordId>>>>;

pub struct RevisionHistoryStore<'a> {
    source: &'a dyn HistorySource,
    layout: LayoutConfig,
    youngest: Mutex<Option<u64>>,
    records: RwLock<Vec<RevisionRecord>>,
    index: RwLock<HashMap<RevisionKey, RecordId>>,
    slots: Mutex<HashMap<RevisionKey, Slot>>,
}

impl<'a> RevisionHistoryStore<'a> {
    pub fn new(source: &'a dyn HistorySource, layout: LayoutConfig) -> Self {
        Self {
            source,
            layout,
            youngest: Mutex::new(None),
            records: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Resolves `HEAD` to the youngest revision, queried once per store
    pub fn resolve_revision(&self, revision: Revision) -> Result<u64> {
        match revision {
            Revision::Number(rev) => Ok(rev),
            Revision::Head => {
                let mut youngest = self.youngest.lock();
                if let Some(rev) = *youngest {
                    return Ok(rev);
                }
                let rev = self.source.youngest_revision()?;
                *youngest = Some(rev);
                Ok(rev)
            }
        }
    }

    pub fn resolve(&self, path: &str, revision: Revision) -> Result<RevisionKey> {
        Ok(RevisionKey::new(path, self.resolve_revision(revision)?))
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, key: &RevisionKey) -> Option<RecordId> {
        self.index.read().get(key).copied()
    }

    pub fn record(&self, id: RecordId) -> Result<RevisionRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or(AnalysisError::UnknownRecord(id))
    }

    /// The newest relevant record of `key.path` at or below `key.revision`.
    ///
    /// Returns `None` when the path has no relevant history left. The remote
    /// log is queried at most once per key for the lifetime of the store.
    pub fn record_for(&self, owner: OwnerId, key: &RevisionKey) -> Result<Option<RecordId>> {
        if let Some(id) = self.lookup(key) {
            return Ok(Some(id));
        }

        let slot = self.slots.lock().entry(key.clone()).or_default().clone();
        let mut guard = slot.lock();
        if let Some(result) = *guard {
            debug!("reusing scan of {key}");
            return Ok(result);
        }

        let result = self.scan(owner, key)?;
        *guard = Some(result);
        Ok(result)
    }

    fn scan(&self, owner: OwnerId, key: &RevisionKey) -> Result<Option<RecordId>> {
        debug!("querying log of {key}");
        let path = key.path.as_str();
        let entries = self.source.log_entries(path, key.revision, 0, &mut |entry| {
            if self.lookup(&RevisionKey::new(path, entry.revision)).is_some() {
                return true;
            }
            match analyze_entry(entry, path, owner, &self.layout) {
                Ok(record) => record.is_relevant() || record.is_terminal(),
                // surfaced when the entry is analysed again below
                Err(_) => true,
            }
        })?;

        let Some(last) = entries.last() else {
            return Ok(None);
        };
        if let Some(id) = self.lookup(&RevisionKey::new(path, last.revision)) {
            debug!("{key} joins known history at r{}", last.revision);
            return Ok(Some(id));
        }
        let record = analyze_entry(last, path, owner, &self.layout)?;
        if !record.is_relevant() {
            return Ok(None);
        }
        Ok(Some(self.insert(record)))
    }

    /// Publishes a record. A concurrent insert of the same key wins and its id is returned.
    fn insert(&self, record: RevisionRecord) -> RecordId {
        let mut index = self.index.write();
        if let Some(&id) = index.get(&record.key) {
            return id;
        }
        let mut records = self.records.write();
        let id = records.len();
        index.insert(record.key.clone(), id);
        records.push(record);
        id
    }

    fn check_link(records: &[RevisionRecord], from: RecordId, link: Link) -> Result<()> {
        let Link::BasedOn(to) = link else {
            return Ok(());
        };
        let from_record = records.get(from).ok_or(AnalysisError::UnknownRecord(from))?;
        let to_record = records.get(to).ok_or(AnalysisError::UnknownRecord(to))?;
        if to_record.key.revision >= from_record.key.revision {
            return Err(IntegrityError::Cycle {
                from: from_record.key.clone(),
                to: to_record.key.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn relink_error(records: &[RevisionRecord], from: RecordId, existing: Link, requested: Link) -> AnalysisError {
        let key_of = |link: Link| match link {
            Link::BasedOn(id) => records
                .get(id)
                .map(|r| r.key.clone())
                .unwrap_or_else(|| RevisionKey::new("?", 0)),
            _ => RevisionKey::new("/", 0),
        };
        IntegrityError::Relink {
            key: records[from].key.clone(),
            existing: key_of(existing),
            requested: key_of(requested),
        }
        .into()
    }

    /// Sets the backward link of a record. Setting the same link again is a no-op.
    pub fn link(&self, from: RecordId, link: Link) -> Result<()> {
        let mut records = self.records.write();
        Self::check_link(&records, from, link)?;
        let existing = records[from].based_on;
        match existing {
            Link::Pending => {
                records[from].based_on = link;
                Ok(())
            }
            _ if existing == link => Ok(()),
            _ => Err(Self::relink_error(&records, from, existing, link)),
        }
    }

    /// Attaches the resolved history of the `index`-th source copy of a record
    pub fn resolve_source_copy(&self, from: RecordId, index: usize, link: Link) -> Result<()> {
        let mut records = self.records.write();
        Self::check_link(&records, from, link)?;
        let existing = records[from]
            .source_dirs
            .get(index)
            .map(|c| c.based_on)
            .ok_or(AnalysisError::UnknownRecord(from))?;
        match existing {
            Link::Pending => {
                records[from].source_dirs[index].based_on = link;
                Ok(())
            }
            _ if existing == link => Ok(()),
            _ => Err(Self::relink_error(&records, from, existing, link)),
        }
    }

    /// Follows `based_on` links from `start`, newest first
    pub fn chain(&self, start: RecordId) -> Result<Vec<RecordId>> {
        let records = self.records.read();
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let record = records.get(id).ok_or(AnalysisError::UnknownRecord(id))?;
            if !seen.insert(id) {
                return Err(IntegrityError::Cycle {
                    from: record.key.clone(),
                    to: record.key.clone(),
                }
                .into());
            }
            chain.push(id);
            cursor = record.based_on.record();
        }
        Ok(chain)
    }
}
