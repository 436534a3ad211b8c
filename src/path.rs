// src/path.rs

//! Backward-linked ancestry chains, one per owner.
//!
//! [`build_path`] walks a path's history newest to oldest and jumps to the
//! copy source whenever it reaches the path's origin. Source copies found on
//! the way are left unresolved; [`RevisionPath::expand_source_dirs`] resolves
//! them in a separate, idempotent pass.

use crate::error::{IntegrityError, Result};
use crate::model::{OwnerId, RecordId, Revision, RevisionKey};
use crate::record::Link;
use crate::store::RevisionHistoryStore;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RevisionPath {
    pub owner: OwnerId,
    pub path: String,
    pub base_revision: u64,
    /// Newest record of the chain
    pub first_record: Option<RecordId>,
    /// Oldest record walked for `path` itself
    pub last_record: Option<RecordId>,
    pub origin: Option<RevisionKey>,
    /// Chain of the origin, present iff `origin` is set
    pub source_path: Option<Box<RevisionPath>>,
}

/// Builds the ancestry chain of `path` as seen from `start`
pub fn build_path(
    store: &RevisionHistoryStore<'_>,
    owner: OwnerId,
    path: &str,
    start: Revision,
) -> Result<RevisionPath> {
    let key = store.resolve(path, start)?;
    build_from(store, owner, key, &mut Vec::new())
}

fn build_from(
    store: &RevisionHistoryStore<'_>,
    owner: OwnerId,
    key: RevisionKey,
    stack: &mut Vec<RevisionKey>,
) -> Result<RevisionPath> {
    if stack.contains(&key) {
        return Err(IntegrityError::Cycle {
            from: stack.last().cloned().unwrap_or_else(|| key.clone()),
            to: key,
        }
        .into());
    }
    stack.push(key.clone());

    let mut result = RevisionPath {
        owner,
        path: key.path.clone(),
        base_revision: key.revision,
        first_record: None,
        last_record: None,
        origin: None,
        source_path: None,
    };

    let mut cursor = Some(key.revision);
    while let Some(revision) = cursor {
        let Some(id) = store.record_for(owner, &RevisionKey::new(key.path.clone(), revision))? else {
            if let Some(last) = result.last_record {
                store.link(last, Link::Root)?;
            }
            break;
        };
        match result.last_record {
            Some(previous) => store.link(previous, Link::BasedOn(id))?,
            None => result.first_record = Some(id),
        }
        result.last_record = Some(id);

        let record = store.record(id)?;
        if let Some(origin) = record.origin {
            result.origin = Some(origin);
            break;
        }
        if record.based_on.is_resolved() {
            debug!("{} reuses the chain below {}", key.path, record.key);
            break;
        }
        if record.is_terminal() {
            store.link(id, Link::Root)?;
            break;
        }
        cursor = record.key.revision.checked_sub(1);
    }

    if let (Some(origin), Some(last)) = (result.origin.clone(), result.last_record) {
        debug!("{} originates from {origin}", key.path);
        let source = build_from(store, owner, origin, stack)?;
        let link = source.first_record.map_or(Link::Root, Link::BasedOn);
        store.link(last, link)?;
        result.source_path = Some(Box::new(source));
    }

    stack.pop();
    Ok(result)
}

impl RevisionPath {
    /// Record ids of the whole chain, newest first, across origin jumps
    pub fn records(&self, store: &RevisionHistoryStore<'_>) -> Result<Vec<RecordId>> {
        match self.first_record {
            Some(first) => store.chain(first),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves every source copy reachable from this chain, including copies
    /// found inside the histories of other copies. Returns how many copies were
    /// resolved by this call; a second call resolves nothing.
    pub fn expand_source_dirs(&self, store: &RevisionHistoryStore<'_>) -> Result<usize> {
        let mut resolved = 0;
        let mut pending: Vec<RecordId> = self.first_record.into_iter().collect();
        let mut visited = HashSet::new();

        while let Some(start) = pending.pop() {
            let mut cursor = Some(start);
            while let Some(id) = cursor {
                if !visited.insert(id) {
                    break;
                }
                let record = store.record(id)?;
                for (index, copy) in record.source_dirs.iter().enumerate() {
                    let link = if copy.based_on.is_resolved() {
                        copy.based_on
                    } else {
                        debug!("expanding {} <- {} in {}", copy.target, copy.source, record.key);
                        let source = build_from(store, self.owner, copy.source.clone(), &mut Vec::new())?;
                        let link = source.first_record.map_or(Link::Root, Link::BasedOn);
                        store.resolve_source_copy(id, index, link)?;
                        resolved += 1;
                        link
                    };
                    if let Some(first) = link.record() {
                        pending.push(first);
                    }
                }
                cursor = record.based_on.record();
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::source::HistoryBuilder;

    #[test]
    fn test_origin_jump() {
        let history = HistoryBuilder::new()
            .commit("import", |c| {
                c.add_dir("/trunk").add_dir("/branches").add_file("/trunk/a.txt");
            })
            .commit("edit", |c| {
                c.modify_file("/trunk/a.txt");
            })
            .commit("branch", |c| {
                c.copy_dir("/branches/B", "/trunk", 2);
            })
            .commit("fix", |c| {
                c.modify_file("/branches/B/a.txt");
            })
            .build();
        let store = RevisionHistoryStore::new(&history, LayoutConfig::default());

        let path = build_path(&store, 1, "/branches/B", Revision::Head).unwrap();
        assert_eq!(path.base_revision, 4);
        let last = store.record(path.last_record.unwrap()).unwrap();
        assert!(last.is_origin());
        assert_eq!(path.origin, Some(RevisionKey::new("/trunk", 2)));

        let source = path.source_path.as_ref().unwrap();
        let source_first = store.record(source.first_record.unwrap()).unwrap();
        assert_eq!(source_first.key, RevisionKey::new("/trunk", 2));

        let revisions: Vec<u64> = path
            .records(&store)
            .unwrap()
            .into_iter()
            .map(|id| store.record(id).unwrap().key.revision)
            .collect();
        assert_eq!(revisions, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_shared_ancestry_is_reused() {
        let history = HistoryBuilder::new()
            .commit("import", |c| {
                c.add_dir("/trunk").add_dir("/tags").add_file("/trunk/a.txt");
            })
            .commit("v1", |c| {
                c.copy_dir("/tags/v1", "/trunk", 1);
            })
            .commit("v2", |c| {
                c.copy_dir("/tags/v2", "/trunk", 1);
            })
            .build();
        let store = RevisionHistoryStore::new(&history, LayoutConfig::default());

        let trunk = build_path(&store, 0, "/trunk", Revision::Head).unwrap();
        let v1 = build_path(&store, 1, "/tags/v1", Revision::Head).unwrap();
        let v2 = build_path(&store, 2, "/tags/v2", Revision::Head).unwrap();

        let trunk_first = trunk.first_record.unwrap();
        assert_eq!(v1.source_path.as_ref().unwrap().first_record, Some(trunk_first));
        assert_eq!(v2.source_path.as_ref().unwrap().first_record, Some(trunk_first));
        assert_eq!(history.query_count("/trunk", 1), 0);
        assert_eq!(store.record(trunk_first).unwrap().discovered_by, 0);
    }

    #[test]
    fn test_expand_source_dirs_is_idempotent() {
        let history = HistoryBuilder::new()
            .commit("lib", |c| {
                c.add_dir("/lib").add_dir("/lib/util").add_file("/lib/util/u.c");
            })
            .commit("trunk", |c| {
                c.add_dir("/trunk").add_file("/trunk/main.c");
            })
            .commit("vendor", |c| {
                c.copy_dir("/trunk/vendor", "/lib/util", 1);
            })
            .build();
        let store = RevisionHistoryStore::new(&history, LayoutConfig::default());
        let trunk = build_path(&store, 0, "/trunk", Revision::Head).unwrap();

        assert_eq!(trunk.expand_source_dirs(&store).unwrap(), 1);
        assert_eq!(trunk.expand_source_dirs(&store).unwrap(), 0);

        let copy_record = store.record(trunk.first_record.unwrap()).unwrap();
        let source = copy_record.source_dirs[0].based_on.record().unwrap();
        assert_eq!(store.record(source).unwrap().key, RevisionKey::new("/lib/util", 1));
    }
}
