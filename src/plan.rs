// src/plan.rs

//! Extraction plans.
//!
//! A plan lists, in ascending revision order, the views needed to replay an
//! owner's history. Walking the owner's chain stops at the first record that
//! belongs to another owner; that point becomes the plan's anchor. Source
//! copies are projected onto the views that predate them so that the copied
//! directory's own history is replayed as well.

use crate::error::{IntegrityError, Result};
use crate::model::{join_path, Owner, OwnerId, RecordId, RevisionKey};
use crate::path::RevisionPath;
use crate::record::RevisionRecord;
use crate::store::RevisionHistoryStore;
use crate::view::ExtractView;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor<T> {
    pub owner: T,
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanView<T> {
    Native(ExtractView),
    /// Moved here from another owner's plan
    Migrated { from: T, view: ExtractView },
}

impl<T> PlanView<T> {
    pub fn view(&self) -> &ExtractView {
        match self {
            PlanView::Native(view) | PlanView::Migrated { view, .. } => view,
        }
    }

    fn view_mut(&mut self) -> &mut ExtractView {
        match self {
            PlanView::Native(view) | PlanView::Migrated { view, .. } => view,
        }
    }

    pub fn revision(&self) -> u64 {
        self.view().revision
    }

    pub fn migrated_from(&self) -> Option<&T> {
        match self {
            PlanView::Native(_) => None,
            PlanView::Migrated { from, .. } => Some(from),
        }
    }
}

/// Which owner each record belongs to.
///
/// A record on an owner's own path belongs to that owner. Records on paths no
/// owner lives on go to the first owner, in resolution order, whose chain
/// reaches them.
#[derive(Debug, Default)]
pub struct Claims {
    by_path: HashMap<String, OwnerId>,
    claimed: HashMap<RecordId, OwnerId>,
}

impl Claims {
    /// `paths` must be in owner order (trunk, branches, tags)
    pub fn resolve<'p>(
        store: &RevisionHistoryStore<'_>,
        owners: &[Owner],
        paths: impl IntoIterator<Item = &'p RevisionPath>,
    ) -> Result<Self> {
        let mut claims = Claims {
            by_path: owners
                .iter()
                .enumerate()
                .map(|(id, owner)| (owner.path.clone(), id))
                .collect(),
            claimed: HashMap::new(),
        };
        for path in paths {
            for id in path.records(store)? {
                let record = store.record(id)?;
                if !claims.by_path.contains_key(&record.key.path) {
                    claims.claimed.entry(id).or_insert(path.owner);
                }
            }
        }
        Ok(claims)
    }

    pub fn owner_of(&self, id: RecordId, record: &RevisionRecord) -> OwnerId {
        self.by_path
            .get(&record.key.path)
            .or_else(|| self.claimed.get(&id))
            .copied()
            .unwrap_or(record.discovered_by)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractPlan<T> {
    owner: T,
    views: Vec<PlanView<T>>,
    anchor: Option<Anchor<T>>,
}

impl<T: Clone> ExtractPlan<T> {
    pub fn new(owner: T) -> Self {
        Self {
            owner,
            views: Vec::new(),
            anchor: None,
        }
    }

    pub fn owner(&self) -> &T {
        &self.owner
    }

    pub fn views(&self) -> &[PlanView<T>] {
        &self.views
    }

    pub fn anchor(&self) -> Option<&Anchor<T>> {
        self.anchor.as_ref()
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn set_anchor(&mut self, owner: T, revision: u64) {
        self.anchor = Some(Anchor { owner, revision });
    }

    pub fn view_at(&self, revision: u64) -> Option<&ExtractView> {
        self.views
            .iter()
            .find(|v| v.revision() == revision)
            .map(PlanView::view)
    }

    /// Inserts after any views with the same or an older revision
    fn insert_view(&mut self, view: PlanView<T>) -> usize {
        let position = self.views.partition_point(|v| v.revision() <= view.revision());
        self.views.insert(position, view);
        position
    }

    /// Moves the `index`-th view into `target`, tagged with the owner it came
    /// from, keeping `target` in revision order. Returns the moved revision.
    pub fn migrate_view(&mut self, index: usize, target: &mut ExtractPlan<T>) -> Option<u64> {
        if index >= self.views.len() {
            return None;
        }
        let (from, view) = match self.views.remove(index) {
            PlanView::Native(view) => (self.owner.clone(), view),
            PlanView::Migrated { from, view } => (from, view),
        };
        let revision = view.revision;
        target.insert_view(PlanView::Migrated { from, view });
        Some(revision)
    }

    pub fn map_owner<U: Clone>(&self, f: impl Fn(&T) -> U) -> ExtractPlan<U> {
        ExtractPlan {
            owner: f(&self.owner),
            views: self
                .views
                .iter()
                .map(|v| match v {
                    PlanView::Native(view) => PlanView::Native(view.clone()),
                    PlanView::Migrated { from, view } => PlanView::Migrated {
                        from: f(from),
                        view: view.clone(),
                    },
                })
                .collect(),
            anchor: self.anchor.as_ref().map(|a| Anchor {
                owner: f(&a.owner),
                revision: a.revision,
            }),
        }
    }

    /// Projects a source copy made at `start_revision` onto the views that
    /// precede it.
    ///
    /// Views in the window get `component` mapped to the copy source (or, for
    /// views older than the copy source, to the newest source record at or
    /// below them). Source records without a view get one, cloned from the
    /// nearest older view. Views at or below `floor` are left alone.
    ///
    /// A synthesized view with no older view to clone carries only the copied
    /// component: it has no root mapping.
    pub fn adjust_view(
        &mut self,
        store: &RevisionHistoryStore<'_>,
        start_revision: u64,
        component: &str,
        source_key: &RevisionKey,
        source_record: Option<RecordId>,
        floor: Option<u64>,
    ) -> Result<()> {
        let timeline: Vec<RevisionRecord> = match source_record {
            Some(id) => store
                .chain(id)?
                .into_iter()
                .map(|id| store.record(id))
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        let in_window = |revision: u64| revision <= start_revision && floor.map_or(true, |f| revision > f);

        for record in &timeline {
            let revision = record.key.revision;
            if !in_window(revision) || self.view_at(revision).is_some() {
                continue;
            }
            let older = self.views.iter().rev().find(|v| v.revision() < revision);
            let view = match older {
                Some(older) => older.view().retimed_without(record, component),
                None => ExtractView::new(
                    revision,
                    record.timestamp,
                    record.author.clone(),
                    record.message.clone(),
                ),
            };
            debug!("synthesizing view r{revision} for {component}");
            self.insert_view(PlanView::Native(view));
        }

        for plan_view in self.views.iter_mut().rev() {
            let revision = plan_view.revision();
            if !in_window(revision) {
                continue;
            }
            let location = if revision >= source_key.revision {
                Some(source_key.clone())
            } else {
                timeline
                    .iter()
                    .find(|r| r.key.revision <= revision)
                    .map(|r| r.key.clone())
            };
            if let Some(location) = location {
                plan_view.view_mut().insert(Some(component.to_string()), location)?;
            }
        }

        // oldest first, so a target copied in again only covers views after its previous copy-in
        let mut introduced: HashMap<String, u64> = HashMap::new();
        for record in timeline.iter().rev() {
            for copy in &record.source_dirs {
                let nested = join_path(component, &copy.target).trim_start_matches('/').to_string();
                let revision = record.key.revision.min(start_revision);
                self.adjust_view(
                    store,
                    revision,
                    &nested,
                    &copy.source,
                    copy.based_on.record(),
                    floor.max(introduced.get(&nested).copied()),
                )?;
                introduced.insert(nested, revision);
            }
        }
        Ok(())
    }
}

/// Builds the plan of `path.owner` from its chain.
///
/// Records are taken newest to oldest until one belongs to a different owner,
/// which becomes the anchor; views are then laid out oldest first and source
/// copies are projected onto them.
pub fn build_view(
    store: &RevisionHistoryStore<'_>,
    path: &RevisionPath,
    claims: &Claims,
) -> Result<ExtractPlan<OwnerId>> {
    let mut plan = ExtractPlan::new(path.owner);
    let mut own: Vec<RevisionRecord> = Vec::new();
    let mut visited = HashSet::new();

    let mut cursor = path.first_record;
    while let Some(id) = cursor {
        let record = store.record(id)?;
        if !visited.insert(id) {
            return Err(IntegrityError::Cycle {
                from: record.key.clone(),
                to: record.key,
            }
            .into());
        }
        let owner = claims.owner_of(id, &record);
        if owner != path.owner {
            debug!("{} anchors on owner {owner} at {}", path.path, record.key);
            plan.set_anchor(owner, record.key.revision);
            break;
        }
        cursor = record.based_on.record();
        own.push(record);
    }
    own.reverse();

    for record in &own {
        plan.insert_view(PlanView::Native(ExtractView::from_record(record)));
    }

    let anchor_floor = plan.anchor().map(|a| a.revision);
    let mut introduced: HashMap<&str, u64> = HashMap::new();
    for record in &own {
        for copy in &record.source_dirs {
            let floor = anchor_floor.max(introduced.get(copy.target.as_str()).copied());
            plan.adjust_view(
                store,
                record.key.revision,
                &copy.target,
                &copy.source,
                copy.based_on.record(),
                floor,
            )?;
            introduced.insert(copy.target.as_str(), record.key.revision);
        }
    }
    Ok(plan)
}
