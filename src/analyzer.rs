// src/analyzer.rs

use crate::config::{LayoutConfig, DEFAULT_JOBS};
use crate::error::{AnalysisError, Result};
use crate::model::{Owner, OwnerId, OwnerKind, Revision};
use crate::path::{build_path, RevisionPath};
use crate::plan::{build_view, Claims, ExtractPlan};
use crate::source::HistorySource;
use crate::store::RevisionHistoryStore;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Worker threads, and therefore the bound on in-flight repository queries
    pub jobs: usize,
    pub revision: Revision,
    pub show_progress: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            jobs: DEFAULT_JOBS,
            revision: Revision::Head,
            show_progress: false,
        }
    }
}

#[derive(Debug)]
pub struct OwnerFailure {
    pub owner: OwnerId,
    pub error: AnalysisError,
}

/// The complete results of an analysis run
#[derive(Debug)]
pub struct Analysis {
    pub owners: Vec<Owner>,
    pub revision: u64,
    /// One plan per successfully analysed owner, in owner order
    pub plans: Vec<ExtractPlan<OwnerId>>,
    pub failures: Vec<OwnerFailure>,
    /// Number of distinct records the store ended up with
    pub records: usize,
}

impl Analysis {
    pub fn plan_for(&self, owner: OwnerId) -> Option<&ExtractPlan<OwnerId>> {
        self.plans.iter().find(|p| *p.owner() == owner)
    }

    pub fn owner_named(&self, name: &str) -> Option<OwnerId> {
        self.owners.iter().position(|o| o.qualified_name() == name)
    }
}

fn progress_bar(len: usize, message: &'static str, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_message(message);
    bar
}

/// Reconstructs the ancestry of every owner and computes their plans.
///
/// Owners must be in trunk, branches, tags order (as returned by
/// [`crate::layout::discover_owners`]); it decides which owner keeps shared
/// history that lives on no owner's path. Failures are reported per owner;
/// only errors that prevent the run as a whole are returned as `Err`.
pub fn analyze(
    source: &dyn HistorySource,
    layout: &LayoutConfig,
    owners: Vec<Owner>,
    options: &AnalysisOptions,
) -> Result<Analysis> {
    let store = RevisionHistoryStore::new(source, layout.clone());
    let revision = store.resolve_revision(options.revision)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()?;
    info!("Analyzing {} owners at r{revision} with {} workers", owners.len(), options.jobs.max(1));

    // 1. Walk every owner's ancestry
    let bar = progress_bar(owners.len(), "Walking history", options.show_progress);
    let paths: Vec<Result<RevisionPath>> = pool.install(|| {
        owners
            .par_iter()
            .enumerate()
            .progress_with(bar.clone())
            .map(|(id, owner)| build_path(&store, id, &owner.path, Revision::Number(revision)))
            .collect()
    });
    bar.finish_with_message("History walked");

    // 2. Resolve source-directory copies
    let paths: Vec<Result<RevisionPath>> = pool.install(|| {
        paths
            .into_par_iter()
            .map(|path| {
                let path = path?;
                path.expand_source_dirs(&store)?;
                Ok(path)
            })
            .collect()
    });
    info!("Reconstructed {} records", store.len());

    // 3. Plans, anchoring and repair
    let mut failures = Vec::new();
    let mut walked = Vec::new();
    for (owner, path) in paths.into_iter().enumerate() {
        match path {
            Ok(path) => walked.push(path),
            Err(error) => failures.push(OwnerFailure { owner, error }),
        }
    }
    let claims = Claims::resolve(&store, &owners, &walked)?;

    let mut plans: Vec<Option<ExtractPlan<OwnerId>>> = (0..owners.len()).map(|_| None).collect();
    for path in &walked {
        match build_view(&store, path, &claims) {
            Ok(plan) => plans[path.owner] = Some(plan),
            Err(error) => failures.push(OwnerFailure { owner: path.owner, error }),
        }
    }

    for (id, owner) in owners.iter().enumerate() {
        let Some(mut plan) = plans[id].take() else {
            continue;
        };
        if plan.is_anchored() || owner.kind == OwnerKind::Trunk {
            plans[id] = Some(plan);
            continue;
        }
        if owner.kind == OwnerKind::Tag {
            failures.push(OwnerFailure {
                owner: id,
                error: AnalysisError::NotAnchored {
                    owner: owner.qualified_name(),
                },
            });
            continue;
        }
        let trunk_id = owners
            .iter()
            .position(|o| o.kind == OwnerKind::Trunk && o.component == owner.component);
        match trunk_id.filter(|&t| plans[t].is_some()) {
            Some(t) => {
                if let Some(trunk_plan) = plans[t].as_mut() {
                    repair_branch(owner, &mut plan, t, trunk_plan);
                }
            }
            None => warn!("{} is not anchored and has no trunk plan to join", owner.qualified_name()),
        }
        plans[id] = Some(plan);
    }

    failures.sort_by_key(|f| f.owner);

    Ok(Analysis {
        revision,
        plans: plans.into_iter().flatten().collect(),
        failures,
        records: store.len(),
        owners,
    })
}

/// Joins an unanchored branch to its trunk.
///
/// If the branch's earliest view coincides with a trunk view the branch is
/// anchored there. Otherwise the earliest view is migrated into the trunk
/// plan and the branch anchors on it.
fn repair_branch(
    owner: &Owner,
    plan: &mut ExtractPlan<OwnerId>,
    trunk_id: OwnerId,
    trunk: &mut ExtractPlan<OwnerId>,
) {
    let Some(first) = plan.views().first().map(|v| v.revision()) else {
        return;
    };
    if trunk.view_at(first).is_some() {
        info!("{} joins trunk at r{first}", owner.qualified_name());
    } else if let Some(revision) = plan.migrate_view(0, trunk) {
        warn!(
            "{} has independent history; migrating r{revision} into trunk",
            owner.qualified_name()
        );
    }
    plan.set_anchor(trunk_id, first);
}
