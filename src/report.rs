// src/report.rs

use crate::analyzer::Analysis;
use crate::model::{Owner, OwnerId, OwnerKind};
use crate::plan::ExtractPlan;
use crate::view::ExtractItem;
use chrono::{DateTime, Utc};
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct AnchorDocument {
    pub owner: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewDocument {
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
    pub items: Vec<ExtractItem>,
}

/// Plain structural form of a plan, consumed by the export step
#[derive(Debug, Clone, Serialize)]
pub struct PlanDocument {
    pub owner: String,
    pub kind: OwnerKind,
    pub path: String,
    pub anchor: Option<AnchorDocument>,
    pub views: Vec<ViewDocument>,
}

pub fn plan_document(plan: &ExtractPlan<OwnerId>, owners: &[Owner]) -> PlanDocument {
    let name = |id: &OwnerId| {
        owners
            .get(*id)
            .map_or_else(|| format!("#{id}"), Owner::qualified_name)
    };
    let owner = &owners[*plan.owner()];
    PlanDocument {
        owner: owner.qualified_name(),
        kind: owner.kind,
        path: owner.path.clone(),
        anchor: plan.anchor().map(|a| AnchorDocument {
            owner: name(&a.owner),
            revision: a.revision,
        }),
        views: plan
            .views()
            .iter()
            .map(|v| {
                let view = v.view();
                ViewDocument {
                    revision: view.revision,
                    timestamp: view.timestamp,
                    author: view.author.clone(),
                    message: view.message.clone(),
                    migrated_from: v.migrated_from().map(name),
                    items: view.items().collect(),
                }
            })
            .collect(),
    }
}

pub fn documents(analysis: &Analysis) -> Vec<PlanDocument> {
    analysis
        .plans
        .iter()
        .map(|plan| plan_document(plan, &analysis.owners))
        .collect()
}

fn file_name(owner: &str) -> String {
    format!("{}.json", owner.replace('/', "__"))
}

/// Writes one `<owner>.json` per plan into `dir`
pub fn write_documents(dir: &Path, documents: &[PlanDocument], show_progress: bool) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let bar = if show_progress {
        let bar = ProgressBar::new(documents.len() as u64);
        bar.set_message("Writing plans");
        bar
    } else {
        ProgressBar::hidden()
    };

    documents
        .par_iter()
        .progress_with(bar)
        .try_for_each(|document| {
            let file = fs::File::create(dir.join(file_name(&document.owner)))?;
            let mut writer = io::BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, document)?;
            writer.flush()
        })
}

pub fn write_json<W: Write>(out: W, documents: &[PlanDocument]) -> io::Result<()> {
    serde_json::to_writer_pretty(out, documents)?;
    Ok(())
}

pub fn write_summary<W: Write>(mut out: W, analysis: &Analysis) -> io::Result<()> {
    writeln!(
        out,
        "r{}: {} owners, {} plans, {} failures, {} records",
        analysis.revision,
        analysis.owners.len(),
        analysis.plans.len(),
        analysis.failures.len(),
        analysis.records
    )?;
    for document in documents(analysis) {
        let anchor = match &document.anchor {
            Some(a) => format!("anchored at {}@{}", a.owner, a.revision),
            None => "root".to_string(),
        };
        writeln!(
            out,
            "{} {} ({}): {} views, {anchor}",
            document.kind,
            document.owner,
            document.path,
            document.views.len()
        )?;
        for view in &document.views {
            let migrated = view
                .migrated_from
                .as_ref()
                .map(|from| format!(" [from {from}]"))
                .unwrap_or_default();
            writeln!(out, "  r{}{migrated}: {}", view.revision, view.message.lines().next().unwrap_or(""))?;
            for item in &view.items {
                writeln!(
                    out,
                    "    {} <- {}",
                    item.target.as_deref().unwrap_or("."),
                    item.source
                )?;
            }
        }
    }
    for failure in &analysis.failures {
        writeln!(
            out,
            "FAILED {}: {}",
            analysis.owners[failure.owner].qualified_name(),
            failure.error
        )?;
    }
    Ok(())
}
