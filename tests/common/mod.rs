// tests/common/mod.rs

#![allow(dead_code)]

use svn_lineage::{
    analyze, Analysis, AnalysisOptions, ExtractPlan, HistoryBuilder, LayoutConfig, MemoryHistory,
    Owner, OwnerId,
};

/// Commits that only touch `/misc`, used to move the revision counter forward
pub fn filler(mut builder: HistoryBuilder, count: usize) -> HistoryBuilder {
    for _ in 0..count {
        builder = builder.commit("filler", |c| {
            c.modify_file("/misc/notes.txt");
        });
    }
    builder
}

/// Revision 1 of every fixture: standard layout plus a scratch area
pub fn layout(builder: HistoryBuilder) -> HistoryBuilder {
    builder.commit("layout", |c| {
        c.add_dir("/trunk")
            .add_dir("/branches")
            .add_dir("/tags")
            .add_dir("/misc")
            .add_file("/misc/notes.txt")
            .add_file("/trunk/a.txt");
    })
}

pub fn run(history: &MemoryHistory, owners: Vec<Owner>, jobs: usize) -> Analysis {
    let options = AnalysisOptions {
        jobs,
        ..AnalysisOptions::default()
    };
    analyze(history, &LayoutConfig::default(), owners, &options).expect("analysis runs")
}

pub fn plan<'a>(analysis: &'a Analysis, name: &str) -> &'a ExtractPlan<OwnerId> {
    let owner = analysis.owner_named(name).expect("owner exists");
    analysis.plan_for(owner).expect("owner has a plan")
}

pub fn revisions(plan: &ExtractPlan<OwnerId>) -> Vec<u64> {
    plan.views().iter().map(|v| v.revision()).collect()
}
