// src/main.rs

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Format};
use std::io;
use std::time::Instant;
use svn_lineage::{
    analyze, discover_owners, report, AnalysisOptions, Config, HistorySource, MemoryHistory,
    Revision, SvnClient,
};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if !args.components.is_empty() {
        config.components = args.components.clone();
    }
    if args.repo.is_some() {
        config.repository = args.repo.clone();
    }
    config.validate()?;

    let source: Box<dyn HistorySource> = match (&args.history, &config.repository) {
        (Some(path), _) => Box::new(
            MemoryHistory::load(path)
                .with_context(|| format!("loading history dump {}", path.display()))?,
        ),
        (None, Some(url)) => Box::new(SvnClient::new(url.clone())),
        (None, None) => bail!("either --repo, a config repository, or --history is required"),
    };

    let start_time = Instant::now();
    let revision = match args.revision {
        Revision::Number(rev) => rev,
        Revision::Head => source.youngest_revision()?,
    };
    let owners = discover_owners(source.as_ref(), &config.layout, &config.components, revision)?;
    info!("Found {} branches, tags and trunks at r{revision}", owners.len());

    let options = AnalysisOptions {
        jobs: config.jobs,
        revision: Revision::Number(revision),
        show_progress: !args.quiet,
    };
    let analysis = analyze(source.as_ref(), &config.layout, owners, &options)?;
    info!(
        "Analysis finished in {:.2?}. {} plans, {} records.",
        start_time.elapsed(),
        analysis.plans.len(),
        analysis.records
    );

    match (args.format, &args.output) {
        (Format::Summary, _) => report::write_summary(io::stdout().lock(), &analysis)?,
        (Format::Json, Some(dir)) => {
            report::write_documents(dir, &report::documents(&analysis), !args.quiet)?;
            info!("Plans written to {}", dir.display());
        }
        (Format::Json, None) => report::write_json(io::stdout().lock(), &report::documents(&analysis))?,
    }

    if !analysis.failures.is_empty() {
        for failure in &analysis.failures {
            error!(
                "{}: {}",
                analysis.owners[failure.owner].qualified_name(),
                failure.error
            );
        }
        bail!("{} owners could not be planned", analysis.failures.len());
    }

    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
