// src/cli.rs

use clap::Parser;
use std::path::PathBuf;
use svn_lineage::Revision;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Repository root URL (overrides the config file)
    #[arg(short, long, conflicts_with = "history")]
    pub repo: Option<String>,

    /// JSON history dump to analyze instead of a live repository
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory to write one plan per owner into; plans go to stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of workers, which bounds concurrent repository queries
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Revision to analyze
    #[arg(long, default_value = "HEAD")]
    pub revision: Revision,

    /// Component directory at the repository root (repeatable)
    #[arg(long = "component")]
    pub components: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Log every repository query
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum Format {
    /// Plan documents as JSON
    Json,
    /// Human-readable listing of plans and views
    Summary,
}
