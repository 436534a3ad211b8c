// src/error.rs

//! Error taxonomy for ancestry reconstruction.
//!
//! Integrity errors mean the repository history (or an assumption about its
//! layout) is inconsistent. They are fatal for the owner being analysed and
//! are never resolved silently. Query errors come from the version-control
//! client and are propagated without retrying.

use crate::model::RevisionKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("{key}: second origin {second} in the same revision (first was {first})")]
    DuplicateOrigin {
        key: RevisionKey,
        first: RevisionKey,
        second: RevisionKey,
    },

    #[error("{key}: source directory '{target}' copied from both {first} and {second}")]
    ConflictingSourceCopy {
        key: RevisionKey,
        target: String,
        first: RevisionKey,
        second: RevisionKey,
    },

    #[error("view r{revision}: '{target}' mapped to both {first} and {second}")]
    ConflictingViewItem {
        revision: u64,
        target: String,
        first: RevisionKey,
        second: RevisionKey,
    },

    #[error("{from} cannot be based on {to}: ancestry must move to an older revision")]
    Cycle { from: RevisionKey, to: RevisionKey },

    #[error("{key} is already based on {existing}, refusing to relink it to {requested}")]
    Relink {
        key: RevisionKey,
        existing: RevisionKey,
        requested: RevisionKey,
    },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to run svn: {0}")]
    Io(#[from] std::io::Error),

    #[error("svn {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("malformed svn output: {0}")]
    Xml(String),

    #[error("malformed history dump: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path not found: {path}@{revision}")]
    NotFound { path: String, revision: u64 },
}

impl From<quick_xml::Error> for QueryError {
    fn from(e: quick_xml::Error) -> Self {
        QueryError::Xml(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{owner} does not trace back to a branch or trunk")]
    NotAnchored { owner: String },

    #[error("no record with id {0} in the history store")]
    UnknownRecord(usize),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
