// src/lib.rs

//! Revision-ancestry reconstruction and extraction planning for
//! copy-based Subversion repositories.
//!
//! Given the branches and tags of a repository, the analysis walks each one's
//! log backwards, follows the copies it was created from, shares common
//! history between owners, and produces per owner an ordered list of views:
//! which directories to export at which revision to replay its history
//! elsewhere.
//!
//! Data flows one way:
//!
//! log queries ([`source`]) -> records ([`record`], [`store`]) -> chains
//! ([`path`]) -> plans ([`plan`], [`view`]) -> documents ([`report`]).

pub mod analyzer;
pub mod config;
pub mod error;
pub mod layout;
pub mod model;
pub mod path;
pub mod plan;
pub mod record;
pub mod report;
pub mod source;
pub mod store;
pub mod svn;
pub mod view;

pub use analyzer::{analyze, Analysis, AnalysisOptions, OwnerFailure};
pub use config::{Config, LayoutConfig};
pub use error::{AnalysisError, ConfigError, IntegrityError, QueryError, Result};
pub use layout::{classify, discover_owners, PathClass, PathKind};
pub use model::{Owner, OwnerId, OwnerKind, Revision, RevisionKey};
pub use path::{build_path, RevisionPath};
pub use plan::{build_view, Anchor, Claims, ExtractPlan, PlanView};
pub use source::{HistoryBuilder, HistorySource, MemoryHistory};
pub use store::RevisionHistoryStore;
pub use svn::SvnClient;
pub use view::{ExtractItem, ExtractView};
