// src/layout.rs

use crate::config::LayoutConfig;
use crate::error::QueryError;
use crate::model::{join_path, normalize_path, NodeKind, Owner, OwnerKind};
use crate::source::HistorySource;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Trunk,
    Branch,
    Tag,
    Unknown,
}

/// Structural classification of a repository path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathClass {
    pub kind: PathKind,
    pub component: Option<String>,
    /// Branch or tag name
    pub name: Option<String>,
    /// The trunk, branch or tag directory the path lives in
    pub root: Option<String>,
}

impl PathClass {
    fn unknown(component: Option<String>) -> Self {
        Self {
            kind: PathKind::Unknown,
            component,
            name: None,
            root: None,
        }
    }
}

/// Classify `path` against the directory layout. Pure; no repository access.
///
/// The first segment equal to one of the layout directory names decides the
/// kind; everything before it is the component name.
pub fn classify(path: &str, layout: &LayoutConfig) -> PathClass {
    let path = normalize_path(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for (i, segment) in segments.iter().enumerate() {
        let component = (i > 0).then(|| segments[..i].join("/"));
        let kind = if *segment == layout.trunk {
            PathKind::Trunk
        } else if *segment == layout.branches {
            PathKind::Branch
        } else if *segment == layout.tags {
            PathKind::Tag
        } else {
            continue;
        };

        if kind == PathKind::Trunk {
            return PathClass {
                kind,
                component,
                name: None,
                root: Some(format!("/{}", segments[..=i].join("/"))),
            };
        }
        return match segments.get(i + 1) {
            Some(name) => PathClass {
                kind,
                component,
                name: Some(name.to_string()),
                root: Some(format!("/{}", segments[..=i + 1].join("/"))),
            },
            None => PathClass::unknown(component),
        };
    }
    PathClass::unknown(None)
}

/// Lists trunk, branches and tags of each component at `revision`.
///
/// An empty `components` list means the layout directories sit at the
/// repository root. The result is ordered trunk first, then branches, then
/// tags, alphabetically within each kind.
pub fn discover_owners(
    source: &dyn HistorySource,
    layout: &LayoutConfig,
    components: &[String],
    revision: u64,
) -> Result<Vec<Owner>, QueryError> {
    let roots: Vec<Option<&str>> = if components.is_empty() {
        vec![None]
    } else {
        components.iter().map(|c| Some(c.as_str())).collect()
    };

    let mut owners = Vec::new();
    for component in roots {
        let base = normalize_path(component.unwrap_or("/"));
        let children = source.list_directory(&base, revision)?;
        let has_dir = |name: &str| {
            children
                .iter()
                .any(|e| e.kind == NodeKind::Dir && e.name == name)
        };
        let tag_component = |owner: Owner| match component {
            Some(c) => owner.with_component(c),
            None => owner,
        };

        if has_dir(layout.trunk.as_str()) {
            owners.push(tag_component(Owner::trunk(join_path(&base, &layout.trunk))));
        }
        for (dir, kind) in [(&layout.branches, OwnerKind::Branch), (&layout.tags, OwnerKind::Tag)] {
            if !has_dir(dir.as_str()) {
                continue;
            }
            let container = join_path(&base, dir);
            for entry in source.list_directory(&container, revision)? {
                if entry.kind != NodeKind::Dir {
                    continue;
                }
                let path = join_path(&container, &entry.name);
                owners.push(tag_component(Owner::new(entry.name, kind, path)));
            }
        }
    }

    owners.sort_by(|a, b| {
        (a.kind, &a.component, &a.name).cmp(&(b.kind, &b.component, &b.name))
    });
    debug!("discovered {} owners at r{revision}", owners.len());
    Ok(owners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::HistoryBuilder;

    #[test]
    fn test_classify_root_layout() {
        let layout = LayoutConfig::default();
        let trunk = classify("/trunk/src/main.c", &layout);
        assert_eq!(trunk.kind, PathKind::Trunk);
        assert_eq!(trunk.component, None);
        assert_eq!(trunk.root.as_deref(), Some("/trunk"));

        let branch = classify("/branches/b1/src", &layout);
        assert_eq!(branch.kind, PathKind::Branch);
        assert_eq!(branch.name.as_deref(), Some("b1"));
        assert_eq!(branch.root.as_deref(), Some("/branches/b1"));
    }

    #[test]
    fn test_classify_component_layout() {
        let layout = LayoutConfig::default();
        let tag = classify("/tools/lint/tags/v1.0", &layout);
        assert_eq!(tag.kind, PathKind::Tag);
        assert_eq!(tag.component.as_deref(), Some("tools/lint"));
        assert_eq!(tag.name.as_deref(), Some("v1.0"));
    }

    #[test]
    fn test_classify_unknown() {
        let layout = LayoutConfig::default();
        assert_eq!(classify("/lib/util", &layout).kind, PathKind::Unknown);
        let bare = classify("/core/branches", &layout);
        assert_eq!(bare.kind, PathKind::Unknown);
        assert_eq!(bare.component.as_deref(), Some("core"));
    }

    #[test]
    fn test_classify_custom_names() {
        let layout = LayoutConfig {
            trunk: "main".to_string(),
            branches: "dev".to_string(),
            tags: "releases".to_string(),
        };
        assert_eq!(classify("/main", &layout).kind, PathKind::Trunk);
        assert_eq!(classify("/trunk", &layout).kind, PathKind::Unknown);
        assert_eq!(classify("/releases/1.0", &layout).kind, PathKind::Tag);
    }

    #[test]
    fn test_discover_owners_orders_by_kind() {
        let history = HistoryBuilder::new()
            .commit("layout", |c| {
                c.add_dir("/trunk").add_dir("/branches").add_dir("/tags");
            })
            .commit("tag", |c| {
                c.copy_dir("/tags/v1", "/trunk", 1);
            })
            .commit("branches", |c| {
                c.copy_dir("/branches/zeta", "/trunk", 1)
                    .copy_dir("/branches/alpha", "/trunk", 1);
            })
            .build();

        let owners = discover_owners(&history, &LayoutConfig::default(), &[], 3).unwrap();
        let names: Vec<(&str, OwnerKind)> =
            owners.iter().map(|o| (o.name.as_str(), o.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("trunk", OwnerKind::Trunk),
                ("alpha", OwnerKind::Branch),
                ("zeta", OwnerKind::Branch),
                ("v1", OwnerKind::Tag),
            ]
        );
        assert_eq!(owners[1].path, "/branches/alpha");
    }

    #[test]
    fn test_discover_owners_per_component() {
        let history = HistoryBuilder::new()
            .commit("layout", |c| {
                c.add_dir("/core").add_dir("/core/trunk").add_dir("/tools").add_dir("/tools/trunk");
            })
            .build();
        let components = vec!["core".to_string(), "tools".to_string()];
        let owners = discover_owners(&history, &LayoutConfig::default(), &components, 1).unwrap();
        assert_eq!(owners.len(), 2);
        assert_eq!(owners[0].component.as_deref(), Some("core"));
        assert_eq!(owners[1].qualified_name(), "tools/trunk");
    }
}
