// tests/scenarios.rs

mod common;

use common::{filler, layout, plan, revisions, run};
use std::collections::HashSet;
use svn_lineage::model::NodeKind;
use svn_lineage::{
    build_path, report, AnalysisError, HistoryBuilder, IntegrityError, LayoutConfig, Owner,
    Revision, RevisionHistoryStore, RevisionKey,
};

#[test]
fn test_branch_from_trunk_end_to_end() {
    let history = layout(HistoryBuilder::new())
        .commit("second file", |c| {
            c.add_file("/trunk/b.txt");
        })
        .commit("branch B", |c| {
            c.copy_dir("/branches/B", "/trunk", 2);
        })
        .commit("work on B", |c| {
            c.modify_file("/branches/B/a.txt");
        })
        .build();
    let owners = vec![Owner::trunk("/trunk"), Owner::branch("B", "/branches/B")];
    let analysis = run(&history, owners, 2);

    assert!(analysis.failures.is_empty(), "{:?}", analysis.failures);
    assert_eq!(analysis.revision, 4);

    let trunk = plan(&analysis, "trunk");
    assert_eq!(revisions(trunk), vec![1, 2]);
    assert!(trunk.anchor().is_none());

    let branch = plan(&analysis, "branches/B");
    assert_eq!(revisions(branch), vec![3, 4]);
    let anchor = branch.anchor().unwrap();
    assert_eq!(anchor.owner, 0);
    assert_eq!(anchor.revision, 2);
    assert_eq!(
        branch.view_at(4).unwrap().root(),
        Some(&RevisionKey::new("/branches/B", 4))
    );
}

#[test]
fn test_origin_and_anchor() {
    let mut builder = layout(HistoryBuilder::new());
    builder = filler(builder, 5);
    builder = builder.commit("trunk work", |c| {
        c.modify_file("/trunk/a.txt");
    });
    builder = filler(builder, 2);
    let history = builder
        .commit("branch B", |c| {
            c.copy_dir("/branches/B", "/trunk", 7);
        })
        .build();

    let store = RevisionHistoryStore::new(&history, LayoutConfig::default());
    let path = build_path(&store, 1, "/branches/B", Revision::Number(10)).unwrap();
    assert_eq!(path.origin, Some(RevisionKey::new("/trunk", 7)));
    let source = path.source_path.as_ref().unwrap();
    assert_eq!(source.path, "/trunk");
    assert_eq!(source.base_revision, 7);

    let analysis = run(
        &history,
        vec![Owner::trunk("/trunk"), Owner::branch("B", "/branches/B")],
        1,
    );
    assert!(analysis.failures.is_empty());
    assert_eq!(revisions(plan(&analysis, "trunk")), vec![1, 7]);

    let branch = plan(&analysis, "branches/B");
    let anchor = branch.anchor().unwrap();
    assert_eq!((anchor.owner, anchor.revision), (0, 7));
    assert!(branch.views().iter().all(|v| v.revision() > 7));
}

#[test]
fn test_shared_ancestry_is_memoized() {
    let history = layout(HistoryBuilder::new())
        .commit("trunk work", |c| {
            c.modify_file("/trunk/a.txt");
        })
        .commit("tag 1.0", |c| {
            c.copy_dir("/tags/1.0", "/trunk", 2);
        })
        .commit("tag 1.0-final", |c| {
            c.copy_dir("/tags/1.0-final", "/trunk", 2);
        })
        .build();
    let store = RevisionHistoryStore::new(&history, LayoutConfig::default());

    let first = build_path(&store, 0, "/tags/1.0", Revision::Head).unwrap();
    let second = build_path(&store, 1, "/tags/1.0-final", Revision::Head).unwrap();
    let a = first.source_path.as_ref().unwrap().first_record;
    let b = second.source_path.as_ref().unwrap().first_record;
    assert!(a.is_some());
    assert_eq!(a, b);
    assert_eq!(store.lookup(&RevisionKey::new("/trunk", 2)), a);

    assert_eq!(history.query_count("/trunk", 2), 1);
    assert_eq!(history.max_query_count(), 1);
}

#[test]
fn test_chains_strictly_descend() {
    let history = layout(HistoryBuilder::new())
        .commit("work", |c| {
            c.modify_file("/trunk/a.txt");
        })
        .commit("branch", |c| {
            c.copy_dir("/branches/dev", "/trunk", 2);
        })
        .commit("dev work", |c| {
            c.add_file("/branches/dev/new.txt");
        })
        .commit("more trunk work", |c| {
            c.modify_file("/trunk/a.txt");
        })
        .commit("tag from dev", |c| {
            c.copy_dir("/tags/dev-1", "/branches/dev", 4);
        })
        .build();
    let store = RevisionHistoryStore::new(&history, LayoutConfig::default());

    for (owner, path) in ["/trunk", "/branches/dev", "/tags/dev-1"].into_iter().enumerate() {
        let walked = build_path(&store, owner, path, Revision::Head).unwrap();
        let chain = walked.records(&store).unwrap();
        assert!(!chain.is_empty());

        let unique: HashSet<_> = chain.iter().collect();
        assert_eq!(unique.len(), chain.len(), "{path} revisits a record");

        let revs: Vec<u64> = chain
            .iter()
            .map(|&id| store.record(id).unwrap().revision())
            .collect();
        assert!(revs.windows(2).all(|w| w[0] > w[1]), "{path}: {revs:?}");
    }

    let tag = build_path(&store, 2, "/tags/dev-1", Revision::Head).unwrap();
    let revs: Vec<u64> = tag
        .records(&store)
        .unwrap()
        .iter()
        .map(|&id| store.record(id).unwrap().revision())
        .collect();
    assert_eq!(revs, vec![6, 4, 3, 2, 1]);
}

#[test]
fn test_source_copy_is_complete() {
    let mut builder = HistoryBuilder::new().commit("import", |c| {
        c.add_dir("/lib")
            .add_dir("/lib/util")
            .add_file("/lib/util/u.c")
            .add_dir("/trunk")
            .add_file("/trunk/main.c")
            .add_dir("/misc")
            .add_file("/misc/notes.txt");
    });
    builder = filler(builder, 3);
    builder = builder.commit("util fix", |c| {
        c.modify_file("/lib/util/u.c");
    });
    builder = filler(builder, 6);
    let history = builder
        .commit("vendor util", |c| {
            c.copy_dir("/trunk/vendor", "/lib/util", 5);
        })
        .build();

    let analysis = run(&history, vec![Owner::trunk("/trunk")], 1);
    assert!(analysis.failures.is_empty());
    let trunk = plan(&analysis, "trunk");
    assert_eq!(revisions(trunk), vec![1, 5, 12]);

    let util5 = RevisionKey::new("/lib/util", 5);
    let at12 = trunk.view_at(12).unwrap();
    assert_eq!(at12.source_for("vendor"), Some(&util5));
    assert_eq!(at12.root(), Some(&RevisionKey::new("/trunk", 12)));
    assert!(trunk
        .views()
        .iter()
        .filter(|v| v.revision() < 5)
        .all(|v| !v.view().references(&util5)));
    assert_eq!(
        trunk.view_at(1).unwrap().source_for("vendor"),
        Some(&RevisionKey::new("/lib/util", 1))
    );
}

#[test]
fn test_whole_component_rename_keeps_history() {
    let history = HistoryBuilder::new()
        .commit("import", |c| {
            c.add_dir("/old").add_dir("/old/trunk").add_file("/old/trunk/a.txt");
        })
        .commit("edit", |c| {
            c.modify_file("/old/trunk/a.txt");
        })
        .commit("rename component", |c| {
            c.copy_dir("/new", "/old", 2).delete("/old", NodeKind::Dir);
        })
        .commit("edit again", |c| {
            c.modify_file("/new/trunk/a.txt");
        })
        .build();
    let analysis = run(&history, vec![Owner::trunk("/new/trunk").with_component("new")], 1);
    assert!(analysis.failures.is_empty());

    let trunk = plan(&analysis, "new/trunk");
    assert_eq!(revisions(trunk), vec![1, 2, 3, 4]);
    assert!(!trunk.is_anchored());
    assert_eq!(
        trunk.view_at(1).unwrap().root(),
        Some(&RevisionKey::new("/old/trunk", 1))
    );
}

#[test]
fn test_unanchored_tag_fails_alone() {
    let history = layout(HistoryBuilder::new())
        .commit("hand-made tag", |c| {
            c.add_dir("/tags/weird").add_file("/tags/weird/a.txt");
        })
        .commit("proper tag", |c| {
            c.copy_dir("/tags/1.0", "/trunk", 1);
        })
        .build();
    let owners = vec![
        Owner::trunk("/trunk"),
        Owner::tag("1.0", "/tags/1.0"),
        Owner::tag("weird", "/tags/weird"),
    ];
    let analysis = run(&history, owners, 2);

    assert_eq!(analysis.failures.len(), 1);
    assert_eq!(analysis.failures[0].owner, 2);
    assert!(matches!(
        &analysis.failures[0].error,
        AnalysisError::NotAnchored { owner } if owner == "tags/weird"
    ));
    assert!(plan(&analysis, "tags/1.0").is_anchored());
    assert!(analysis.plan_for(2).is_none());
}

#[test]
fn test_independent_branch_migrates_into_trunk() {
    let history = layout(HistoryBuilder::new())
        .commit("trunk work", |c| {
            c.add_file("/trunk/b.txt");
        })
        .commit("independent import", |c| {
            c.add_dir("/branches/ind").add_file("/branches/ind/x.txt");
        })
        .commit("branch work", |c| {
            c.modify_file("/branches/ind/x.txt");
        })
        .build();
    let owners = vec![Owner::trunk("/trunk"), Owner::branch("ind", "/branches/ind")];
    let analysis = run(&history, owners, 1);
    assert!(analysis.failures.is_empty());

    let trunk = plan(&analysis, "trunk");
    assert_eq!(revisions(trunk), vec![1, 2, 3]);
    assert_eq!(trunk.views()[2].migrated_from(), Some(&1));

    let branch = plan(&analysis, "branches/ind");
    assert_eq!(revisions(branch), vec![4]);
    let anchor = branch.anchor().unwrap();
    assert_eq!((anchor.owner, anchor.revision), (0, 3));
}

#[test]
fn test_branch_created_with_trunk_joins_it() {
    let history = HistoryBuilder::new()
        .commit("import", |c| {
            c.add_dir("/trunk")
                .add_file("/trunk/a.txt")
                .add_dir("/branches")
                .add_dir("/branches/old")
                .add_file("/branches/old/a.txt");
        })
        .commit("old work", |c| {
            c.modify_file("/branches/old/a.txt");
        })
        .build();
    let owners = vec![Owner::trunk("/trunk"), Owner::branch("old", "/branches/old")];
    let analysis = run(&history, owners, 1);
    assert!(analysis.failures.is_empty());

    assert_eq!(revisions(plan(&analysis, "trunk")), vec![1]);
    let branch = plan(&analysis, "branches/old");
    assert_eq!(revisions(branch), vec![1, 2]);
    let anchor = branch.anchor().unwrap();
    assert_eq!((anchor.owner, anchor.revision), (0, 1));
}

#[test]
fn test_duplicate_origin_is_isolated() {
    let history = HistoryBuilder::new()
        .commit("import", |c| {
            c.add_dir("/old")
                .add_dir("/old/trunk")
                .add_file("/old/trunk/a.txt")
                .add_dir("/other")
                .add_dir("/other/trunk")
                .add_file("/other/trunk/b.txt");
        })
        .commit("confused copy", |c| {
            c.copy_dir("/comp", "/old", 1)
                .replace_dir("/comp/trunk", "/other/trunk", 1);
        })
        .build();
    let owners = vec![
        Owner::trunk("/comp/trunk").with_component("comp"),
        Owner::trunk("/other/trunk").with_component("other"),
    ];
    let analysis = run(&history, owners, 2);

    assert_eq!(analysis.failures.len(), 1);
    assert_eq!(analysis.failures[0].owner, 0);
    assert!(matches!(
        analysis.failures[0].error,
        AnalysisError::Integrity(IntegrityError::DuplicateOrigin { .. })
    ));
    assert_eq!(revisions(plan(&analysis, "other/trunk")), vec![1]);
}

#[test]
fn test_parallel_runs_agree() {
    let build = || {
        let mut builder = layout(HistoryBuilder::new());
        for i in 0..6u64 {
            let rev = 2 + i * 2;
            builder = builder
                .commit("trunk work", |c| {
                    c.modify_file("/trunk/a.txt");
                })
                .commit("tag", |c| {
                    c.copy_dir(&format!("/tags/t{i}"), "/trunk", rev);
                });
        }
        builder
            .commit("branch", |c| {
                c.copy_dir("/branches/b", "/tags/t3", 9);
            })
            .commit("branch work", |c| {
                c.modify_file("/branches/b/a.txt");
            })
            .build()
    };
    let owners = || {
        let mut owners = vec![Owner::trunk("/trunk"), Owner::branch("b", "/branches/b")];
        owners.extend((0..6).map(|i| Owner::tag(format!("t{i}"), format!("/tags/t{i}"))));
        owners
    };

    let serial_history = build();
    let serial = run(&serial_history, owners(), 1);
    let parallel_history = build();
    let parallel = run(&parallel_history, owners(), 8);

    assert!(serial.failures.is_empty());
    assert!(parallel.failures.is_empty());
    assert_eq!(serial.records, parallel.records);
    assert_eq!(parallel_history.max_query_count(), 1);

    let as_json = |a| serde_json::to_string(&report::documents(a)).unwrap();
    assert_eq!(as_json(&serial), as_json(&parallel));

    let branch = plan(&parallel, "branches/b");
    let anchor = branch.anchor().unwrap();
    assert_eq!((anchor.owner, anchor.revision), (5, 9));
}
