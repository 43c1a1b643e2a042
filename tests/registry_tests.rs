//! Root lifecycle, completion and merge behaviour of the registry, driven by
//! a scripted provider.

mod common;

use anyhow::Result;
use common::*;
use cxx_symbol_index::indexing::{
    EventRecorder, IndexEvent, RootIndexRegistry, RootState, SymbolTree,
};
use cxx_symbol_index::models::{SymbolInfo, SymbolKind};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn registry_with(
    provider: ScriptedProvider,
    workers: usize,
) -> (RootIndexRegistry, Arc<EventRecorder>) {
    let recorder = Arc::new(EventRecorder::new());
    let registry = RootIndexRegistry::new(test_config(workers), Arc::new(provider))
        .with_observer(recorder.clone());
    (registry, recorder)
}

fn labels(tree: &SymbolTree) -> Vec<(usize, String)> {
    let mut rows = Vec::new();
    tree.for_each(|depth, node| rows.push((depth, node.label())));
    rows
}

#[test]
fn test_empty_project_finishes_immediately() -> Result<()> {
    let (registry, recorder) = registry_with(ScriptedProvider::new(), 2);

    let id = registry.create_root(project("/w/empty", &[]))?;

    assert_eq!(registry.state(id)?, RootState::Drained);
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));
    assert_eq!(
        recorder.events_for(id),
        vec![
            IndexEvent::Started {
                root: id,
                total_files: 0
            },
            IndexEvent::Finished {
                root: id,
                success: true
            },
        ]
    );

    let tree = registry.snapshot(id)?;
    assert_eq!(tree.name, "empty");
    assert!(tree.is_empty());
    Ok(())
}

#[test]
fn test_every_job_reports_exactly_once() -> Result<()> {
    let mut provider = ScriptedProvider::new();
    let mut files = Vec::new();
    for i in 0..40 {
        let file = format!("/w/proj/f{i}.cpp");
        provider = if i % 4 == 0 {
            provider.failing(file.as_str())
        } else {
            provider.with_unit(
                file.as_str(),
                busy_unit(&file, &format!("C{i}"), 5),
            )
        };
        files.push(file);
    }
    let provider = Arc::new(provider);
    let recorder = Arc::new(EventRecorder::new());
    let registry = RootIndexRegistry::new(test_config(4), provider.clone())
        .with_observer(recorder.clone());

    let refs: Vec<&str> = files.iter().map(String::as_str).collect();
    let id = registry.create_root(project("/w/proj", &refs))?;

    // Parse failures do not make the root unsuccessful.
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));
    assert_eq!(provider.parsed(), 40);

    let counts = registry.counts(id)?;
    assert_eq!(counts.total, 40);
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.completed, 30);
    assert_eq!(counts.failed, 10);
    assert_eq!(counts.cancelled, 0);
    assert_eq!(recorder.finished_results(id), vec![true]);

    let progress = registry.progress(id)?;
    assert_eq!(progress.finished_files(), 40);
    assert_eq!(progress.failed_files, 10);
    assert_eq!(progress.progress_ratio, 1.0);

    // 30 classes with 4 methods each.
    assert_eq!(registry.snapshot(id)?.node_count(), 150);
    Ok(())
}

#[test]
fn test_kind_filter_and_location_gate() -> Result<()> {
    let main = "/w/app/main.cpp";
    let system = "/usr/include/vector";
    let foo = class("Foo", "Foo", main, 3);
    let vector = class("vector", "std::vector", system, 40);

    let provider = ScriptedProvider::new().with_unit(
        main,
        vec![
            (tu(main), variable("counter", "int", main, 1)),
            (tu(main), foo.clone()),
            (foo.clone(), method("bar", "void ()", main, 4)),
            (foo.clone(), variable("shadow", "int", main, 5)),
            (tu(system), vector.clone()),
            (vector, method("push_back", "void (int)", system, 41)),
        ],
    );
    let (registry, _) = registry_with(provider, 1);

    let id = registry.create_root(project("/w/app", &["main.cpp"]))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let tree = registry.snapshot(id)?;
    assert_eq!(
        labels(&tree),
        vec![(0, "Foo Foo".to_string()), (1, "bar void ()".to_string())]
    );

    let progress = registry.progress(id)?;
    assert_eq!(progress.edges_rejected, 4);
    assert_eq!(progress.symbols_merged, 2);
    Ok(())
}

#[test]
fn test_identical_edges_merge_into_one_node() -> Result<()> {
    let header = "/w/lib/widget.h";
    let widget = class("Widget", "Widget", header, 1);
    let edges = vec![
        (tu(header), widget.clone()),
        (widget.clone(), method("draw", "void () const", header, 2)),
    ];

    // Two sources replay the header's edges, as if both included it.
    let provider = ScriptedProvider::new()
        .with_unit("/w/lib/a.cpp", edges.clone())
        .with_unit("/w/lib/b.cpp", edges)
        .with_unit(
            "/w/lib/c.cpp",
            vec![(
                class("Widget", "Widget", "/w/lib/c.cpp", 9),
                method("draw", "void () const", "/w/lib/c.cpp", 10),
            )],
        );
    let (registry, _) = registry_with(provider, 3);

    let id = registry.create_root(project(
        "/w/lib",
        &["widget.h", "a.cpp", "b.cpp", "c.cpp"],
    ))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let tree = registry.snapshot(id)?;
    assert_eq!(tree.node_count(), 2);

    let widget = tree
        .find(&SymbolInfo::new(SymbolKind::ClassDecl, "Widget", "Widget"))
        .expect("Widget is indexed");
    assert_eq!(widget.locations.len(), 2);
    assert_eq!(widget.children[0].locations.len(), 2);
    assert!(widget.tooltip().ends_with("Location Count: 2"));
    Ok(())
}

#[test]
fn test_namespaced_class_stays_separate() -> Result<()> {
    let a = "/w/ns/a.h";
    let c = "/w/ns/c.cpp";
    let ns = namespace("NS", c, 1);
    let provider = ScriptedProvider::new()
        .with_unit(a, vec![(tu(a), class("Foo", "Foo", a, 1))])
        .with_unit(
            c,
            vec![(tu(c), ns.clone()), (ns, class("Foo", "NS::Foo", c, 1))],
        );
    let (registry, _) = registry_with(provider, 2);

    let id = registry.create_root(project("/w/ns", &["a.h", "c.cpp"]))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let tree = registry.snapshot(id)?;
    assert_eq!(
        labels(&tree),
        vec![
            (0, "Foo Foo".to_string()),
            (0, "NS".to_string()),
            (1, "Foo NS::Foo".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_observer_sees_started_then_finished_last() -> Result<()> {
    let file = "/w/obs/x.cpp";
    let recorder = Arc::new(EventRecorder::with_merges());
    let registry = RootIndexRegistry::new(
        test_config(1),
        Arc::new(ScriptedProvider::new().with_unit(file, busy_unit(file, "X", 3))),
    )
    .with_observer(recorder.clone());

    let id = registry.create_root(project("/w/obs", &["x.cpp"]))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let events = recorder.events_for(id);
    assert!(matches!(
        events.first(),
        Some(IndexEvent::Started { total_files: 1, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(IndexEvent::Finished { success: true, .. })
    ));
    let merges = events
        .iter()
        .filter(|event| matches!(event, IndexEvent::SymbolMerged { .. }))
        .count();
    assert_eq!(merges, 3);
    Ok(())
}

#[test]
fn test_panicking_job_still_reports() -> Result<()> {
    let good = "/w/p/good.cpp";
    let provider = ScriptedProvider::new()
        .with_unit(good, busy_unit(good, "Good", 2))
        .panicking("/w/p/bad.cpp");
    let (registry, recorder) = registry_with(provider, 2);

    let id = registry.create_root(project("/w/p", &["good.cpp", "bad.cpp"]))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let counts = registry.counts(id)?;
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(recorder.finished_results(id), vec![true]);
    Ok(())
}

#[test]
fn test_remove_finished_root_returns_tree() -> Result<()> {
    let file = "/w/rm/x.cpp";
    let (registry, _) = registry_with(
        ScriptedProvider::new().with_unit(file, busy_unit(file, "X", 4)),
        2,
    );

    let id = registry.create_root(project("/w/rm", &["x.cpp"]))?;
    assert_eq!(registry.wait_until_finished(id, WAIT)?, Some(true));

    let tree = registry.remove_root(id)?;
    assert_eq!(tree.name, "rm");
    assert_eq!(tree.node_count(), 4);
    assert!(registry.roots().is_empty());
    assert!(registry.snapshot(id).is_err());
    Ok(())
}
