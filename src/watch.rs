//! Change-triggered rebuilds.
//!
//! Each watch binding pairs a glob with one named task. The filesystem
//! notifier is the `notify` debouncer: the static root of every glob is
//! watched recursively, and any create/modify/remove event whose path
//! matches a binding's pattern re-invokes that binding's task through the
//! executor. Bindings are independent; a failing rebuild is logged and the
//! loop keeps watching. There is no cancellation of an in-flight run.

use std::collections::HashSet;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::new_debouncer;

use crate::error::{PipelineError, WatchError};
use crate::executor;
use crate::graph::TaskGraph;

const DEBOUNCE: Duration = Duration::from_millis(250);

struct CompiledBinding {
    pattern: Pattern,
    task: String,
}

/// Run every bound task once, then watch their globs indefinitely,
/// re-invoking the bound task on each matching change. Returns only on a
/// notifier failure; a rebuild error is logged and watching continues.
pub fn watch(graph: &TaskGraph) -> Result<(), PipelineError> {
    if graph.bindings.is_empty() {
        tracing::warn!("no watch globs configured, nothing to do");
        return Ok(());
    }

    let mut compiled = Vec::new();
    let mut roots = HashSet::new();

    for binding in &graph.bindings {
        let (root, pattern) =
            resolve_watch_path(&binding.glob).map_err(|_| WatchError::WatchRoot(binding.glob.clone()))?;

        roots.insert(root);
        compiled.push(CompiledBinding {
            pattern,
            task: binding.task.clone(),
        });

        tracing::info!("binding '{}' triggers '{}'", binding.glob, binding.task);
        executor::run(graph, &binding.task)?;
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, None, tx).map_err(WatchError::Notify)?;

    for root in collapse_watch_paths(roots) {
        tracing::info!("watching {}", root);
        debouncer
            .watch(root.as_std_path(), RecursiveMode::Recursive)
            .map_err(WatchError::Notify)?;
    }

    loop {
        match rx.recv().map_err(WatchError::Recv)? {
            Ok(events) => {
                let mut triggered = HashSet::new();

                for de in events {
                    if !matches!(
                        de.event.kind,
                        EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
                    ) {
                        continue;
                    }

                    for path in &de.event.paths {
                        for binding in &compiled {
                            if binding.pattern.matches_path(path) {
                                triggered.insert(binding.task.clone());
                            }
                        }
                    }
                }

                for task in triggered {
                    tracing::info!("change detected, re-running '{}'", task);
                    if let Err(e) = executor::run(graph, &task) {
                        tracing::error!("rebuild of '{}' failed: {}", task, e);
                    }
                }
            }
            Err(e) => tracing::error!("watch error: {:?}", e),
        }
    }
}

/// Splits a glob string into a canonicalized static root path (for
/// watching) and a compiled absolute Pattern (for matching).
fn resolve_watch_path(glob_str: &str) -> anyhow::Result<(Utf8PathBuf, Pattern)> {
    let path = Utf8Path::new(glob_str);

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    // Canonicalize the static root (must exist on disk)
    let absolute_root = root_part.canonicalize_utf8()?;

    // If the suffix is empty the root may be a concrete file; watch its
    // parent so atomic writes are caught.
    let (watch_root, match_pattern) = if suffix_part.as_str().is_empty() && absolute_root.is_file()
    {
        let parent = absolute_root
            .parent()
            .unwrap_or(&absolute_root)
            .to_path_buf();
        (parent, absolute_root)
    } else {
        let pattern = absolute_root.join(&suffix_part);
        (absolute_root, pattern)
    };

    let pattern = Pattern::new(match_pattern.as_str())?;

    Ok((watch_root, pattern))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because the
/// watcher is recursive. Sort the paths and drop any path inside a
/// previously accepted one.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered: Vec<Utf8PathBuf> = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_glob_splits_into_root_and_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().canonicalize().unwrap()).unwrap();
        std::fs::create_dir_all(base.join("src/js")).unwrap();

        let glob = base.join("src/**/*.js");
        let (root, pattern) = resolve_watch_path(glob.as_str()).unwrap();

        assert_eq!(root, base.join("src"));
        assert!(pattern.matches_path(base.join("src/js/app.js").as_std_path()));
        assert!(!pattern.matches_path(base.join("src/js/app.css").as_std_path()));
    }

    #[test]
    fn concrete_file_watches_its_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().canonicalize().unwrap()).unwrap();
        std::fs::write(base.join("main.scss"), "").unwrap();

        let glob = base.join("main.scss");
        let (root, pattern) = resolve_watch_path(glob.as_str()).unwrap();

        assert_eq!(root, base);
        assert!(pattern.matches_path(base.join("main.scss").as_std_path()));
    }

    #[test]
    fn nested_roots_collapse_into_the_outermost() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/a"));
        paths.insert(Utf8PathBuf::from("/a/b"));
        paths.insert(Utf8PathBuf::from("/a/b/c"));
        paths.insert(Utf8PathBuf::from("/b"));

        let collapsed = collapse_watch_paths(paths);

        assert_eq!(
            collapsed,
            vec![Utf8PathBuf::from("/a"), Utf8PathBuf::from("/b")],
        );
    }

    #[test]
    fn sibling_roots_with_a_shared_prefix_both_survive() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/foo"));
        paths.insert(Utf8PathBuf::from("/foo-bar"));

        let collapsed = collapse_watch_paths(paths);

        assert_eq!(
            collapsed,
            vec![Utf8PathBuf::from("/foo"), Utf8PathBuf::from("/foo-bar")],
        );
    }
}
