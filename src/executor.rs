//! Executes tasks from a [`TaskGraph`] in dependency waves.
//!
//! Tasks whose dependencies are all satisfied form a wave; every task in a
//! wave runs concurrently on the rayon pool, since independent groups have
//! no ordering between them. A failed task stops execution before the next
//! wave, so nothing that depends on it ever runs.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::PipelineError;
use crate::graph::TaskGraph;

/// Invoke the named task, running its whole dependency closure first.
pub fn run(graph: &TaskGraph, name: &str) -> Result<(), PipelineError> {
    let target = graph
        .resolve(name)
        .ok_or_else(|| PipelineError::TaskNotFound(name.to_string()))?;

    // Everything the target transitively depends on, target included.
    let mut nodes = HashSet::new();
    let reversed = Reversed(&graph.graph);
    let mut dfs = Dfs::new(reversed, target);
    while let Some(node) = dfs.next(reversed) {
        nodes.insert(node);
    }

    run_nodes(graph, &nodes)
}

/// Invoke every registered task once, respecting dependency order.
pub fn run_all(graph: &TaskGraph) -> Result<(), PipelineError> {
    let nodes: HashSet<NodeIndex> = graph.graph.node_indices().collect();
    run_nodes(graph, &nodes)
}

fn run_nodes(graph: &TaskGraph, nodes: &HashSet<NodeIndex>) -> Result<(), PipelineError> {
    // We run toposort primarily to detect any cycles in the graph.
    toposort(&graph.graph, None).expect("Cycle detected in task graph");

    if nodes.is_empty() {
        return Ok(());
    }

    let s = Instant::now();
    let bar = ProgressBar::new(nodes.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let mut pending: HashMap<NodeIndex, usize> = nodes
        .iter()
        .map(|&i| {
            (
                i,
                graph
                    .graph
                    .neighbors_directed(i, petgraph::Direction::Incoming)
                    .filter(|dep| nodes.contains(dep))
                    .count(),
            )
        })
        .collect();

    while !pending.is_empty() {
        let wave: Vec<NodeIndex> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&i, _)| i)
            .collect();

        bar.set_message(wave_message(graph, &wave));

        let results: Vec<(NodeIndex, Result<(), crate::error::TaskError>)> = wave
            .into_par_iter()
            .map(|index| {
                let node = &graph.graph[index];
                let result = match &node.work {
                    Some(work) => work(),
                    None => Ok(()),
                };
                (index, result)
            })
            .collect();

        for (index, result) in results {
            let name = graph.graph[index].name.clone();
            if let Err(e) = result {
                bar.abandon_with_message(format!("Task '{name}' failed"));
                return Err(PipelineError::Task(name, e));
            }

            tracing::debug!("task '{}' finished", name);
            bar.inc(1);
            pending.remove(&index);

            for dependent in graph
                .graph
                .neighbors_directed(index, petgraph::Direction::Outgoing)
            {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                }
            }
        }
    }

    bar.finish_with_message(format!("Finished tasks {}", crate::io::as_overhead(s)));

    Ok(())
}

fn wave_message(graph: &TaskGraph, wave: &[NodeIndex]) -> String {
    const MAX: usize = 5;
    let mut names: Vec<&str> = wave.iter().map(|&i| graph.graph[i].name.as_str()).collect();
    names.sort();

    if names.len() <= MAX {
        names.join(", ")
    } else {
        format!("{}… ({} total)", names[..MAX].join(", "), names.len())
    }
}
