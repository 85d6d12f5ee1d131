//! Wavefront-parallel rewriting.
//!
//! A commit is ready once every walked parent has a recorded resolution.
//! The coordinator (calling thread) keeps a pending-parent count per commit
//! and feeds ready commits to a pool of workers over a channel; each
//! completion may make children ready.
//!
//! Each worker opens its own `Repository` (libgit2 handles are not `Sync`)
//! and its own `CommitRewriter`. The cache is shared, and a parent's entry is
//! written before its completion is reported, so a child's worker always
//! finds it. Output is identical to the sequential path.

use crossbeam_channel as chan;
use git2::Oid;
use std::collections::HashMap;
use std::path::Path;
use std::thread;

use crate::error::{Result, SplitError};
use crate::git::cache::SplitCache;
use crate::git::history::CommitGraph;
use crate::git::rewrite::CommitRewriter;
use crate::models::{SplitConfig, SplitResult};

pub fn run(
    git_dir: &Path,
    graph: &CommitGraph,
    cache: &SplitCache,
    result: &SplitResult,
    config: &SplitConfig,
    workers: usize,
) -> Result<()> {
    if graph.is_empty() {
        return Ok(());
    }

    let workers = workers.clamp(1, graph.len());
    let (ready_tx, ready_rx) = chan::unbounded::<Oid>();
    let (done_tx, done_rx) = chan::unbounded::<(Oid, Result<()>)>();

    let mut pending: HashMap<Oid, usize> = graph
        .order()
        .iter()
        .map(|id| (*id, graph.walked_parents(*id).len()))
        .collect();

    thread::scope(|scope| {
        for worker in 0..workers {
            let ready_rx = ready_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                let repo = match git2::Repository::open(git_dir) {
                    Ok(repo) => repo,
                    Err(e) => {
                        tracing::warn!("Worker {} cannot open repository: {}", worker, e);
                        return;
                    }
                };
                let mut rewriter = CommitRewriter::new(&repo, graph, cache, result, config);
                for id in ready_rx.iter() {
                    let outcome = rewriter.process(id).map(|_| ());
                    if done_tx.send((id, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(ready_rx);
        drop(done_tx);

        // seed in walk order so roots start oldest first
        for id in graph.order() {
            if pending.get(id) == Some(&0) {
                ready_tx
                    .send(*id)
                    .map_err(|_| SplitError::Internal("no worker is running".to_string()))?;
            }
        }

        let mut completed = 0usize;
        let mut failure: Option<SplitError> = None;

        while completed < graph.len() {
            let Ok((id, outcome)) = done_rx.recv() else {
                break;
            };
            completed += 1;

            if let Err(e) = outcome {
                tracing::warn!("Rewriting {} failed: {}", id, e);
                failure.get_or_insert(e);
                break;
            }

            let Some(node) = graph.node(id) else { continue };
            for child in &node.children {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 && ready_tx.send(*child).is_err() {
                        break;
                    }
                }
            }
        }

        // closing the queue lets idle workers exit
        drop(ready_tx);

        if let Some(e) = failure {
            return Err(e);
        }
        if completed < graph.len() {
            return Err(SplitError::Internal(format!(
                "workers stopped after {} of {} commits",
                completed,
                graph.len()
            )));
        }
        Ok(())
    })
}
