//! The `split` entry point.
//!
//! Validates the configuration against the repository, opens the cache,
//! walks the origin's history and rewrites it, then records the head and
//! optionally moves the target reference to it.

use git2::Oid;

use crate::error::Result;
use crate::git::cache::SplitCache;
use crate::git::history::GraphWalker;
use crate::git::repository::GitRepository;
use crate::git::rewrite::CommitRewriter;
use crate::git::wavefront;
use crate::models::{SplitConfig, SplitResult};

/// Split the history of `config.origin` down to `config.prefixes`.
///
/// Progress is visible through `result` while the split runs; the head is
/// set once it succeeds. A `None` head after success means no commit touched
/// the prefixes.
pub fn split(config: &SplitConfig, result: &SplitResult) -> Result<()> {
    let repo = GitRepository::open(&config.path)?;
    let origin = repo.resolve_commit(&config.origin)?;
    let lower_bound = match config.commit.as_deref() {
        Some(spec) => Some(repo.resolve_commit(spec)?),
        None => None,
    };

    let git_dir = repo.git_dir()?;
    let cache = SplitCache::open(&git_dir)?;
    if config.scratch {
        cache.flush()?;
    }

    result.begin();
    let fingerprint = config.fingerprint();
    tracing::info!(
        "Splitting {} ({}) with {} prefix(es), git {}, cache key {}",
        config.origin,
        origin,
        config.prefixes.len(),
        config.git_version.tag(),
        &fingerprint[..12]
    );

    let graph = repo.with_repo(|r| GraphWalker::new(r).walk(origin, lower_bound))?;
    tracing::info!("{} commits to traverse", graph.len());

    let head = if config.workers > 1 && graph.len() > 1 {
        wavefront::run(&git_dir, &graph, &cache, result, config, config.workers)?;
        repo.with_repo(|r| {
            let mut rewriter = CommitRewriter::new(r, &graph, &cache, result, config);
            Ok(head_of(&mut rewriter, origin))
        })?
    } else {
        repo.with_repo(|r| {
            let mut rewriter = CommitRewriter::new(r, &graph, &cache, result, config);
            for id in graph.order() {
                rewriter.process(*id)?;
            }
            Ok(head_of(&mut rewriter, origin))
        })?
    };

    if let (Some(target), Some(head)) = (config.target.as_deref(), head) {
        let message = format!("subtree-split: {} from {}", head, config.origin);
        let name = repo.update_reference(target, head, &message)?;
        tracing::info!("Updated {} to {}", name, head);
    } else if let (Some(target), None) = (config.target.as_deref(), head) {
        tracing::warn!("Nothing to split, {} left untouched", target);
    }

    result.finish(head);
    tracing::info!(
        "{} commits created, {} commits traversed, in {:?}",
        result.created(),
        result.traversed(),
        result.duration()
    );

    Ok(())
}

/// The origin's resolution decides the head. An origin below the lower
/// bound is not walked, so only an earlier run can have resolved it.
fn head_of(rewriter: &mut CommitRewriter<'_>, origin: Oid) -> Option<Oid> {
    rewriter.lookup(origin).and_then(|resolution| resolution.head())
}
