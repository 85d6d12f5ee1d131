//! Commit rewriting.
//!
//! `CommitRewriter` turns one original commit into its `Resolution` in the
//! split history:
//! 1. cache hit → done
//! 2. resolve parents (already rewritten thanks to walk order; missing ones
//!    are rewritten first from an explicit stack)
//! 3. drop parents inherited from a skipped commit when another parent
//!    already reaches them
//! 4. filter the tree; nothing matched → `Elided`, children inherit the
//!    rewritten parents
//! 5. tree identical to a rewritten parent that already contains the other
//!    parents → collapse onto it, otherwise write a new commit
//! 6. record the resolution in the cache
//!
//! New commits are written as raw objects: the author, committer and
//! encoding header lines and the message are copied byte for byte, so
//! splitting the same commit twice always yields the same id. Signatures
//! (`gpgsig`, `mergetag`) are dropped since they no longer verify.

use git2::{Commit, ObjectType, Oid, Repository};
use std::collections::HashMap;

use crate::error::{Result, SplitError};
use crate::git::cache::SplitCache;
use crate::git::filter::PrefixFilterer;
use crate::git::history::CommitGraph;
use crate::models::{CommitSummary, GitVersion, Resolution, SplitConfig, SplitResult};

/// Header lines carried over to the rewritten commit.
const KEPT_HEADERS: [&str; 3] = ["author", "committer", "encoding"];

/// A rewritten parent. `inherited` is set when it only reaches the commit
/// through a parent that was elided or collapsed.
#[derive(Debug, Clone, Copy)]
struct ParentLink {
    id: Oid,
    inherited: bool,
}

pub struct CommitRewriter<'a> {
    repo: &'a Repository,
    graph: &'a CommitGraph,
    cache: &'a SplitCache,
    result: &'a SplitResult,
    filterer: PrefixFilterer<'a>,
    version: GitVersion,
    fingerprint: String,
    memo: HashMap<Oid, Resolution>,
}

impl<'a> CommitRewriter<'a> {
    pub fn new(
        repo: &'a Repository,
        graph: &'a CommitGraph,
        cache: &'a SplitCache,
        result: &'a SplitResult,
        config: &'a SplitConfig,
    ) -> Self {
        Self {
            repo,
            graph,
            cache,
            result,
            filterer: PrefixFilterer::new(&config.prefixes),
            version: config.git_version,
            fingerprint: config.fingerprint(),
            memo: HashMap::new(),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Resolve one commit of the walk and count it.
    pub fn process(&mut self, id: Oid) -> Result<Resolution> {
        let resolution = self.rewrite(id)?;
        self.result.inc_traversed();
        if resolution.is_created() {
            self.result.inc_created();
        }
        Ok(resolution)
    }

    /// Resolution of `id`, from the cache or freshly rewritten.
    pub fn rewrite(&mut self, id: Oid) -> Result<Resolution> {
        if let Some(hit) = self.lookup(id) {
            return Ok(hit);
        }
        self.rewrite_missing_ancestors(id)?;
        self.rewrite_ready(id)
    }

    /// Cached resolution, if any.
    pub fn lookup(&mut self, id: Oid) -> Option<Resolution> {
        if let Some(hit) = self.memo.get(&id) {
            return Some(hit.clone());
        }
        let hit = self.cache.get(id, &self.fingerprint)?;
        self.memo.insert(id, hit.clone());
        Some(hit)
    }

    /// Rewrite walked ancestors of `id` that have no resolution yet, parents
    /// first. Only needed when commits arrive out of walk order.
    fn rewrite_missing_ancestors(&mut self, id: Oid) -> Result<()> {
        let mut stack: Vec<(Oid, bool)> = self
            .graph
            .walked_parents(id)
            .into_iter()
            .map(|p| (p, false))
            .collect();

        while let Some((oid, expanded)) = stack.pop() {
            if self.lookup(oid).is_some() {
                continue;
            }
            if expanded {
                self.rewrite_ready(oid)?;
                continue;
            }
            stack.push((oid, true));
            for parent in self.graph.walked_parents(oid) {
                if self.lookup(parent).is_none() {
                    stack.push((parent, false));
                }
            }
        }

        Ok(())
    }

    /// Rewrite a commit whose walked parents are all resolved.
    fn rewrite_ready(&mut self, id: Oid) -> Result<Resolution> {
        let commit = self.repo.find_commit(id)?;
        let links = self.rewritten_parents(&commit)?;
        let parents = self.reduce_parents(&links)?;

        let resolution = match self.filterer.filter(self.repo, commit.tree_id())? {
            None => Resolution::Elided { parents },
            Some(tree) => self.copy_or_skip(&commit, tree, parents)?,
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            let summary = CommitSummary::from_commit(&commit);
            tracing::debug!(
                "{} {} ({}, {}) -> {:?}",
                summary.oid,
                summary.subject,
                summary.author,
                summary.time,
                resolution
            );
        }

        self.cache.put(id, &self.fingerprint, &resolution)?;
        self.memo.insert(id, resolution.clone());
        Ok(resolution)
    }

    /// Rewritten parents in original order, elided parents replaced by
    /// what they inherited, duplicates removed.
    fn rewritten_parents(&mut self, commit: &Commit<'_>) -> Result<Vec<ParentLink>> {
        let mut parents: Vec<ParentLink> = Vec::new();

        for parent in commit.parent_ids() {
            let resolution = match self.lookup(parent) {
                Some(resolution) => resolution,
                None if self.graph.contains(parent) => {
                    return Err(SplitError::Internal(format!(
                        "parent {} of {} was not rewritten first",
                        parent,
                        commit.id()
                    )));
                }
                None => {
                    tracing::debug!("{} is below the split boundary, not attaching it", parent);
                    continue;
                }
            };

            let inherited = !resolution.is_created();
            for id in resolution.inherited() {
                match parents.iter_mut().find(|link| link.id == *id) {
                    Some(link) => link.inherited &= inherited,
                    None => parents.push(ParentLink { id: *id, inherited }),
                }
            }
        }

        Ok(parents)
    }

    /// Drop inherited parents that another parent already reaches: the
    /// commit they stand for changed nothing under the prefixes. Parents
    /// with a commit of their own are kept, so real merges stay merges.
    fn reduce_parents(&self, links: &[ParentLink]) -> Result<Vec<Oid>> {
        let mut kept = Vec::with_capacity(links.len());
        for link in links {
            if link.inherited && self.reached_by_other(link.id, links)? {
                continue;
            }
            kept.push(link.id);
        }
        Ok(kept)
    }

    fn reached_by_other(&self, id: Oid, links: &[ParentLink]) -> Result<bool> {
        for other in links {
            if other.id != id && self.repo.graph_descendant_of(other.id, id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn copy_or_skip(&self, commit: &Commit<'_>, tree: Oid, parents: Vec<Oid>) -> Result<Resolution> {
        let mut identical: Option<Oid> = None;
        let mut others: Vec<Oid> = Vec::new();

        for parent in &parents {
            let parent_tree = self.repo.find_commit(*parent)?.tree_id();
            if parent_tree == tree && identical.is_none() {
                identical = Some(*parent);
            } else {
                others.push(*parent);
            }
        }

        if let Some(same) = identical {
            if self.collapses_onto(same, &others)? {
                return Ok(Resolution::Commit {
                    id: same,
                    created: false,
                });
            }
        }

        let id = self.copy_commit(commit, tree, &parents)?;
        Ok(Resolution::Commit { id, created: true })
    }

    /// Old git always drops a commit whose tree matches a parent. Later
    /// versions keep a merge whose other side brings history `same` lacks.
    fn collapses_onto(&self, same: Oid, others: &[Oid]) -> Result<bool> {
        if !self.version.preserves_merge_history() {
            return Ok(true);
        }
        for other in others {
            if !self.repo.graph_descendant_of(same, *other)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn copy_commit(&self, commit: &Commit<'_>, tree: Oid, parents: &[Oid]) -> Result<Oid> {
        let message = if self.version.reflows_messages() {
            reflow_message(commit.message_raw_bytes())
        } else {
            commit.message_raw_bytes().to_vec()
        };
        let buffer = build_commit(tree, parents, commit.raw_header_bytes(), &message);
        let odb = self.repo.odb()?;
        Ok(odb.write(ObjectType::Commit, &buffer)?)
    }
}

/// Serialize a commit object from its parts. Header lines of `raw_header`
/// other than author, committer and encoding are dropped, including their
/// continuation lines.
pub fn build_commit(tree: Oid, parents: &[Oid], raw_header: &[u8], message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_header.len() + message.len() + 64);
    out.extend_from_slice(format!("tree {}\n", tree).as_bytes());
    for parent in parents {
        out.extend_from_slice(format!("parent {}\n", parent).as_bytes());
    }

    let mut keep = false;
    for line in raw_header.split(|b| *b == b'\n') {
        if line.is_empty() {
            continue;
        }
        if line[0] != b' ' {
            let name = line.split(|b| *b == b' ').next().unwrap_or_default();
            keep = KEPT_HEADERS.iter().any(|h| h.as_bytes() == name);
        }
        if keep {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
    }

    out.push(b'\n');
    out.extend_from_slice(message);
    out
}

/// Rebuild a message as `subject\n\nbody`, the shape old `git subtree`
/// produced: the first paragraph folded onto one line, then the rest.
pub fn reflow_message(message: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(message);
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());

    let mut subject: Vec<&str> = Vec::new();
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        subject.push(line.trim());
    }

    let body: Vec<&str> = lines.skip_while(|l| l.trim().is_empty()).collect();
    let mut out = subject.join(" ");
    out.push_str("\n\n");
    if !body.is_empty() {
        out.push_str(&body.join("\n"));
        out.push('\n');
    }
    out.into_bytes()
}
