//! Commit graph traversal.
//!
//! `GraphWalker` collects the ancestry of an origin commit, stopping at an
//! optional lower bound, and orders it parent-first.
//!
//! Ordering: Kahn's algorithm over the collected subgraph with a min-heap
//! keyed on (committer time, id). Among commits whose parents are all
//! emitted, the oldest goes first and equal times fall back to the id, so an
//! unchanged graph always produces the same sequence.
//!
//! Only commit headers are read; a fresh walk is cheap compared to rewriting.

use git2::{Oid, Repository};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{Result, SplitError};

#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Parent ids in commit order, including parents outside the walk.
    pub parents: Vec<Oid>,
    /// Distinct children inside the walk, sorted.
    pub children: Vec<Oid>,
    pub time: i64,
}

/// The walked subgraph in dependency order.
#[derive(Debug, Default)]
pub struct CommitGraph {
    order: Vec<Oid>,
    nodes: HashMap<Oid, GraphNode>,
}

impl CommitGraph {
    /// Commit ids, every parent before its children.
    pub fn order(&self) -> &[Oid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: Oid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: Oid) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Distinct parents that are part of the walk.
    pub fn walked_parents(&self, id: Oid) -> Vec<Oid> {
        let mut parents: Vec<Oid> = Vec::new();
        if let Some(node) = self.nodes.get(&id) {
            for parent in &node.parents {
                if self.nodes.contains_key(parent) && !parents.contains(parent) {
                    parents.push(*parent);
                }
            }
        }
        parents
    }

    /// Parents excluded by the lower bound.
    pub fn boundary_parents(&self, id: Oid) -> Vec<Oid> {
        self.nodes
            .get(&id)
            .map(|node| {
                node.parents
                    .iter()
                    .filter(|p| !self.nodes.contains_key(*p))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct GraphWalker<'r> {
    repo: &'r Repository,
}

impl<'r> GraphWalker<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        Self { repo }
    }

    /// Walk the ancestors of `origin`, excluding `lower_bound` and its
    /// ancestors.
    pub fn walk(&self, origin: Oid, lower_bound: Option<Oid>) -> Result<CommitGraph> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(origin)?;
        if let Some(bound) = lower_bound {
            revwalk.hide(bound)?;
        }

        let mut nodes: HashMap<Oid, GraphNode> = HashMap::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;
            nodes.insert(
                oid,
                GraphNode {
                    parents: commit.parent_ids().collect(),
                    children: Vec::new(),
                    time: commit.time().seconds(),
                },
            );
        }

        // children adjacency and in-walk parent counts
        let mut pending: HashMap<Oid, usize> = HashMap::with_capacity(nodes.len());
        let mut edges: Vec<(Oid, Oid)> = Vec::new();
        for (&id, node) in &nodes {
            let mut seen: Vec<Oid> = Vec::with_capacity(node.parents.len());
            for parent in &node.parents {
                if nodes.contains_key(parent) && !seen.contains(parent) {
                    seen.push(*parent);
                    edges.push((*parent, id));
                }
            }
            pending.insert(id, seen.len());
        }
        for (parent, child) in edges {
            if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }
        for node in nodes.values_mut() {
            node.children.sort();
        }

        let mut ready: BinaryHeap<Reverse<(i64, Oid)>> = nodes
            .iter()
            .filter(|(id, _)| pending.get(*id) == Some(&0))
            .map(|(id, node)| Reverse((node.time, *id)))
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            let Some(node) = nodes.get(&id) else { continue };
            for child in &node.children {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        let time = nodes.get(child).map(|c| c.time).unwrap_or_default();
                        ready.push(Reverse((time, *child)));
                    }
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(SplitError::Internal(format!(
                "commit graph has a cycle: ordered {} of {} commits",
                order.len(),
                nodes.len()
            )));
        }

        tracing::debug!(
            "Walked {} commits from {}{}",
            order.len(),
            origin,
            lower_bound.map(|b| format!(" down to {}", b)).unwrap_or_default()
        );

        Ok(CommitGraph { order, nodes })
    }
}
