//! Prefix filtering of trees.
//!
//! `PrefixFilterer` turns a commit's root tree into the split tree: the
//! subtree found at each prefix's `from` path is grafted under its `to` path
//! and the grafts are merged into one tree.
//!
//! Subtrees that are grafted whole keep their original ids, file modes
//! included; only the directories where grafts meet are rebuilt. `TreeBuilder` writes entries in
//! git's canonical order, so the same input always yields the same id.

use git2::{ErrorCode, Oid, Repository, Tree};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SplitError};
use crate::models::{EntryKind, Prefix, PrefixSet};

pub struct PrefixFilterer<'a> {
    prefixes: &'a PrefixSet,
}

impl<'a> PrefixFilterer<'a> {
    pub fn new(prefixes: &'a PrefixSet) -> Self {
        Self { prefixes }
    }

    /// Filter `tree_id` down to the configured prefixes.
    ///
    /// Returns `None` when no prefix exists in the tree. A prefix that
    /// exists but is empty still yields `Some(empty tree)`.
    pub fn filter(&self, repo: &Repository, tree_id: Oid) -> Result<Option<Oid>> {
        let root = repo.find_tree(tree_id)?;

        if self.prefixes.is_simple() {
            let prefix = self.prefixes.iter().next().ok_or(SplitError::NoPrefix)?;
            return locate_subtree(repo, &root, prefix);
        }

        let mut merged = DirNode::default();
        let mut matched = false;

        for prefix in self.prefixes {
            let Some(subtree) = locate_subtree(repo, &root, prefix)? else {
                continue;
            };
            matched = true;
            merged.graft(repo, &prefix.to_segments(), subtree, "")?;
        }

        if !matched {
            return Ok(None);
        }

        Ok(Some(merged.write(repo)?))
    }
}

/// Find the tree at `prefix.from`. `None` when the path is missing or is
/// not a directory.
fn locate_subtree(repo: &Repository, root: &Tree<'_>, prefix: &Prefix) -> Result<Option<Oid>> {
    if prefix.from.is_empty() {
        return Ok(Some(root.id()));
    }

    let entry = match root.get_path(Path::new(&prefix.from)) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match EntryKind::from_filemode(entry.filemode()) {
        Some(EntryKind::Tree) => {
            // make sure the subtree is readable before handing out its id
            repo.find_tree(entry.id())?;
            Ok(Some(entry.id()))
        }
        Some(_) => {
            tracing::debug!("{} is not a directory, skipping", prefix.from);
            Ok(None)
        }
        None => Err(SplitError::InvalidEntry {
            path: prefix.from.clone(),
            mode: entry.filemode(),
        }),
    }
}

enum Node {
    Leaf { kind: EntryKind, id: Oid },
    Dir(DirNode),
}

/// A directory under construction.
///
/// Either a whole existing tree (`base`, no children) or a set of children
/// to be written as a new tree. Never both.
#[derive(Default)]
struct DirNode {
    base: Option<Oid>,
    children: BTreeMap<Vec<u8>, Node>,
}

impl DirNode {
    fn graft(&mut self, repo: &Repository, segments: &[&str], tree: Oid, path: &str) -> Result<()> {
        let Some((head, rest)) = segments.split_first() else {
            if self.base.is_none() && self.children.is_empty() {
                self.base = Some(tree);
                return Ok(());
            }
            self.expand(repo, path)?;
            return self.absorb(repo, tree, path);
        };

        self.expand(repo, path)?;
        let child_path = join(path, head);
        let child = self
            .children
            .entry(head.as_bytes().to_vec())
            .or_insert_with(|| Node::Dir(DirNode::default()));

        match child {
            Node::Dir(dir) => dir.graft(repo, rest, tree, &child_path),
            Node::Leaf { .. } => Err(SplitError::PathCollision(child_path)),
        }
    }

    /// Replace `base` by its entries so more content can be merged in.
    fn expand(&mut self, repo: &Repository, path: &str) -> Result<()> {
        match self.base.take() {
            Some(base) => self.absorb(repo, base, path),
            None => Ok(()),
        }
    }

    fn absorb(&mut self, repo: &Repository, tree_id: Oid, path: &str) -> Result<()> {
        let tree = repo.find_tree(tree_id)?;

        for entry in tree.iter() {
            let name = entry.name_bytes().to_vec();
            let entry_path = join(path, &String::from_utf8_lossy(&name));
            let kind = EntryKind::from_filemode(entry.filemode()).ok_or_else(|| SplitError::InvalidEntry {
                path: entry_path.clone(),
                mode: entry.filemode(),
            })?;

            match self.children.get_mut(&name) {
                None => {
                    let node = if kind.is_tree() {
                        Node::Dir(DirNode {
                            base: Some(entry.id()),
                            children: BTreeMap::new(),
                        })
                    } else {
                        Node::Leaf { kind, id: entry.id() }
                    };
                    self.children.insert(name, node);
                }
                Some(Node::Dir(existing)) if kind.is_tree() => {
                    existing.graft(repo, &[], entry.id(), &entry_path)?;
                }
                Some(_) => return Err(SplitError::PathCollision(entry_path)),
            }
        }

        Ok(())
    }

    fn write(self, repo: &Repository) -> Result<Oid> {
        if self.children.is_empty() {
            if let Some(base) = self.base {
                return Ok(base);
            }
        }

        let mut builder = repo.treebuilder(None)?;
        for (name, node) in self.children {
            let (id, mode) = match node {
                Node::Leaf { kind, id } => (id, kind.filemode()),
                Node::Dir(dir) => (dir.write(repo)?, EntryKind::Tree.filemode()),
            };
            builder.insert(name, id, mode)?;
        }
        Ok(builder.write()?)
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}
