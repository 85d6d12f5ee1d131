#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use git2::{Oid, Repository, Signature, Time, TreeWalkMode, TreeWalkResult};
use subtree_split::{GitVersion, PrefixSet, SplitConfig, SplitResult};

/// Scratch repository with hand-built history. Commits never touch the
/// work tree, every file is written straight into the object database.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

#[derive(Default)]
struct Dir {
    files: BTreeMap<String, Oid>,
    dirs: BTreeMap<String, Dir>,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit `files` (`path -> content`) on top of `parents`. `time` drives
    /// both signatures, so equal inputs give equal ids across repositories.
    pub fn commit(&self, parents: &[Oid], files: &[(&str, &str)], message: &str, time: i64) -> Oid {
        let tree_id = self.tree(files);
        let tree = self.repo.find_tree(tree_id).unwrap();
        let author = Signature::new("Ann Author", "ann@example.com", &Time::new(time, 60)).unwrap();
        let committer = Signature::new("Cid Committer", "cid@example.com", &Time::new(time + 5, -120)).unwrap();
        let parents: Vec<git2::Commit<'_>> = parents.iter().map(|p| self.repo.find_commit(*p).unwrap()).collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        self.repo
            .commit(None, &author, &committer, message, &tree, &parent_refs)
            .unwrap()
    }

    /// Point a detached `HEAD` at `id`.
    pub fn checkout(&self, id: Oid) {
        self.repo.set_head_detached(id).unwrap();
    }

    pub fn branch(&self, name: &str, id: Oid) {
        self.repo.reference(&format!("refs/heads/{}", name), id, true, "test").unwrap();
    }

    /// `path -> content` of every blob in the commit's tree.
    pub fn files(&self, commit: Oid) -> Vec<(String, String)> {
        let tree = self.repo.find_commit(commit).unwrap().tree().unwrap();
        let mut out = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                let blob = self.repo.find_blob(entry.id()).unwrap();
                out.push((
                    format!("{}{}", dir, entry.name().unwrap()),
                    String::from_utf8_lossy(blob.content()).to_string(),
                ));
            }
            TreeWalkResult::Ok
        })
        .unwrap();
        out.sort();
        out
    }

    pub fn parents(&self, commit: Oid) -> Vec<Oid> {
        self.repo.find_commit(commit).unwrap().parent_ids().collect()
    }

    /// Every commit reachable from `head`.
    pub fn history(&self, head: Oid) -> Vec<Oid> {
        let mut walk = self.repo.revwalk().unwrap();
        walk.push(head).unwrap();
        walk.map(|id| id.unwrap()).collect()
    }

    pub fn config(&self, prefixes: &[&str]) -> SplitConfig {
        SplitConfig::new(self.path(), PrefixSet::parse(prefixes).unwrap())
    }

    pub fn split(&self, config: &SplitConfig) -> SplitResult {
        let result = SplitResult::new();
        subtree_split::split(config, &result).unwrap();
        result
    }

    /// Split `origin` from scratch with the default settings.
    pub fn split_fresh(&self, prefixes: &[&str], origin: Oid, version: GitVersion) -> SplitResult {
        let config = self
            .config(prefixes)
            .with_origin(origin.to_string())
            .with_git_version(version)
            .with_scratch(true);
        self.split(&config)
    }

    fn tree(&self, files: &[(&str, &str)]) -> Oid {
        let mut root = Dir::default();
        for (path, content) in files {
            let segments: Vec<&str> = path.split('/').collect();
            let (name, dirs) = segments.split_last().unwrap();
            let mut dir = &mut root;
            for segment in dirs {
                dir = dir.dirs.entry(segment.to_string()).or_default();
            }
            let blob = self.repo.blob(content.as_bytes()).unwrap();
            dir.files.insert(name.to_string(), blob);
        }
        self.write_dir(&root)
    }

    fn write_dir(&self, dir: &Dir) -> Oid {
        let mut builder = self.repo.treebuilder(None).unwrap();
        for (name, sub) in &dir.dirs {
            builder.insert(name.as_str(), self.write_dir(sub), 0o040000).unwrap();
        }
        for (name, blob) in &dir.files {
            builder.insert(name.as_str(), *blob, 0o100644).unwrap();
        }
        builder.write().unwrap()
    }
}

/// Sorted owned copy of `path -> content` pairs, to compare with `files`.
pub fn owned(files: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect();
    out.sort();
    out
}
