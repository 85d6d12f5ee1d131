//! Prefix mappings.
//!
//! - `Prefix`: one `from -> to` relocation, paths normalized
//! - `PrefixSet`: ordered, non-empty set with unique `to` paths

use serde::Serialize;
use std::fmt;

use crate::error::{Result, SplitError};

/// A source directory and the directory it is relocated to in the split
/// history. An empty path is the repository root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Prefix {
    pub from: String,
    pub to: String,
}

impl Prefix {
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            from: normalize_path(from)?,
            to: normalize_path(to)?,
        })
    }

    /// Parse the `from[:to]` form accepted on the command line.
    pub fn parse(value: &str) -> Result<Self> {
        match value.split_once(':') {
            Some((from, to)) => Self::new(from, to),
            None => Self::new(value, ""),
        }
    }

    pub fn from_segments(&self) -> Vec<&str> {
        segments(&self.from)
    }

    pub fn to_segments(&self) -> Vec<&str> {
        segments(&self.to)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: &str| if p.is_empty() { "(root)".to_string() } else { p.to_string() };
        write!(f, "{} -> {}", show(&self.from), show(&self.to))
    }
}

fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

/// Normalize a repository path: strip leading and trailing slashes, drop
/// empty and `.` segments. `..` is rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(SplitError::InvalidPrefix(path.to_string())),
            s => parts.push(s),
        }
    }
    Ok(parts.join("/"))
}

/// Ordered set of prefixes. No two prefixes share a `to` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PrefixSet {
    prefixes: Vec<Prefix>,
}

impl PrefixSet {
    pub fn new(prefixes: Vec<Prefix>) -> Result<Self> {
        if prefixes.is_empty() {
            return Err(SplitError::NoPrefix);
        }

        for (idx, prefix) in prefixes.iter().enumerate() {
            if let Some(previous) = prefixes[..idx].iter().find(|p| p.to == prefix.to) {
                return Err(SplitError::DuplicateTarget {
                    to: prefix.to.clone(),
                    first: previous.from.clone(),
                    second: prefix.from.clone(),
                });
            }
        }

        Ok(Self { prefixes })
    }

    /// Build a set from `from[:to]` strings.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let prefixes = values
            .iter()
            .map(|v| Prefix::parse(v.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(prefixes)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prefix> {
        self.prefixes.iter()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// A single prefix relocated to the root: the source subtree is the
    /// split tree as-is.
    pub fn is_simple(&self) -> bool {
        self.prefixes.len() == 1 && self.prefixes[0].to.is_empty()
    }

    /// Prefixes in canonical order. Placement never collides, so the order
    /// of the set does not change the split tree.
    pub fn normalized(&self) -> Vec<&Prefix> {
        let mut sorted: Vec<&Prefix> = self.prefixes.iter().collect();
        sorted.sort_by(|a, b| a.to.cmp(&b.to).then_with(|| a.from.cmp(&b.from)));
        sorted
    }
}

impl<'a> IntoIterator for &'a PrefixSet {
    type Item = &'a Prefix;
    type IntoIter = std::slice::Iter<'a, Prefix>;

    fn into_iter(self) -> Self::IntoIter {
        self.prefixes.iter()
    }
}
