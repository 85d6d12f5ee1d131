//! Split configuration.
//!
//! - `SplitConfig`: everything one split run needs
//! - `GitVersion`: which `git subtree split` behaviour to reproduce
//!
//! The fingerprint scopes cache entries: it covers the prefixes and the
//! simulated version, the only inputs that change rewritten objects.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::error::{Result, SplitError};
use crate::models::PrefixSet;

/// Simulated `git subtree` generation.
///
/// Before git 1.8.2 a commit whose split tree matched any rewritten parent
/// was always dropped, and messages were rebuilt from subject and body.
/// Later versions keep a merge when the other side brings history the
/// identical parent does not already contain, and copy messages verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GitVersion {
    Legacy,
    #[default]
    Latest,
}

const LEGACY_CUTOFF: [u32; 3] = [1, 8, 2];

impl GitVersion {
    /// Parse a version tag: `latest`, a dotted version such as `2.30.1`,
    /// or `<1.8.2` meaning "any version older than".
    pub fn parse(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        if tag.is_empty() || tag.eq_ignore_ascii_case("latest") {
            return Ok(GitVersion::Latest);
        }

        let (older_than, version) = match tag.strip_prefix('<') {
            Some(rest) => (true, rest.trim()),
            None => (false, tag),
        };

        let mut parts = [0u32; 3];
        let mut count = 0;
        for piece in version.split('.') {
            if count == parts.len() {
                return Err(SplitError::InvalidVersion(tag.to_string()));
            }
            parts[count] = piece
                .parse()
                .map_err(|_| SplitError::InvalidVersion(tag.to_string()))?;
            count += 1;
        }

        let legacy = if older_than {
            parts <= LEGACY_CUTOFF
        } else {
            parts < LEGACY_CUTOFF
        };

        Ok(if legacy { GitVersion::Legacy } else { GitVersion::Latest })
    }

    /// Canonical tag, part of the fingerprint.
    pub fn tag(self) -> &'static str {
        match self {
            GitVersion::Legacy => "<1.8.2",
            GitVersion::Latest => "latest",
        }
    }

    /// Whether a merge keeps its commit when a non-identical parent brings
    /// history the identical parent lacks.
    pub fn preserves_merge_history(self) -> bool {
        matches!(self, GitVersion::Latest)
    }

    /// Whether messages are rebuilt as `subject\n\nbody`.
    pub fn reflows_messages(self) -> bool {
        matches!(self, GitVersion::Legacy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitConfig {
    pub path: PathBuf,
    pub origin: String,
    /// Lower bound: this commit and its ancestors are not walked.
    pub commit: Option<String>,
    pub prefixes: PrefixSet,
    pub target: Option<String>,
    pub git_version: GitVersion,
    pub scratch: bool,
    pub workers: usize,
}

impl SplitConfig {
    pub fn new<P: Into<PathBuf>>(path: P, prefixes: PrefixSet) -> Self {
        Self {
            path: path.into(),
            origin: "HEAD".to_string(),
            commit: None,
            prefixes,
            target: None,
            git_version: GitVersion::Latest,
            scratch: false,
            workers: 1,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_git_version(mut self, version: GitVersion) -> Self {
        self.git_version = version;
        self
    }

    pub fn with_scratch(mut self, scratch: bool) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Hex SHA-256 over the version tag and the normalized prefix set.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.git_version.tag().as_bytes());
        hasher.update([0u8]);
        for prefix in self.prefixes.normalized() {
            hasher.update(prefix.from.as_bytes());
            hasher.update([0u8]);
            hasher.update(prefix.to.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}
