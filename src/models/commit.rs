use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use git2::Oid;
use serde::Serialize;

/// What an original commit became in the split history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Maps to `id`. `created` is false when the commit collapsed onto the
    /// rewrite of one of its parents.
    Commit { id: Oid, created: bool },
    /// Absent from the split history. Children attach to `parents`, the
    /// rewritten commits this one inherited.
    Elided { parents: Vec<Oid> },
}

impl Resolution {
    pub fn commit(&self) -> Option<Oid> {
        match self {
            Resolution::Commit { id, .. } => Some(*id),
            Resolution::Elided { .. } => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Resolution::Commit { created: true, .. })
    }

    /// Rewritten commits a child of this commit attaches to.
    pub fn inherited(&self) -> &[Oid] {
        match self {
            Resolution::Commit { id, .. } => std::slice::from_ref(id),
            Resolution::Elided { parents } => parents,
        }
    }

    /// Head of the split history when this commit is the split origin.
    pub fn head(&self) -> Option<Oid> {
        self.inherited().first().copied()
    }
}

/// Commit description for debug logs.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub oid: String,
    pub subject: String,
    pub author: String,
    pub time: String,
    pub parent_count: usize,
}

impl CommitSummary {
    pub fn from_commit(commit: &git2::Commit<'_>) -> Self {
        let time = commit.time();
        Self {
            oid: commit.id().to_string(),
            subject: commit.summary().unwrap_or("").to_string(),
            author: commit.author().name().unwrap_or("Unknown").to_string(),
            time: format_git_time(time.seconds(), time.offset_minutes()),
            parent_count: commit.parent_count(),
        }
    }
}

/// RFC 3339 rendering of a git timestamp in its recorded offset.
pub fn format_git_time(seconds: i64, offset_minutes: i32) -> String {
    let utc: DateTime<Utc> = match Utc.timestamp_opt(seconds, 0).single() {
        Some(t) => t,
        None => return seconds.to_string(),
    };
    match FixedOffset::east_opt(offset_minutes * 60) {
        Some(offset) => utc.with_timezone(&offset).to_rfc3339(),
        None => utc.to_rfc3339(),
    }
}
