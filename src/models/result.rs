//! Split progress and outcome.
//!
//! `SplitResult` is written by the rewriter and polled by a progress
//! reporter on another thread. Counters are plain atomics so a reader never
//! waits on the pipeline; the head and timing sit behind a lock that is only
//! taken at the start and end of a run.

use git2::Oid;
use serde::Serialize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Timing {
    start: Instant,
    end: Option<Instant>,
    head: Option<Oid>,
}

#[derive(Debug)]
pub struct SplitResult {
    created: AtomicU64,
    traversed: AtomicU64,
    timing: RwLock<Timing>,
}

impl Default for SplitResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitResult {
    pub fn new() -> Self {
        Self {
            created: AtomicU64::new(0),
            traversed: AtomicU64::new(0),
            timing: RwLock::new(Timing {
                start: Instant::now(),
                end: None,
                head: None,
            }),
        }
    }

    /// Commits in the split history, whether written by this run or found
    /// in the cache.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Commits visited by the walk, cache hits included.
    pub fn traversed(&self) -> u64 {
        self.traversed.load(Ordering::Relaxed)
    }

    /// Time since the run started, frozen once it finished.
    pub fn duration(&self) -> Duration {
        match self.timing.read() {
            Ok(timing) => match timing.end {
                Some(end) => end.duration_since(timing.start),
                None => timing.start.elapsed(),
            },
            Err(_) => Duration::ZERO,
        }
    }

    /// Head of the split history; `None` until a run completes, and after a
    /// run where nothing matched the prefixes.
    pub fn head(&self) -> Option<Oid> {
        self.timing.read().ok().and_then(|t| t.head)
    }

    pub fn is_finished(&self) -> bool {
        self.timing.read().map(|t| t.end.is_some()).unwrap_or(false)
    }

    /// Start a run: counters, head and timing all start over.
    pub(crate) fn begin(&self) {
        self.created.store(0, Ordering::Relaxed);
        self.traversed.store(0, Ordering::Relaxed);
        if let Ok(mut timing) = self.timing.write() {
            timing.start = Instant::now();
            timing.end = None;
            timing.head = None;
        }
    }

    pub(crate) fn inc_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_traversed(&self) {
        self.traversed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finish(&self, head: Option<Oid>) {
        if let Ok(mut timing) = self.timing.write() {
            timing.end = Some(Instant::now());
            timing.head = head;
        }
    }

    pub fn summary(&self) -> SplitSummary {
        SplitSummary {
            created: self.created(),
            traversed: self.traversed(),
            elapsed_ms: self.duration().as_millis(),
            head: self.head().map(|oid| oid.to_string()),
        }
    }
}

/// Serializable snapshot of a `SplitResult`.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub created: u64,
    pub traversed: u64,
    pub elapsed_ms: u128,
    pub head: Option<String>,
}
