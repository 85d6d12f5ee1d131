//! Split one or more directories out of a repository's history.
//!
//! The engine walks the commit graph of an origin reference parent-first,
//! filters each commit's tree down to the configured prefixes, and writes a
//! new history that keeps authorship, messages and merge shape. Every
//! rewritten commit is recorded in a cache inside the repository, so later
//! runs only rewrite what changed.
//!
//! ```no_run
//! use subtree_split::{PrefixSet, SplitConfig, SplitResult, split};
//!
//! let prefixes = PrefixSet::parse(&["lib"])?;
//! let config = SplitConfig::new("/path/to/repo", prefixes).with_target("lib-only");
//! let result = SplitResult::new();
//! split(&config, &result)?;
//! println!("{:?}", result.head());
//! # Ok::<(), subtree_split::SplitError>(())
//! ```

pub mod error;
pub mod git;
pub mod models;

pub use error::{Result, SplitError};
pub use git::{SplitCache, split};
pub use models::{GitVersion, Prefix, PrefixSet, Resolution, SplitConfig, SplitResult};
