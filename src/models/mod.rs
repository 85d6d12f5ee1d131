//! Data types shared by the split engine.
//!
//! - `prefix`: Prefix, PrefixSet
//! - `config`: SplitConfig, GitVersion, fingerprinting
//! - `commit`: Resolution (what a commit became), CommitSummary
//! - `tree`: EntryKind
//! - `result`: SplitResult progress counters, SplitSummary

pub mod commit;
pub mod config;
pub mod prefix;
pub mod result;
pub mod tree;

pub use commit::*;
pub use config::*;
pub use prefix::*;
pub use result::*;
pub use tree::*;
