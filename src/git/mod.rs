pub mod cache;
pub mod filter;
pub mod history;
pub mod repository;
pub mod rewrite;
pub mod splitter;
pub mod wavefront;

pub use cache::SplitCache;
pub use filter::PrefixFilterer;
pub use history::{CommitGraph, GraphWalker};
pub use repository::GitRepository;
pub use rewrite::CommitRewriter;
pub use splitter::split;
