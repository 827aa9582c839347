pub mod ci;
pub mod git;
pub mod tree;

pub use ci::{CiError, signal_pull_request};
pub use git::{Git, GitError};
pub use tree::{SyncTrees, TreeError};
