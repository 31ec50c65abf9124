//! `repo` -- the underlying repository, as seen by the overlay.
//!
//! The overlay never reads trees or blobs; it needs commit metadata, the branch list and
//! HEAD.  `GitRepository` reads those from a git repository with `git2`;
//! `MemoryRepository` holds them in memory for tests and for embedding.

mod git;
mod memory;

pub use self::git::GitRepository;
pub use self::memory::MemoryRepository;

use crate::errors::*;
use crate::store::Signature;

/// A commit of the underlying repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCommit {
    /// The commit's own (source) hash
    pub hash: String,
    pub tree_hash: String,
    /// Source hashes of the parents, in the repository's parent order
    pub parent_hashes: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// Where the underlying repository's HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHead {
    /// HEAD follows a local branch, named without its `refs/heads/` prefix
    Branch(String),
    /// HEAD names a source commit directly
    Detached(String),
}

/// A local branch and the source hash at its tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub tip: String,
}

/// Read access to the underlying repository.
pub trait Repository {
    /// Look up a commit by its full source hash.  Fails with `NotFound(SourceCommit, ..)`.
    fn commit_by_hash(&self, hash: &str) -> Result<SourceCommit>;

    fn head_reference(&self) -> Result<SourceHead>;

    /// All local branches that point at a commit, sorted by name.
    fn branches(&self) -> Result<Vec<Branch>>;
}
