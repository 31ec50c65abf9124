use super::{Branch, Repository, SourceCommit, SourceHead};
use crate::errors::*;
use std::collections::BTreeMap;

/// An underlying repository held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    commits: BTreeMap<String, SourceCommit>,
    branches: BTreeMap<String, String>,
    head: SourceHead,
}

impl MemoryRepository {
    /// An empty repository whose HEAD follows `master`.
    pub fn new() -> MemoryRepository {
        MemoryRepository {
            commits: BTreeMap::new(),
            branches: BTreeMap::new(),
            head: SourceHead::Branch("master".to_string()),
        }
    }

    /// Add a commit, keyed by its `hash`.
    pub fn add_commit(&mut self, commit: SourceCommit) {
        self.commits.insert(commit.hash.clone(), commit);
    }

    pub fn set_branch(&mut self, name: &str, tip: &str) {
        self.branches.insert(name.to_string(), tip.to_string());
    }

    pub fn set_head(&mut self, head: SourceHead) {
        self.head = head;
    }
}

impl Repository for MemoryRepository {
    fn commit_by_hash(&self, hash: &str) -> Result<SourceCommit> {
        self.commits
            .get(hash)
            .cloned()
            .ok_or_else(|| Error::NotFound(Missing::SourceCommit, hash.to_string()))
    }

    fn head_reference(&self) -> Result<SourceHead> {
        Ok(self.head.clone())
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        Ok(self
            .branches
            .iter()
            .map(|(name, tip)| Branch {
                name: name.clone(),
                tip: tip.clone(),
            })
            .collect())
    }
}
