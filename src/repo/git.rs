use super::{Branch, Repository, SourceCommit, SourceHead};
use crate::errors::*;
use crate::store::Signature;
use chrono::{FixedOffset, TimeZone};
use git2::{BranchType, ErrorCode, Oid};
use std::path::Path;

const HEADS_PREFIX: &str = "refs/heads/";

/// A git repository on disk, read through `git2`.
pub struct GitRepository {
    repo: git2::Repository,
}

impl GitRepository {
    /// Open the repository at or containing `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GitRepository> {
        let repo = git2::Repository::discover(path.as_ref())?;
        debug!("opened git repository at {}", repo.path().display());
        Ok(GitRepository { repo })
    }

    /// Wrap an already-open repository.
    pub fn from_repository(repo: git2::Repository) -> GitRepository {
        GitRepository { repo }
    }

    pub fn inner(&self) -> &git2::Repository {
        &self.repo
    }
}

fn convert_signature(sig: &git2::Signature) -> Result<Signature> {
    let time = sig.when();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).ok_or_else(|| {
        Error::InvalidRecord(format!("bad timezone offset {}", time.offset_minutes()))
    })?;
    let when = offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .ok_or_else(|| Error::InvalidRecord(format!("bad timestamp {}", time.seconds())))?;
    Ok(Signature::new(
        String::from_utf8_lossy(sig.name_bytes()),
        String::from_utf8_lossy(sig.email_bytes()),
        when,
    ))
}

impl Repository for GitRepository {
    fn commit_by_hash(&self, hash: &str) -> Result<SourceCommit> {
        let missing = || Error::NotFound(Missing::SourceCommit, hash.to_string());
        let oid = Oid::from_str(hash).map_err(|_| missing())?;
        let commit = match self.repo.find_commit(oid) {
            Ok(commit) => commit,
            Err(ref e) if e.code() == ErrorCode::NotFound => return Err(missing()),
            Err(e) => return Err(e.into()),
        };

        let author = convert_signature(&commit.author())?;
        let committer = convert_signature(&commit.committer())?;
        Ok(SourceCommit {
            hash: commit.id().to_string(),
            tree_hash: commit.tree_id().to_string(),
            parent_hashes: commit.parent_ids().map(|id| id.to_string()).collect(),
            author,
            committer,
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        })
    }

    fn head_reference(&self) -> Result<SourceHead> {
        let head = match self.repo.find_reference("HEAD") {
            Ok(head) => head,
            Err(ref e) if e.code() == ErrorCode::NotFound => {
                return Err(Error::NotFound(Missing::Head, "HEAD".to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(target) = head.symbolic_target() {
            let branch = if target.starts_with(HEADS_PREFIX) {
                &target[HEADS_PREFIX.len()..]
            } else {
                target
            };
            return Ok(SourceHead::Branch(branch.to_string()));
        }
        match head.target() {
            Some(oid) => Ok(SourceHead::Detached(oid.to_string())),
            None => Err(Error::NotFound(Missing::Head, "HEAD".to_string())),
        }
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        let mut result = vec![];
        for item in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = item?;
            let name = match branch.name()? {
                Some(name) => name.to_string(),
                None => {
                    warn!("skipping branch with a non-UTF-8 name");
                    continue;
                }
            };
            if let Some(oid) = branch.get().target() {
                result.push(Branch {
                    name,
                    tip: oid.to_string(),
                });
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}
