//! `overlay` -- an overlay directory next to an underlying repository.
//!
//! `Overlay` ties together the object store, the mapping file and the configuration, and
//! offers the operations the command layer needs: recording a freshly created commit,
//! resolving revisions, walking history, reconstructing and verifying.

use crate::config::Config;
use crate::errors::*;
use crate::mapping::{MappingFile, Mappings};
use crate::reconstruct::{self, build_record, ReconstructReport};
use crate::repo::{Repository, SourceHead};
use crate::store::{CommitRecord, DiskStorage, Head, ObjectStore, RefKind, RefTransaction};
use crate::verify::{self, Verification};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

pub struct Overlay {
    config: Config,
    root: PathBuf,
    storage: DiskStorage,
    mappings: MappingFile,
}

impl Overlay {
    /// Open the overlay belonging to the repository whose working directory is `workdir`.
    /// Nothing is created on disk until something is written.
    pub fn open<P: AsRef<Path>>(workdir: P, config: Config) -> Overlay {
        let root = workdir.as_ref().join(&config.root_dir);
        let storage = DiskStorage::new(root.clone()).with_default_branch(&config.default_branch);
        let mappings = MappingFile::new(&root, config.legacy_mappings);
        Overlay {
            config,
            root,
            storage,
            mappings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &DiskStorage {
        &self.storage
    }

    pub fn mappings(&self) -> &MappingFile {
        &self.mappings
    }

    /// Record the overlay commit for `source_hash`, which the underlying repository has just
    /// created, binding it to `identity_key`.  The commit's overlay parents come from the
    /// mapping table.  The current branch (or a detached HEAD) is advanced to the new commit.
    /// An empty identity key is rejected, and nothing is written.
    pub fn record_commit<R: Repository>(
        &self,
        repo: &R,
        source_hash: &str,
        identity_key: &str,
    ) -> Result<CommitRecord> {
        if identity_key.is_empty() {
            return Err(Error::InvalidRecord(format!(
                "no identity key to bind {} to",
                source_hash
            )));
        }
        self.storage.initialize()?;
        let commit = repo.commit_by_hash(source_hash)?;
        let table = self.mappings.load()?;

        let parents = commit
            .parent_hashes
            .iter()
            .map(|parent| {
                table.lookup_overlay(parent).unwrap_or_else(|_| {
                    warn!("parent {} has no overlay hash; using its source hash", parent);
                    parent.clone()
                })
            })
            .collect();

        let scheme = self.config.hash_scheme;
        let mut record = build_record(&commit, "", parents, identity_key);
        record.overlay_hash = scheme.compute(&record.hash_input(), identity_key);
        record.set_scheme(scheme);
        self.storage.put(&record)?;
        self.mappings
            .append(&commit.hash, &record.overlay_hash, identity_key)?;

        let mut txn = RefTransaction::new(&self.storage);
        match repo.head_reference()? {
            SourceHead::Branch(branch) => {
                txn.update_ref(&branch, &record.overlay_hash);
                txn.set_head(Head::symbolic(&branch));
            }
            SourceHead::Detached(_) => txn.set_head(Head::Detached(record.overlay_hash.clone())),
        }
        txn.commit()?;

        info!(
            "recorded {} for {} ({})",
            record.overlay_hash, commit.hash, identity_key
        );
        Ok(record)
    }

    /// Resolve `HEAD`, a reference (`refs/...`, a branch or a tag name), a full overlay hash
    /// or an abbreviation of one to a full overlay hash.  Branches shadow tags, and both
    /// shadow hash prefixes.
    pub fn resolve_revision(&self, rev: &str) -> Result<String> {
        if rev == "HEAD" {
            return match self.storage.get_head()? {
                Head::Symbolic(name) => self.storage.get_ref(&name),
                Head::Detached(hash) => Ok(hash),
            };
        }
        if rev.starts_with("refs/") {
            return self.storage.get_ref(rev);
        }
        for kind in &[RefKind::Heads, RefKind::Tags] {
            match self.storage.get_ref(&format!("{}{}", kind.prefix(), rev)) {
                Ok(hash) => return Ok(hash),
                Err(ref e) if e.is_not_found() => {}
                Err(Error::InvalidRecord(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(self.storage.get(rev)?.overlay_hash)
    }

    /// Walk history breadth-first from `start`, visiting each commit once, returning at most
    /// `max_count` records.  Parents that cannot be loaded are skipped.
    pub fn log(&self, start: &str, max_count: usize) -> Result<Vec<CommitRecord>> {
        let mut result = vec![];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let first = self.storage.get(start)?;
        seen.insert(first.overlay_hash.clone());
        queue.push_back(first);

        while let Some(record) = queue.pop_front() {
            if result.len() >= max_count {
                break;
            }
            for parent in &record.parent_hashes {
                if !seen.insert(parent.clone()) {
                    continue;
                }
                match self.storage.get(parent) {
                    Ok(parent) => queue.push_back(parent),
                    Err(e) => warn!("cannot load parent {}: {}", parent, e),
                }
            }
            result.push(record);
        }
        Ok(result)
    }

    /// Rebuild the overlay from `repo` and the mapping file.
    pub fn reconstruct<R: Repository>(&self, repo: &R) -> Result<ReconstructReport> {
        let table = self.mappings.load()?;
        reconstruct::reconstruct(repo, &table, &self.storage, self.config.hash_scheme)
    }

    /// Verify everything reachable from HEAD.
    pub fn verify_head<R: Repository>(&self, repo: &R) -> Result<Verification> {
        let head = self.resolve_revision("HEAD")?;
        verify::verify(repo, &self.storage, &head)
    }
}
