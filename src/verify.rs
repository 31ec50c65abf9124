//! `verify` -- check the overlay graph against the underlying repository.
//!
//! Starting from one overlay hash, every reachable record is loaded, its source commit is
//! looked up, and its overlay hash is recomputed from the source commit's data together with
//! the record's own parents and identity key.  The walk never stops at the first problem: all
//! failures are collected and reported together.

use crate::errors::*;
use crate::hash::{HashInput, HashScheme};
use crate::repo::{Repository, SourceCommit};
use crate::store::{CommitRecord, ObjectStore, Signature};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// What is wrong with one overlay commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    /// No record is stored under this hash, though a reachable commit names it
    MissingRecord,
    /// The stored record could not be parsed
    Unreadable(String),
    /// The record's source commit could not be loaded
    MissingSource(String),
    /// The record declares a scheme version this crate does not know
    UnknownScheme(String),
    /// The record's `overlay_hash` field disagrees with the hash it is stored under
    KeyMismatch(String),
    /// A recorded field disagrees with the source commit
    FieldMismatch(&'static str),
    /// The recomputed overlay hash differs from the stored one
    HashMismatch { computed: String },
}

/// One failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub overlay_hash: String,
    pub problem: Problem,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let hash = &self.overlay_hash;
        match &self.problem {
            Problem::MissingRecord => write!(f, "{}: no such overlay commit", hash),
            Problem::Unreadable(err) => write!(f, "{}: unreadable record: {}", hash, err),
            Problem::MissingSource(err) => write!(f, "{}: source commit: {}", hash, err),
            Problem::UnknownScheme(tag) => write!(f, "{}: unknown hash version {:?}", hash, tag),
            Problem::KeyMismatch(field) => {
                write!(f, "{}: record claims overlay hash {}", hash, field)
            }
            Problem::FieldMismatch(field) => {
                write!(f, "{}: {} differs from the source commit", hash, field)
            }
            Problem::HashMismatch { computed } => {
                write!(f, "{}: recomputed hash is {}", hash, computed)
            }
        }
    }
}

/// The outcome of a verification run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verification {
    /// Number of distinct overlay hashes visited
    pub checked: usize,
    pub failures: Vec<Failure>,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn a failed verification into an `Integrity` error listing every failure.
    pub fn into_result(self) -> Result<Verification> {
        if self.is_valid() {
            return Ok(self);
        }
        let lines: Vec<String> = self.failures.iter().map(|f| f.to_string()).collect();
        Err(Error::Integrity(format!(
            "{} of {} commits failed verification:\n{}",
            self.failures.len(),
            self.checked,
            lines.join("\n")
        )))
    }

    fn fail(&mut self, overlay_hash: &str, problem: Problem) {
        let failure = Failure {
            overlay_hash: overlay_hash.to_string(),
            problem,
        };
        warn!("verification failed: {}", failure);
        self.failures.push(failure);
    }
}

/// Verify every overlay commit reachable from `start`.  Only storage faults that prevent
/// the walk itself are returned as errors; everything else is a `Failure` in the result.
pub fn verify<R, S>(repo: &R, storage: &S, start: &str) -> Result<Verification>
where
    R: Repository,
    S: ObjectStore,
{
    let mut result = Verification::default();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(hash) = queue.pop_front() {
        result.checked += 1;
        let record = match storage.get(&hash) {
            Ok(record) => record,
            Err(Error::NotFound(..)) | Err(Error::InvalidHash(_)) => {
                result.fail(&hash, Problem::MissingRecord);
                continue;
            }
            Err(Error::JSONError(e)) => {
                result.fail(&hash, Problem::Unreadable(e.to_string()));
                continue;
            }
            Err(e) => return Err(e),
        };

        for parent in &record.parent_hashes {
            if seen.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }

        check_record(repo, &hash, &record, &mut result);
    }

    info!(
        "verified {} commits from {}: {} failures",
        result.checked,
        start,
        result.failures.len()
    );
    Ok(result)
}

fn check_record<R: Repository>(
    repo: &R,
    hash: &str,
    record: &CommitRecord,
    result: &mut Verification,
) {
    if record.overlay_hash != hash {
        result.fail(hash, Problem::KeyMismatch(record.overlay_hash.clone()));
    }

    let scheme = match record.scheme() {
        Some(scheme) => scheme,
        None => {
            let tag = record.metadata.get(crate::hash::VERSION_KEY).cloned();
            result.fail(hash, Problem::UnknownScheme(tag.unwrap_or_default()));
            return;
        }
    };

    let source = match repo.commit_by_hash(&record.source_hash) {
        Ok(source) => source,
        Err(e) => {
            result.fail(hash, Problem::MissingSource(e.to_string()));
            return;
        }
    };

    if let Some(field) = mismatched_field(record, &source) {
        result.fail(hash, Problem::FieldMismatch(field));
    }

    let computed = recompute(scheme, record, &source);
    if computed != hash {
        result.fail(hash, Problem::HashMismatch { computed });
    }
}

/// The overlay hash of `source`, bound to the record's parents and identity key.
fn recompute(scheme: HashScheme, record: &CommitRecord, source: &SourceCommit) -> String {
    let input = HashInput {
        tree_hash: &source.tree_hash,
        parents: &record.parent_hashes,
        author: &source.author,
        committer: &source.committer,
        message: &source.message,
    };
    scheme.compute(&input, record.identity_key())
}

/// The first recorded field that disagrees with the source commit, if any.  The legacy
/// scheme does not hash the message, so this is what catches an edited message there.
fn mismatched_field(record: &CommitRecord, source: &SourceCommit) -> Option<&'static str> {
    if record.tree_hash != source.tree_hash {
        Some("tree")
    } else if record.parent_hashes.len() != source.parent_hashes.len() {
        Some("parent count")
    } else if record.message != source.message {
        Some("message")
    } else if !same_person(&record.author, &source.author) {
        Some("author")
    } else if !same_person(&record.committer, &source.committer) {
        Some("committer")
    } else if record.committer.pubkey != record.author.pubkey {
        // both signatures carry the identity key the hash is bound to
        Some("committer key")
    } else {
        None
    }
}

/// Same name, email, instant and timezone.  `DateTime` equality alone ignores the offset.
fn same_person(recorded: &Signature, source: &Signature) -> bool {
    recorded.name == source.name
        && recorded.email == source.email
        && recorded.when == source.when
        && recorded.when.offset() == source.when.offset()
}
