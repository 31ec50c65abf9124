//! `reconstruct` -- rebuild the overlay from the underlying repository and a mapping table.
//!
//! This is what a fresh clone runs: the repository arrives with its commits, the mapping
//! table arrives from a peer, and the overlay records, branch refs and HEAD are derived from
//! the two.  Missing commits and unmapped branches are reported and skipped; an unreadable
//! repository or a detached HEAD with no mapping aborts the whole run.

use crate::errors::*;
use crate::hash::HashScheme;
use crate::mapping::Mappings;
use crate::repo::{Repository, SourceCommit, SourceHead};
use crate::store::{validate_ref, CommitRecord, Head, ObjectStore, ObjectType, RefTransaction};
use std::collections::BTreeMap;

/// What a reconstruction did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructReport {
    /// Overlay hashes of the records written by this run
    pub written: Vec<String>,
    /// Number of mapped records that were already present
    pub existing: usize,
    /// References set, as (fully qualified name, overlay hash)
    pub refs: Vec<(String, String)>,
    /// The HEAD that was written
    pub head: Option<Head>,
    /// Non-fatal problems, in the order they were found
    pub warnings: Vec<String>,
}

impl ReconstructReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Rebuild missing overlay records, branch refs and HEAD.
///
/// Records are stored under the overlay hash the mapping table names.  New records are tagged
/// with the hash scheme that reproduces that hash, trying `scheme` first; if no scheme does,
/// the record is tagged with `scheme` and a warning is reported.
pub fn reconstruct<R, M, S>(
    repo: &R,
    mappings: &M,
    storage: &S,
    scheme: HashScheme,
) -> Result<ReconstructReport>
where
    R: Repository,
    M: Mappings,
    S: ObjectStore,
{
    let mut report = ReconstructReport::default();
    storage.initialize()?;

    for mapping in mappings.records() {
        if storage.contains(&mapping.overlay_hash)? {
            report.existing += 1;
            continue;
        }

        let commit = match repo.commit_by_hash(&mapping.source_hash) {
            Ok(commit) => commit,
            Err(e) => {
                report.warn(format!(
                    "skipping {}: could not load source commit {}: {}",
                    mapping.overlay_hash, mapping.source_hash, e
                ));
                continue;
            }
        };

        let parents = overlay_parents(&commit, mappings, &mut report);
        let mut record =
            build_record(&commit, &mapping.overlay_hash, parents, &mapping.identity_key);
        match detect_scheme(&record, scheme) {
            Some(found) => record.set_scheme(found),
            None => {
                record.set_scheme(scheme);
                report.warn(format!(
                    "overlay hash {} does not match source commit {} under any scheme",
                    mapping.overlay_hash, mapping.source_hash
                ));
            }
        }

        if let Err(e) = storage.put(&record) {
            report.warn(format!(
                "skipping {}: could not store record for {}: {}",
                mapping.overlay_hash, mapping.source_hash, e
            ));
            continue;
        }
        debug!("reconstructed {} from {}", record.overlay_hash, commit.hash);
        report.written.push(record.overlay_hash);
    }

    // refs and HEAD go in last, once every object they could point at is written
    let mut txn = RefTransaction::new(storage);
    let mut staged = BTreeMap::new();
    for branch in repo.branches()? {
        let hash = match mappings.lookup_overlay(&branch.tip) {
            Ok(hash) => hash,
            Err(_) => {
                report.warn(format!(
                    "branch {} at {} has no mapping; leaving it unmapped",
                    branch.name, branch.tip
                ));
                continue;
            }
        };
        if !storage.contains(&hash)? {
            report.warn(format!(
                "branch {} maps to {}, which is not stored; leaving it unmapped",
                branch.name, hash
            ));
            continue;
        }
        let name = format!("refs/heads/{}", branch.name);
        if let Err(e) = validate_ref(&name) {
            report.warn(format!("skipping branch {}: {}", branch.name, e));
            continue;
        }
        txn.update_ref(&name, &hash);
        staged.insert(name, hash);
    }

    let head = match repo.head_reference()? {
        SourceHead::Branch(branch) => Head::symbolic(&branch),
        SourceHead::Detached(source) => {
            let hash = mappings.lookup_overlay(&source)?;
            if !storage.contains(&hash)? {
                report.warn(format!("detached HEAD {} is not stored", hash));
            }
            Head::Detached(hash)
        }
    };
    txn.set_head(head.clone());
    txn.commit()?;

    report.refs = staged.into_iter().collect();
    report.head = Some(head);
    info!(
        "reconstruction wrote {} records ({} already present), {} refs, {} warnings",
        report.written.len(),
        report.existing,
        report.refs.len(),
        report.warnings.len()
    );
    Ok(report)
}

/// Map the source parents of `commit` to overlay hashes, in order.  A parent without a
/// mapping keeps its source hash as a placeholder.
fn overlay_parents<M: Mappings>(
    commit: &SourceCommit,
    mappings: &M,
    report: &mut ReconstructReport,
) -> Vec<String> {
    commit
        .parent_hashes
        .iter()
        .map(|parent| match mappings.lookup_overlay(parent) {
            Ok(hash) => hash,
            Err(_) => {
                report.warn(format!(
                    "parent {} of {} has no mapping; using its source hash",
                    parent, commit.hash
                ));
                parent.clone()
            }
        })
        .collect()
}

/// Build the overlay record for `commit`, bound to `identity_key`.  The record carries no
/// scheme tag yet.
pub(crate) fn build_record(
    commit: &SourceCommit,
    overlay_hash: &str,
    parent_hashes: Vec<String>,
    identity_key: &str,
) -> CommitRecord {
    CommitRecord {
        object_type: ObjectType::Commit,
        overlay_hash: overlay_hash.to_string(),
        source_hash: commit.hash.clone(),
        tree_hash: commit.tree_hash.clone(),
        parent_hashes,
        author: commit.author.with_key(identity_key),
        committer: commit.committer.with_key(identity_key),
        message: commit.message.clone(),
        metadata: BTreeMap::new(),
    }
}

/// Find the scheme under which `record` hashes to its own overlay hash, trying `preferred`
/// first.
fn detect_scheme(record: &CommitRecord, preferred: HashScheme) -> Option<HashScheme> {
    let input = record.hash_input();
    let key = record.identity_key();
    let others = [HashScheme::V2, HashScheme::Legacy];
    std::iter::once(preferred)
        .chain(others.iter().cloned().filter(|s| *s != preferred))
        .find(|scheme| scheme.compute(&input, key) == record.overlay_hash)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mapping::MappingTable;
    use crate::repo::MemoryRepository;
    use crate::store::{LocalStorage, Signature};
    use crate::util::test::init_env_logger;
    use chrono::DateTime;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

    fn source(hash: &str, parents: &[&str], message: &str) -> SourceCommit {
        let when = DateTime::parse_from_rfc3339("2023-11-14T22:13:20+00:00").unwrap();
        let sig = Signature::new("Alice", "alice@example.com", when);
        SourceCommit {
            hash: hash.to_string(),
            tree_hash: TREE.to_string(),
            parent_hashes: parents.iter().map(|p| p.to_string()).collect(),
            author: sig.clone(),
            committer: sig,
            message: message.to_string(),
        }
    }

    /// Compute the overlay hash a commit would get, as the committing side does.
    fn overlay_hash(commit: &SourceCommit, parents: &[String], key: &str) -> String {
        let record = build_record(commit, "", parents.to_vec(), key);
        HashScheme::V2.compute(&record.hash_input(), key)
    }

    fn s(n: u8) -> String {
        format!("{:040x}", n)
    }

    /// A three-commit chain on `main`, mapped with keys idA, idA, idB.
    fn chain() -> (MemoryRepository, MappingTable, Vec<String>) {
        let mut repo = MemoryRepository::new();
        let mut table = MappingTable::new();
        let mut overlay: Vec<String> = vec![];
        let keys = ["idA", "idA", "idB"];
        for i in 0..3 {
            let parents: Vec<String> = if i == 0 { vec![] } else { vec![s(i)] };
            let parent_refs: Vec<&str> = parents.iter().map(|p| &p[..]).collect();
            let commit = source(&s(i + 1), &parent_refs, &format!("commit {}", i));
            let overlay_parents: Vec<String> = overlay.last().cloned().into_iter().collect();
            let hash = overlay_hash(&commit, &overlay_parents, keys[i as usize]);
            table.append(&commit.hash, &hash, keys[i as usize]);
            repo.add_commit(commit);
            overlay.push(hash);
        }
        repo.set_branch("main", &s(3));
        repo.set_head(SourceHead::Branch("main".to_string()));
        (repo, table, overlay)
    }

    #[test]
    fn rebuilds_chain() {
        init_env_logger();
        let (repo, table, overlay) = chain();
        let storage = LocalStorage::new();
        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();

        assert_eq!(report.written, overlay);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(storage.get_ref("refs/heads/main").unwrap(), overlay[2]);

        let head = storage.get_head_commit().unwrap();
        assert_eq!(head.overlay_hash, overlay[2]);
        assert_eq!(head.parent_hashes, vec![overlay[1].clone()]);
        assert_eq!(head.identity_key(), "idB");
        assert_eq!(head.scheme(), Some(HashScheme::V2));
    }

    #[test]
    fn second_run_changes_nothing() {
        let (repo, table, _) = chain();
        let storage = LocalStorage::new();
        reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        let records: Vec<_> = table
            .records()
            .iter()
            .map(|m| storage.get(&m.overlay_hash).unwrap())
            .collect();

        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.existing, 3);
        assert_eq!(storage.len(), 3);
        for record in records {
            assert_eq!(storage.get(&record.overlay_hash).unwrap(), record);
        }
    }

    #[test]
    fn missing_source_commit_is_skipped() {
        let (repo, mut table, _) = chain();
        table.append(&s(9), &s(10), "idC");
        let storage = LocalStorage::new();
        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert_eq!(report.written.len(), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(!storage.contains(&s(10)).unwrap());
    }

    #[test]
    fn unstorable_record_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = crate::store::DiskStorage::new(dir.path());
        let mut repo = MemoryRepository::new();
        let bad = source(&s(1), &[], "bad row");
        let good = source(&s(3), &[], "good row");
        let good_hash = overlay_hash(&good, &[], "idA");
        repo.add_commit(bad);
        repo.add_commit(good);
        repo.set_branch("master", &s(3));
        repo.set_branch("stray", &s(1));

        let mut table = MappingTable::new();
        // the disk store only accepts lowercase hex hashes
        table.append(&s(1), &"AB".repeat(20), "idA");
        table.append(&s(3), &good_hash, "idA");

        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert_eq!(report.written, vec![good_hash.clone()]);
        assert_eq!(
            report.refs,
            vec![("refs/heads/master".to_string(), good_hash.clone())]
        );
        // the bad row's scheme, its failed put, and the branch pointing at it
        assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
        assert_eq!(storage.get_ref("master").unwrap(), good_hash);
        assert!(storage.get_ref("stray").unwrap_err().is_not_found());
        assert_eq!(storage.get_head_commit().unwrap().overlay_hash, good_hash);
    }

    #[test]
    fn unmapped_parent_uses_placeholder() {
        let mut repo = MemoryRepository::new();
        let commit = source(&s(2), &[&s(1)], "orphan");
        repo.add_commit(commit);
        let table: MappingTable = vec![crate::mapping::MappingRecord::new(
            &s(2),
            &s(20),
            "idA",
        )]
        .into();
        let storage = LocalStorage::new();
        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();

        assert_eq!(storage.get(&s(20)).unwrap().parent_hashes, vec![s(1)]);
        // one for the parent, one for the hash that no scheme reproduces
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn unmapped_branch_is_skipped() {
        let (mut repo, table, overlay) = chain();
        repo.set_branch("stray", &s(42));
        let storage = LocalStorage::new();
        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert_eq!(
            report.refs,
            vec![("refs/heads/main".to_string(), overlay[2].clone())]
        );
        assert_eq!(report.warnings.len(), 1);
        assert!(storage.get_ref("stray").unwrap_err().is_not_found());
    }

    #[test]
    fn detached_head() {
        let (mut repo, table, overlay) = chain();
        repo.set_head(SourceHead::Detached(s(2)));
        let storage = LocalStorage::new();
        reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert_eq!(storage.get_head().unwrap(), Head::Detached(overlay[1].clone()));
    }

    #[test]
    fn detached_head_without_mapping_is_fatal() {
        let (mut repo, table, _) = chain();
        repo.set_head(SourceHead::Detached(s(77)));
        let storage = LocalStorage::new();
        match reconstruct(&repo, &table, &storage, HashScheme::V2) {
            Err(Error::NotFound(Missing::Mapping, hash)) => assert_eq!(hash, s(77)),
            other => panic!("expected missing mapping, got {:?}", other),
        }
        // no ref was moved
        assert!(storage.get_ref("main").unwrap_err().is_not_found());
    }

    #[test]
    fn legacy_hashes_are_tagged_legacy() {
        let mut repo = MemoryRepository::new();
        let commit = source(&s(1), &[], "root");
        let record = build_record(&commit, "", vec![], "idA");
        let hash = HashScheme::Legacy.compute(&record.hash_input(), "idA");
        repo.add_commit(commit);
        let mut table = MappingTable::new();
        table.append(&s(1), &hash, "idA");

        let storage = LocalStorage::new();
        let report = reconstruct(&repo, &table, &storage, HashScheme::V2).unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(storage.get(&hash).unwrap().scheme(), Some(HashScheme::Legacy));
    }
}
