use git2::{Oid, Signature as GitSignature, Time};
use mgit_overlay::repo::SourceHead;
use mgit_overlay::util::test::init_env_logger;
use mgit_overlay::{Config, GitRepository, Missing, Overlay, Repository};
use tempfile::TempDir;

/// Create a repository with two commits on its default branch.
fn two_commits(dir: &TempDir) -> (git2::Repository, Oid, Oid) {
    let repo = git2::Repository::init(dir.path()).unwrap();
    let (first, second) = {
        let sig = GitSignature::new("Alice", "alice@example.com", &Time::new(1_700_000_000, 60))
            .unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let first = repo
            .commit(Some("HEAD"), &sig, &sig, "first\n", &tree, &[])
            .unwrap();
        let parent = repo.find_commit(first).unwrap();
        let second = repo
            .commit(Some("HEAD"), &sig, &sig, "second\n", &tree, &[&parent])
            .unwrap();
        (first, second)
    };
    (repo, first, second)
}

fn current_branch(repo: &git2::Repository) -> String {
    repo.head().unwrap().shorthand().unwrap().to_string()
}

#[test]
fn reads_commits() {
    init_env_logger();
    let dir = TempDir::new().unwrap();
    let (_, first, second) = two_commits(&dir);
    let repo = GitRepository::open(dir.path()).unwrap();

    let commit = repo.commit_by_hash(&second.to_string()).unwrap();
    assert_eq!(commit.hash, second.to_string());
    assert_eq!(commit.parent_hashes, vec![first.to_string()]);
    assert_eq!(commit.tree_hash, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    assert_eq!(commit.message, "second\n");
    assert_eq!(commit.author.name, "Alice");
    assert_eq!(commit.author.when.timestamp(), 1_700_000_000);
    assert_eq!(commit.author.when.offset().local_minus_utc(), 3600);
}

#[test]
fn missing_commit() {
    let dir = TempDir::new().unwrap();
    two_commits(&dir);
    let repo = GitRepository::open(dir.path()).unwrap();
    match repo.commit_by_hash(&"f".repeat(40)) {
        Err(mgit_overlay::Error::NotFound(Missing::SourceCommit, _)) => {}
        other => panic!("expected a missing commit, got {:?}", other),
    }
    assert!(repo.commit_by_hash("not-a-hash").unwrap_err().is_not_found());
}

#[test]
fn head_and_branches() {
    let dir = TempDir::new().unwrap();
    let (git, first, second) = two_commits(&dir);
    let branch = current_branch(&git);
    let repo = GitRepository::open(dir.path()).unwrap();

    assert_eq!(repo.head_reference().unwrap(), SourceHead::Branch(branch.clone()));
    let branches = repo.branches().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, branch);
    assert_eq!(branches[0].tip, second.to_string());

    git.set_head_detached(first).unwrap();
    assert_eq!(
        repo.head_reference().unwrap(),
        SourceHead::Detached(first.to_string())
    );
}

#[test]
fn record_then_reconstruct_elsewhere() {
    let dir = TempDir::new().unwrap();
    let (git, first, second) = two_commits(&dir);
    let branch = current_branch(&git);
    let repo = GitRepository::open(dir.path()).unwrap();

    let overlay = Overlay::open(dir.path(), Config::default());
    let root = overlay
        .record_commit(&repo, &first.to_string(), "npub1alice")
        .unwrap();
    let tip = overlay
        .record_commit(&repo, &second.to_string(), "npub1alice")
        .unwrap();
    assert_eq!(tip.parent_hashes, vec![root.overlay_hash.clone()]);
    assert!(overlay.verify_head(&repo).unwrap().is_valid());

    // a peer with the same git history and the mapping table rebuilds the same overlay
    let peer_dir = TempDir::new().unwrap();
    let peer = Overlay::open(peer_dir.path(), Config::default());
    peer.mappings()
        .replace_all(&overlay.mappings().load().unwrap())
        .unwrap();
    let report = peer.reconstruct(&repo).unwrap();
    assert_eq!(report.written.len(), 2);
    assert_eq!(
        report.refs,
        vec![(format!("refs/heads/{}", branch), tip.overlay_hash.clone())]
    );
    assert_eq!(peer.resolve_revision("HEAD").unwrap(), tip.overlay_hash);
    assert!(peer.verify_head(&repo).unwrap().is_valid());
}
