use super::abbrev::{self, Lookup, SHARD_LEN};
use super::object::CommitRecord;
use super::traits::{normalize_ref, validate_ref, Head, ObjectStore, RefKind};
use crate::errors::*;
use crate::hash::is_hex;
use crate::util::{read_optional, write_atomic};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const OBJECTS_DIR: &str = "objects";
pub const REFS_DIR: &str = "refs";
pub const MAPPINGS_DIR: &str = "mappings";
pub const HEAD_FILE: &str = "HEAD";
pub const DEFAULT_BRANCH: &str = "master";

/// DiskStorage keeps the overlay in a directory (conventionally `.mgit`) laid out as
///
/// ```text
/// objects/<2 hex>/<rest of hash>   one JSON file per commit record
/// refs/heads/<name>                overlay hash of a branch tip
/// refs/tags/<name>                 overlay hash of a tag
/// mappings/                        the mapping table (see `mapping::MappingFile`)
/// HEAD                             "ref: <refname>" or a detached overlay hash
/// ```
///
/// Sharding objects by their first two hex characters bounds the size of any one directory.
/// Every file is replaced by write-then-rename; there is no locking, so only one writer may
/// use a given directory at a time.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
    default_branch: String,
}

impl DiskStorage {
    /// Create a storage handle for the given overlay directory.  Nothing is touched on disk
    /// until `initialize` or a write.
    pub fn new<P: Into<PathBuf>>(root: P) -> DiskStorage {
        DiskStorage {
            root: root.into(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    /// Use the given branch for the HEAD that `initialize` creates.
    pub fn with_default_branch(mut self, branch: &str) -> DiskStorage {
        self.default_branch = branch.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.root.join(OBJECTS_DIR)
    }

    pub fn mappings_dir(&self) -> PathBuf {
        self.root.join(MAPPINGS_DIR)
    }

    fn head_path(&self) -> PathBuf {
        self.root.join(HEAD_FILE)
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        let (shard, rest) = hash.split_at(SHARD_LEN);
        self.objects_dir().join(shard).join(rest)
    }

    fn ref_path(&self, name: &str) -> Result<(String, PathBuf)> {
        let name = normalize_ref(name);
        validate_ref(&name)?;
        let mut path = self.root.clone();
        for part in name.split('/') {
            path.push(part);
        }
        Ok((name, path))
    }

    fn read_record(&self, hash: &str) -> Result<CommitRecord> {
        match read_optional(&self.object_path(hash))? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(Error::NotFound(Missing::Object, hash.to_string())),
        }
    }
}

impl ObjectStore for DiskStorage {
    fn initialize(&self) -> Result<()> {
        let dirs = [
            self.root.clone(),
            self.objects_dir(),
            self.root.join(REFS_DIR),
            self.root.join(RefKind::Heads.prefix()),
            self.root.join(RefKind::Tags.prefix()),
            self.mappings_dir(),
        ];
        for dir in dirs.iter() {
            fs::create_dir_all(dir)?;
        }

        let head = self.head_path();
        if !head.exists() {
            let content = Head::symbolic(&self.default_branch).to_string();
            write_atomic(&head, content.as_bytes())?;
            debug!("initialized overlay storage at {}", self.root.display());
        }
        Ok(())
    }

    fn put(&self, record: &CommitRecord) -> Result<()> {
        let hash = &record.overlay_hash;
        if hash.is_empty() {
            return Err(Error::InvalidRecord("overlay hash cannot be empty".to_string()));
        }
        if hash.len() <= SHARD_LEN || !is_hex(hash) || hash.to_ascii_lowercase() != *hash {
            return Err(Error::InvalidRecord(format!(
                "overlay hash {:?} is not a lowercase hex hash",
                hash
            )));
        }

        let path = self.object_path(hash);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &data)?;
        debug!("stored commit {}", hash);
        Ok(())
    }

    fn get(&self, hash_or_prefix: &str) -> Result<CommitRecord> {
        let hash = match abbrev::classify(hash_or_prefix)? {
            Lookup::Full(hash) => hash,
            Lookup::Prefix(prefix) => abbrev::resolve(&self.objects_dir(), &prefix)?,
        };
        self.read_record(&hash)
    }

    fn contains(&self, hash: &str) -> Result<bool> {
        if hash.len() <= SHARD_LEN || !is_hex(hash) {
            return Ok(false);
        }
        Ok(self.object_path(hash).is_file())
    }

    fn update_ref(&self, name: &str, hash: &str) -> Result<()> {
        let (name, path) = self.ref_path(name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        write_atomic(&path, hash.as_bytes())?;
        debug!("updated {} to {}", name, hash);
        Ok(())
    }

    fn get_ref(&self, name: &str) -> Result<String> {
        let (name, path) = self.ref_path(name)?;
        match read_optional(&path)? {
            Some(content) => Ok(content.trim().to_string()),
            None => Err(Error::NotFound(Missing::Reference, name)),
        }
    }

    fn list_refs(&self, kind: RefKind) -> Result<Vec<(String, String)>> {
        let mut refs = vec![];
        list_refs_under(&self.root.join(kind.prefix()), kind.prefix(), &mut refs)?;
        refs.sort();
        Ok(refs)
    }

    fn set_head(&self, head: &Head) -> Result<()> {
        if let Head::Symbolic(name) = head {
            validate_ref(&normalize_ref(name))?;
        }
        write_atomic(&self.head_path(), head.to_string().as_bytes())?;
        debug!("set HEAD to {}", head);
        Ok(())
    }

    fn get_head(&self) -> Result<Head> {
        match read_optional(&self.head_path())? {
            Some(content) => Ok(Head::parse(&content)),
            None => Err(Error::NotFound(Missing::Head, self.root.display().to_string())),
        }
    }
}

/// Walk a refs directory recursively, so that names like `feature/x` are found.
fn list_refs_under(dir: &Path, prefix: &str, refs: &mut Vec<(String, String)>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let name = match entry.file_name().to_str() {
            Some(name) if !name.starts_with('.') => name.to_string(),
            _ => continue,
        };
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            list_refs_under(&path, &format!("{}{}/", prefix, name), refs)?;
        } else {
            let hash = fs::read_to_string(&path)?;
            refs.push((format!("{}{}", prefix, name), hash.trim().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::super::object::{ObjectType, Signature};
    use super::*;
    use chrono::DateTime;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(hash: &str) -> CommitRecord {
        let when = DateTime::parse_from_rfc3339("2023-11-14T22:13:20+00:00").unwrap();
        let sig = Signature::new("Alice", "alice@example.com", when).with_key("idA");
        CommitRecord {
            object_type: ObjectType::Commit,
            overlay_hash: hash.to_string(),
            source_hash: "9f64a747e1b97f131fabb6b447296c9b6f0201e7".to_string(),
            tree_hash: "4b825dc642cb6eb9a060e54bf8d69288fbee4904".to_string(),
            parent_hashes: vec!["1".repeat(40), "2".repeat(40)],
            author: sig.clone(),
            committer: sig,
            message: "hello".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    fn storage() -> (TempDir, DiskStorage) {
        let dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(dir.path().join(".mgit"));
        storage.initialize().unwrap();
        (dir, storage)
    }

    #[test]
    fn initialize_layout() {
        let (_dir, storage) = storage();
        for sub in &["objects", "refs/heads", "refs/tags", "mappings"] {
            assert!(storage.root().join(sub).is_dir(), "{} missing", sub);
        }
        assert_eq!(
            storage.get_head().unwrap(),
            Head::Symbolic("refs/heads/master".to_string())
        );
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, storage) = storage();
        storage.set_head(&Head::symbolic("main")).unwrap();
        storage.initialize().unwrap();
        assert_eq!(storage.get_head().unwrap(), Head::symbolic("main"));
    }

    #[test]
    fn initialize_default_branch() {
        let dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(dir.path()).with_default_branch("trunk");
        storage.initialize().unwrap();
        assert_eq!(storage.get_head().unwrap(), Head::symbolic("trunk"));
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, storage) = storage();
        let rec = record(&"ab".repeat(20));
        storage.put(&rec).unwrap();
        assert_eq!(storage.get(&rec.overlay_hash).unwrap(), rec);
        assert!(storage
            .root()
            .join("objects/ab")
            .join("ab".repeat(19))
            .is_file());
    }

    #[test]
    fn put_rejects_empty_hash() {
        let (_dir, storage) = storage();
        match storage.put(&record("")) {
            Err(Error::InvalidRecord(_)) => {}
            other => panic!("expected invalid record, got {:?}", other),
        }
    }

    #[test]
    fn put_rejects_path_like_hash() {
        let (_dir, storage) = storage();
        assert!(storage.put(&record("../../evil")).is_err());
    }

    #[test]
    fn get_missing() {
        let (_dir, storage) = storage();
        assert!(storage.get(&"cd".repeat(20)).unwrap_err().is_not_found());
    }

    #[test]
    fn get_by_prefix() {
        let (_dir, storage) = storage();
        let hash = format!("abcdef{}", "0".repeat(34));
        storage.put(&record(&hash)).unwrap();
        for len in 4..hash.len() {
            assert_eq!(storage.get(&hash[..len]).unwrap().overlay_hash, hash);
        }
        assert!(storage.get("abcf").unwrap_err().is_not_found());
    }

    #[test]
    fn get_ambiguous_prefix() {
        let (_dir, storage) = storage();
        storage
            .put(&record(&format!("abcd1{}", "0".repeat(35))))
            .unwrap();
        storage
            .put(&record(&format!("abcd2{}", "0".repeat(35))))
            .unwrap();
        match storage.get("abcd") {
            Err(Error::Ambiguous { count: 2, .. }) => {}
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert!(storage.get("abcd1").is_ok());
    }

    #[test]
    fn get_short_prefix_rejected() {
        let (_dir, storage) = storage();
        match storage.get("abc") {
            Err(Error::InvalidHash(_)) => {}
            other => panic!("expected invalid hash, got {:?}", other),
        }
    }

    #[test]
    fn get_corrupt_object() {
        let (_dir, storage) = storage();
        let hash = "ef".repeat(20);
        fs::create_dir_all(storage.objects_dir().join("ef")).unwrap();
        fs::write(storage.object_path(&hash), b"not json").unwrap();
        match storage.get(&hash) {
            Err(Error::JSONError(_)) => {}
            other => panic!("expected JSON error, got {:?}", other),
        }
    }

    #[test]
    fn contains() {
        let (_dir, storage) = storage();
        let rec = record(&"ab".repeat(20));
        assert!(!storage.contains(&rec.overlay_hash).unwrap());
        storage.put(&rec).unwrap();
        assert!(storage.contains(&rec.overlay_hash).unwrap());
        assert!(!storage.contains("ab").unwrap());
    }

    #[test]
    fn refs_normalized() {
        let (_dir, storage) = storage();
        storage.update_ref("main", "1234").unwrap();
        assert_eq!(storage.get_ref("refs/heads/main").unwrap(), "1234");
        assert_eq!(
            fs::read_to_string(storage.root().join("refs/heads/main")).unwrap(),
            "1234"
        );
        storage.update_ref("refs/tags/v1", "5678").unwrap();
        assert_eq!(storage.get_ref("refs/tags/v1").unwrap(), "5678");
    }

    #[test]
    fn ref_missing() {
        let (_dir, storage) = storage();
        match storage.get_ref("nope") {
            Err(Error::NotFound(Missing::Reference, name)) => assert_eq!(name, "refs/heads/nope"),
            other => panic!("expected missing ref, got {:?}", other),
        }
    }

    #[test]
    fn ref_traversal_rejected() {
        let (_dir, storage) = storage();
        assert!(storage.update_ref("../../HEAD", "1234").is_err());
    }

    #[test]
    fn list_refs_nested() {
        let (_dir, storage) = storage();
        storage.update_ref("main", "1").unwrap();
        storage.update_ref("feature/x", "2").unwrap();
        storage.update_ref("refs/tags/v1", "3").unwrap();
        assert_eq!(
            storage.list_refs(RefKind::Heads).unwrap(),
            vec![
                ("refs/heads/feature/x".to_string(), "2".to_string()),
                ("refs/heads/main".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(storage.list_refs(RefKind::Tags).unwrap().len(), 1);
    }

    #[test]
    fn head_commit_symbolic_and_detached() {
        let (_dir, storage) = storage();
        let rec = record(&"ab".repeat(20));
        storage.put(&rec).unwrap();

        storage.update_ref("main", &rec.overlay_hash).unwrap();
        storage.set_head(&Head::symbolic("main")).unwrap();
        assert_eq!(storage.get_head_commit().unwrap(), rec);

        storage
            .set_head(&Head::Detached(rec.overlay_hash.clone()))
            .unwrap();
        assert_eq!(
            fs::read_to_string(storage.root().join("HEAD")).unwrap(),
            rec.overlay_hash
        );
        assert_eq!(storage.get_head_commit().unwrap(), rec);
    }

    #[test]
    fn head_commit_unborn_branch() {
        let (_dir, storage) = storage();
        assert!(storage.get_head_commit().unwrap_err().is_not_found());
    }

    #[test]
    fn head_missing_before_initialize() {
        let dir = TempDir::new().unwrap();
        let storage = DiskStorage::new(dir.path().join(".mgit"));
        match storage.get_head() {
            Err(Error::NotFound(Missing::Head, _)) => {}
            other => panic!("expected missing HEAD, got {:?}", other),
        }
    }
}
