use super::abbrev::{self, Lookup};
use super::object::CommitRecord;
use super::storage::DEFAULT_BRANCH;
use super::traits::{normalize_ref, validate_ref, Head, ObjectStore, RefKind};
use crate::errors::*;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// LocalStorage provides an in-memory `ObjectStore`, with the same hash, reference and HEAD
/// semantics as `DiskStorage`.  It is useful in tests and wherever an overlay is only needed
/// transiently.
#[derive(Debug)]
pub struct LocalStorage {
    objects: RefCell<BTreeMap<String, CommitRecord>>,
    refs: RefCell<BTreeMap<String, String>>,
    head: RefCell<Option<Head>>,
    default_branch: String,
}

impl LocalStorage {
    /// Create a new, empty storage pool.
    pub fn new() -> LocalStorage {
        LocalStorage {
            objects: RefCell::new(BTreeMap::new()),
            refs: RefCell::new(BTreeMap::new()),
            head: RefCell::new(None),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }
}

impl ObjectStore for LocalStorage {
    fn initialize(&self) -> Result<()> {
        let mut head = self.head.borrow_mut();
        if head.is_none() {
            *head = Some(Head::symbolic(&self.default_branch));
        }
        Ok(())
    }

    fn put(&self, record: &CommitRecord) -> Result<()> {
        if record.overlay_hash.is_empty() {
            return Err(Error::InvalidRecord("overlay hash cannot be empty".to_string()));
        }
        self.objects
            .borrow_mut()
            .insert(record.overlay_hash.clone(), record.clone());
        Ok(())
    }

    fn get(&self, hash_or_prefix: &str) -> Result<CommitRecord> {
        let objects = self.objects.borrow();
        let hash = match abbrev::classify(hash_or_prefix)? {
            Lookup::Full(hash) => hash,
            Lookup::Prefix(prefix) => {
                let matches = objects
                    .range(prefix.clone()..)
                    .take_while(|(hash, _)| hash.starts_with(&prefix))
                    .map(|(hash, _)| hash.clone())
                    .collect();
                abbrev::pick(&prefix, matches)?
            }
        };
        objects
            .get(&hash)
            .cloned()
            .ok_or_else(|| Error::NotFound(Missing::Object, hash))
    }

    fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.objects.borrow().contains_key(hash))
    }

    fn update_ref(&self, name: &str, hash: &str) -> Result<()> {
        let name = normalize_ref(name);
        validate_ref(&name)?;
        self.refs.borrow_mut().insert(name, hash.to_string());
        Ok(())
    }

    fn get_ref(&self, name: &str) -> Result<String> {
        let name = normalize_ref(name);
        self.refs
            .borrow()
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::NotFound(Missing::Reference, name))
    }

    fn list_refs(&self, kind: RefKind) -> Result<Vec<(String, String)>> {
        Ok(self
            .refs
            .borrow()
            .iter()
            .filter(|(name, _)| name.starts_with(kind.prefix()))
            .map(|(name, hash)| (name.clone(), hash.clone()))
            .collect())
    }

    fn set_head(&self, head: &Head) -> Result<()> {
        if let Head::Symbolic(name) = head {
            validate_ref(&normalize_ref(name))?;
        }
        *self.head.borrow_mut() = Some(head.clone());
        Ok(())
    }

    fn get_head(&self) -> Result<Head> {
        self.head
            .borrow()
            .clone()
            .ok_or_else(|| Error::NotFound(Missing::Head, "in-memory storage".to_string()))
    }
}
