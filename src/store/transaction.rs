//! Staged reference and HEAD updates.

use super::traits::{Head, ObjectStore};
use crate::errors::*;

/// A RefTransaction collects reference and HEAD updates and applies them only when
/// committed.  Between creation and commit, write every object the staged references will
/// point to; a crash before `commit` then leaves the old references in place rather than
/// references to objects that were never written.
///
/// Dropping an uncommitted transaction discards whatever it staged.
///
/// # Examples
///
/// ```
/// use mgit_overlay::store::{Head, LocalStorage, ObjectStore, RefTransaction};
///
/// let storage = LocalStorage::new();
/// let mut txn = RefTransaction::new(&storage);
/// txn.update_ref("main", "0123456789abcdef0123456789abcdef01234567");
/// txn.set_head(Head::symbolic("main"));
/// assert!(storage.get_ref("main").is_err());
///
/// txn.commit().unwrap();
/// assert_eq!(storage.get_head().unwrap(), Head::symbolic("main"));
/// ```
pub struct RefTransaction<'a, S: 'a + ObjectStore> {
    storage: &'a S,
    refs: Vec<(String, String)>,
    head: Option<Head>,
}

impl<'a, S: 'a + ObjectStore> RefTransaction<'a, S> {
    pub fn new(storage: &'a S) -> RefTransaction<'a, S> {
        RefTransaction {
            storage,
            refs: vec![],
            head: None,
        }
    }

    /// Stage a reference update.  A later update of the same name wins.
    pub fn update_ref(&mut self, name: &str, hash: &str) {
        self.refs.retain(|(n, _)| n != name);
        self.refs.push((name.to_string(), hash.to_string()));
    }

    /// Stage a HEAD update, applied after all reference updates.
    pub fn set_head(&mut self, head: Head) {
        self.head = Some(head);
    }

    /// Number of staged updates, counting HEAD
    pub fn len(&self) -> usize {
        self.refs.len() + if self.head.is_some() { 1 } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the staged updates: references in the order they were staged, then HEAD.  On
    /// failure, updates already applied stay applied and the rest are dropped.
    pub fn commit(mut self) -> Result<()> {
        for (name, hash) in self.refs.drain(..) {
            self.storage.update_ref(&name, &hash)?;
        }
        if let Some(head) = self.head.take() {
            self.storage.set_head(&head)?;
        }
        Ok(())
    }
}

impl<'a, S: 'a + ObjectStore> Drop for RefTransaction<'a, S> {
    fn drop(&mut self) {
        if !self.is_empty() {
            debug!("discarding {} staged reference updates", self.len());
        }
    }
}
