//! `store` -- content-addressed persistence for overlay commit records.
//!
//! Records are keyed by overlay hash.  The store also holds named references
//! (`refs/heads/<name>`, `refs/tags/<name>`) and a HEAD that is either symbolic or detached.
//! The API is in the `ObjectStore` trait; `DiskStorage` is the on-disk implementation and
//! `LocalStorage` an in-memory one.
//!
//! # Examples
//!
//! ```
//! use mgit_overlay::store::{Head, LocalStorage, ObjectStore};
//!
//! let storage = LocalStorage::new();
//! storage.initialize().unwrap();
//! assert_eq!(storage.get_head().unwrap(), Head::symbolic("master"));
//! ```

pub mod abbrev;
mod local;
mod object;
mod storage;
mod traits;
mod transaction;

pub use self::abbrev::MIN_PREFIX_LEN;
pub use self::local::LocalStorage;
pub use self::object::{CommitRecord, ObjectType, Signature};
pub use self::storage::{DiskStorage, DEFAULT_BRANCH, MAPPINGS_DIR};
pub use self::traits::{normalize_ref, Head, ObjectStore, RefKind};
pub(crate) use self::traits::validate_ref;
pub use self::transaction::RefTransaction;
