//! An overlay commit history for git repositories.
//!
//! Every underlying commit is given a second identifier, the *overlay hash*, computed over the
//! commit's tree, the overlay hashes of its parents, its author and committer, and the public
//! key of the identity that authored it.  The overlay commits form their own hash chain, stored
//! next to the repository in a small content-addressed store, and a mapping table correlates
//! each git commit with its overlay hash and identity key.
//!
//! The pieces, leaves first:
//!
//!  * [`hash`] computes overlay hashes;
//!  * [`repo`] reads commits, branches and HEAD from the underlying repository;
//!  * [`mapping`] holds the source-hash / overlay-hash / identity-key table;
//!  * [`store`] persists overlay commit records, references and HEAD;
//!  * [`reconstruct`] rebuilds a store from a repository plus a mapping table;
//!  * [`verify`] walks the overlay graph and recomputes every hash;
//!  * [`overlay`] ties these together for the command level.

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;

pub mod config;
mod errors;
pub mod hash;
pub mod mapping;
pub mod overlay;
pub mod reconstruct;
pub mod repo;
pub mod store;
pub mod util;
pub mod verify;

pub use config::Config;
pub use errors::{Error, Missing, Result};
pub use hash::HashScheme;
pub use mapping::{MappingFile, MappingRecord, MappingTable, Mappings};
pub use overlay::Overlay;
pub use reconstruct::{reconstruct, ReconstructReport};
pub use repo::{GitRepository, MemoryRepository, Repository};
pub use store::{CommitRecord, DiskStorage, Head, LocalStorage, ObjectStore, Signature};
pub use verify::{verify, Verification};
