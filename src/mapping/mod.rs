//! `mapping` -- the table correlating source hashes, overlay hashes and identity keys.
//!
//! The table is an ordered list of `MappingRecord`s and is the single source of truth for
//! which identity authored which commit.  Lookups are expressed by the `Mappings` trait so
//! that the linear-scan `MappingTable` can be replaced by an indexed structure without
//! touching callers.

mod file;
mod table;

pub use self::file::{MappingFile, LEGACY_MAPPINGS_FILE, MAPPINGS_FILE};
pub use self::table::MappingTable;

use crate::errors::*;
use serde::{Deserialize, Serialize};

/// One assigned overlay hash.  The JSON field names are those peers exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    #[serde(rename = "git_hash", alias = "source_hash")]
    pub source_hash: String,
    #[serde(rename = "mgit_hash", alias = "overlay_hash")]
    pub overlay_hash: String,
    #[serde(rename = "pubkey", alias = "identity_key")]
    pub identity_key: String,
}

impl MappingRecord {
    pub fn new(source_hash: &str, overlay_hash: &str, identity_key: &str) -> MappingRecord {
        MappingRecord {
            source_hash: source_hash.to_string(),
            overlay_hash: overlay_hash.to_string(),
            identity_key: identity_key.to_string(),
        }
    }
}

/// Read access to a mapping table.  Where several records could match, the earliest wins.
pub trait Mappings {
    /// All records, in table order
    fn records(&self) -> &[MappingRecord];

    fn find_by_source(&self, source_hash: &str) -> Option<&MappingRecord> {
        self.records().iter().find(|r| r.source_hash == source_hash)
    }

    fn find_by_overlay(&self, overlay_hash: &str) -> Option<&MappingRecord> {
        self.records().iter().find(|r| r.overlay_hash == overlay_hash)
    }

    /// The overlay hash assigned to a source commit
    fn lookup_overlay(&self, source_hash: &str) -> Result<String> {
        self.find_by_source(source_hash)
            .map(|r| r.overlay_hash.clone())
            .ok_or_else(|| Error::NotFound(Missing::Mapping, source_hash.to_string()))
    }

    /// The source commit an overlay hash was assigned to
    fn lookup_source(&self, overlay_hash: &str) -> Result<String> {
        self.find_by_overlay(overlay_hash)
            .map(|r| r.source_hash.clone())
            .ok_or_else(|| Error::NotFound(Missing::Mapping, overlay_hash.to_string()))
    }

    /// The identity key bound to a commit, given either its source or its overlay hash
    fn lookup_identity(&self, hash: &str) -> Result<String> {
        self.records()
            .iter()
            .find(|r| r.source_hash == hash || r.overlay_hash == hash)
            .map(|r| r.identity_key.clone())
            .ok_or_else(|| Error::NotFound(Missing::Mapping, hash.to_string()))
    }
}
