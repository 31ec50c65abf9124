use super::{MappingRecord, Mappings};
use crate::errors::*;

/// MappingTable is the plain, ordered, in-memory mapping table.  Lookups scan linearly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    records: Vec<MappingRecord>,
}

impl MappingTable {
    /// Create an empty table
    pub fn new() -> MappingTable {
        MappingTable { records: vec![] }
    }

    /// Parse a table from its JSON encoding, an array of `{git_hash, mgit_hash, pubkey}`
    /// objects.  This is also the form in which peers send a table.
    pub fn from_json(data: &str) -> Result<MappingTable> {
        let records: Vec<MappingRecord> = serde_json::from_str(data)?;
        Ok(MappingTable { records })
    }

    /// Encode the table as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    /// Add a record.  The first existing record that shares either hash is replaced in place;
    /// any further records sharing either hash are removed, so that afterward each hash has
    /// at most one record in each direction.  Otherwise the record is appended.
    pub fn append(&mut self, source_hash: &str, overlay_hash: &str, identity_key: &str) {
        let record = MappingRecord::new(source_hash, overlay_hash, identity_key);
        let shares_hash =
            |r: &MappingRecord| r.source_hash == source_hash || r.overlay_hash == overlay_hash;

        match self.records.iter().position(|r| shares_hash(r)) {
            Some(index) => {
                let mut i = 0;
                self.records.retain(|r| {
                    let keep = i <= index || !shares_hash(r);
                    i += 1;
                    keep
                });
                self.records[index] = record;
            }
            None => self.records.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Mappings for MappingTable {
    fn records(&self) -> &[MappingRecord] {
        &self.records
    }
}

impl From<Vec<MappingRecord>> for MappingTable {
    fn from(records: Vec<MappingRecord>) -> MappingTable {
        MappingTable { records }
    }
}
