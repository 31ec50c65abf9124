use super::table::MappingTable;
use crate::errors::*;
use crate::store::MAPPINGS_DIR;
use crate::util::{read_optional, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the mapping table file, inside the `mappings` directory.
pub const MAPPINGS_FILE: &str = "hash_mappings.json";

/// Name of the legacy copy of the table, at the top of the overlay directory.
pub const LEGACY_MAPPINGS_FILE: &str = "nostr_mappings.json";

/// MappingFile persists a `MappingTable` as a single JSON array.
///
/// Every write rewrites the whole file, so appends are read-modify-write sequences: callers
/// must make sure only one writer is active.  When the legacy mirror is enabled, each write
/// also goes to the legacy location, and reads fall back to it if the primary file is absent.
#[derive(Debug, Clone)]
pub struct MappingFile {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl MappingFile {
    /// The mapping file of the overlay directory `root`.
    pub fn new<P: AsRef<Path>>(root: P, legacy: bool) -> MappingFile {
        let root = root.as_ref();
        MappingFile {
            path: root.join(MAPPINGS_DIR).join(MAPPINGS_FILE),
            legacy_path: if legacy {
                Some(root.join(LEGACY_MAPPINGS_FILE))
            } else {
                None
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table.  A missing file is an empty table; an unparseable one is an error.
    pub fn load(&self) -> Result<MappingTable> {
        if let Some(data) = read_optional(&self.path)? {
            return MappingTable::from_json(&data);
        }
        if let Some(ref legacy) = self.legacy_path {
            if let Some(data) = read_optional(legacy)? {
                debug!("reading mappings from legacy {}", legacy.display());
                return MappingTable::from_json(&data);
            }
        }
        Ok(MappingTable::new())
    }

    /// Write the whole table, to the primary location and the legacy mirror.
    pub fn save(&self, table: &MappingTable) -> Result<()> {
        let data = table.to_json()?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        write_atomic(&self.path, data.as_bytes())?;
        if let Some(ref legacy) = self.legacy_path {
            write_atomic(legacy, data.as_bytes())?;
        }
        Ok(())
    }

    /// Add or replace one record (see `MappingTable::append`), rewriting the file.  Returns
    /// the updated table.
    pub fn append(
        &self,
        source_hash: &str,
        overlay_hash: &str,
        identity_key: &str,
    ) -> Result<MappingTable> {
        let mut table = self.load()?;
        table.append(source_hash, overlay_hash, identity_key);
        self.save(&table)?;
        Ok(table)
    }

    /// Install a table received from elsewhere (typically a peer), replacing the local one.
    pub fn replace_all(&self, table: &MappingTable) -> Result<()> {
        info!("installing mapping table with {} records", table.len());
        self.save(table)
    }
}
