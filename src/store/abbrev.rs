//! Resolution of abbreviated overlay hashes.

use crate::errors::*;
use crate::hash::{is_hex, HASH_HEX_LEN};
use std::fs;
use std::io;
use std::path::Path;

/// The shortest abbreviation `resolve` accepts.
pub const MIN_PREFIX_LEN: usize = 4;

/// Width of the shard directory names under `objects/`.
pub const SHARD_LEN: usize = 2;

/// What a hash argument turned out to be, once checked.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Full(String),
    Prefix(String),
}

/// Check a user-supplied hash or abbreviation, lowercasing it.  Anything that is not hex, is
/// shorter than `MIN_PREFIX_LEN` or longer than a full hash is rejected before it gets near
/// the filesystem.
pub(crate) fn classify(hash_or_prefix: &str) -> Result<Lookup> {
    let hash = hash_or_prefix.trim().to_ascii_lowercase();
    if !is_hex(&hash) {
        return Err(Error::InvalidHash(format!("{:?} is not a hex hash", hash_or_prefix)));
    }
    if hash.len() < MIN_PREFIX_LEN {
        return Err(Error::InvalidHash(format!(
            "{:?} is too short, need at least {} characters",
            hash_or_prefix, MIN_PREFIX_LEN
        )));
    }
    if hash.len() > HASH_HEX_LEN {
        return Err(Error::InvalidHash(format!("{:?} is too long", hash_or_prefix)));
    }
    if hash.len() == HASH_HEX_LEN {
        Ok(Lookup::Full(hash))
    } else {
        Ok(Lookup::Prefix(hash))
    }
}

/// Narrow a candidate list down to the single hash a prefix names.
pub(crate) fn pick(prefix: &str, mut matches: Vec<String>) -> Result<String> {
    match matches.len() {
        0 => Err(Error::NotFound(Missing::Object, prefix.to_string())),
        1 => Ok(matches.remove(0)),
        count => {
            matches.sort();
            Err(Error::Ambiguous {
                prefix: prefix.to_string(),
                count,
                matches,
            })
        }
    }
}

/// List every stored hash under `objects_dir` that starts with `prefix`.
///
/// A prefix no longer than a shard name selects whole shard directories; a longer one
/// selects entries of its shard by their remaining suffix.  Temporary files (dot-names) are
/// never reported.
pub fn find_by_prefix(objects_dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut matches = vec![];

    if prefix.len() <= SHARD_LEN {
        for shard in read_dir_names(objects_dir)? {
            if shard.len() == SHARD_LEN && shard.starts_with(prefix) {
                for entry in read_dir_names(&objects_dir.join(&shard))? {
                    matches.push(format!("{}{}", shard, entry));
                }
            }
        }
    } else {
        let (shard, suffix) = prefix.split_at(SHARD_LEN);
        for entry in read_dir_names(&objects_dir.join(shard))? {
            if entry.starts_with(suffix) {
                matches.push(format!("{}{}", shard, entry));
            }
        }
    }

    matches.sort();
    Ok(matches)
}

/// Resolve an abbreviation against the objects directory, returning the full hash.
pub fn resolve(objects_dir: &Path, prefix: &str) -> Result<String> {
    match classify(prefix)? {
        Lookup::Full(hash) => Ok(hash),
        Lookup::Prefix(prefix) => {
            let matches = find_by_prefix(objects_dir, &prefix)?;
            pick(&prefix, matches)
        }
    }
}

/// Names in a directory, skipping dot-files; a missing directory has no names.
fn read_dir_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    let mut names = vec![];
    for entry in entries {
        let name = entry?.file_name();
        if let Some(name) = name.to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}
