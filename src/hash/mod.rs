//! `hash` -- the overlay hash engine.
//!
//! An overlay hash is a SHA-1 digest over a commit's tree hash, the *overlay* hashes of its
//! parents (in order), its author and committer, and the identity key that authored it.  Two
//! commits that differ only in identity key get different overlay hashes, which is what binds
//! authorship into the chain.
//!
//! Two schemes exist.  `Legacy` reproduces the digest of existing overlay hashes
//! byte for byte: it hashes the committer line twice and never mixes in the commit message.
//! `V2` hashes every field exactly once, message included, with each field tagged and
//! length-prefixed.  Each stored record names its scheme in `metadata["version"]`.

mod digest;

pub use self::digest::{is_hex, Hash, HASH_BYTES, HASH_HEX_LEN};

use crate::errors::*;
use crate::store::Signature;
use byteorder::{ByteOrder, NetworkEndian};
use crypto::digest::Digest;
use crypto::sha1::Sha1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata key under which a record names the scheme that produced its hash.
pub const VERSION_KEY: &str = "version";

/// HashScheme selects how an overlay hash is derived from a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashScheme {
    /// Bug-compatible with existing overlay hashes: no message, committer hashed twice.
    Legacy,
    /// Every field once, message included.
    V2,
}

/// The commit data an overlay hash covers, apart from the identity key.
#[derive(Debug, Clone, Copy)]
pub struct HashInput<'a> {
    pub tree_hash: &'a str,
    pub parents: &'a [String],
    pub author: &'a Signature,
    pub committer: &'a Signature,
    pub message: &'a str,
}

impl HashScheme {
    /// The schema-version tag stored in a record's metadata.
    pub fn version_tag(self) -> &'static str {
        match self {
            HashScheme::Legacy => "1.0",
            HashScheme::V2 => "2.0",
        }
    }

    /// Map a record's version tag back to a scheme.  Records written before the tag existed
    /// carry no tag and are legacy; an unrecognized tag yields None.
    pub fn from_version_tag(tag: Option<&str>) -> Option<HashScheme> {
        match tag {
            None | Some("1.0") => Some(HashScheme::Legacy),
            Some("2.0") => Some(HashScheme::V2),
            Some(_) => None,
        }
    }

    /// Compute the overlay hash of the given commit data, bound to `identity_key`.  The result
    /// is lowercase hex.
    pub fn compute(self, input: &HashInput, identity_key: &str) -> String {
        let mut sha = Sha1::new();
        match self {
            HashScheme::Legacy => legacy_digest(&mut sha, input, identity_key),
            HashScheme::V2 => v2_digest(&mut sha, input, identity_key),
        }
        Hash::finish(&mut sha).to_hex()
    }
}

fn legacy_digest(sha: &mut Sha1, input: &HashInput, identity_key: &str) {
    sha.input(Hash::lossy_from_hex(input.tree_hash).as_bytes());
    for parent in input.parents {
        sha.input(Hash::lossy_from_hex(parent).as_bytes());
    }

    let author = format!(
        "{} <{}> {} {}",
        input.author.name,
        input.author.email,
        input.author.when.timestamp(),
        identity_key
    );
    sha.input(author.as_bytes());

    // legacy hashes were made from a line formatted with one argument too many; the
    // surplus argument was appended in this exact shape
    let committer = format!(
        "{} <{}> {}%!(EXTRA string={})",
        input.committer.name,
        input.committer.email,
        input.committer.when.timestamp(),
        identity_key
    );
    sha.input(committer.as_bytes());
    sha.input(committer.as_bytes());
}

fn v2_digest(sha: &mut Sha1, input: &HashInput, identity_key: &str) {
    field(sha, b"tree", input.tree_hash.as_bytes());
    for parent in input.parents {
        field(sha, b"parent", parent.as_bytes());
    }
    field(sha, b"author", signature_line(input.author).as_bytes());
    field(sha, b"committer", signature_line(input.committer).as_bytes());
    field(sha, b"identity", identity_key.as_bytes());
    field(sha, b"message", input.message.as_bytes());
}

fn signature_line(sig: &Signature) -> String {
    format!(
        "{} <{}> {} {}",
        sig.name,
        sig.email,
        sig.when.timestamp(),
        sig.when.offset()
    )
}

/// Feed one tagged, length-prefixed field to the digest.
fn field(sha: &mut Sha1, tag: &[u8], value: &[u8]) {
    let mut lenbuf = [0u8; 8];
    NetworkEndian::write_u64(&mut lenbuf, value.len() as u64);
    sha.input(tag);
    sha.input(&lenbuf);
    sha.input(value);
}

impl fmt::Display for HashScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HashScheme::Legacy => write!(f, "legacy"),
            HashScheme::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for HashScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<HashScheme> {
        match s {
            "legacy" | "1.0" => Ok(HashScheme::Legacy),
            "v2" | "2.0" => Ok(HashScheme::V2),
            _ => Err(Error::InvalidRecord(format!("unknown hash scheme {:?}", s))),
        }
    }
}
