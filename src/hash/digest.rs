use crypto::digest::Digest;
use crypto::sha1::Sha1;
use rustc_serialize::hex::{FromHex, ToHex};
use std::fmt;

/// Width, in bytes, of an overlay hash.
pub const HASH_BYTES: usize = 20;

/// Width, in hex characters, of a full overlay hash.
pub const HASH_HEX_LEN: usize = HASH_BYTES * 2;

/// Type Hash is a raw SHA-1 digest, as produced by the hash engine and as git uses for
/// commit and tree identifiers.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Hash([u8; HASH_BYTES]);

impl Hash {
    /// Parse a full hash from its hex representation, returning None if it is not exactly
    /// `HASH_HEX_LEN` hex characters.
    pub fn from_hex(hex: &str) -> Option<Hash> {
        if hex.len() != HASH_HEX_LEN {
            return None;
        }
        let bytes = hex.from_hex().ok()?;
        let mut hash = Hash([0; HASH_BYTES]);
        hash.0.copy_from_slice(&bytes);
        Some(hash)
    }

    /// Decode a hash the forgiving way: hex pairs are consumed until the first one that does
    /// not decode, and the result is truncated or zero-padded to `HASH_BYTES`.  Legacy overlay
    /// hashes were computed over hashes decoded like this, so placeholder or malformed parent
    /// hashes must keep decoding the same way.
    pub fn lossy_from_hex(hex: &str) -> Hash {
        let mut hash = Hash([0; HASH_BYTES]);
        let bytes = hex.as_bytes();
        for (i, pair) in bytes.chunks(2).take(HASH_BYTES).enumerate() {
            if pair.len() != 2 {
                break;
            }
            match (nibble(pair[0]), nibble(pair[1])) {
                (Some(hi), Some(lo)) => hash.0[i] = (hi << 4) | lo,
                _ => break,
            }
        }
        hash
    }

    /// Hash the given content
    pub fn for_bytes(bytes: &[u8]) -> Hash {
        let mut sha = Sha1::new();
        sha.input(bytes);
        Hash::finish(&mut sha)
    }

    /// Extract the result of a running SHA-1 computation
    pub(crate) fn finish(sha: &mut Sha1) -> Hash {
        let mut hash = Hash([0; HASH_BYTES]);
        sha.result(&mut hash.0);
        hash
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the lowercase hex representation of this hash.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// True if `s` is non-empty and consists only of lowercase or uppercase hex digits.
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|c| nibble(c).is_some())
}
