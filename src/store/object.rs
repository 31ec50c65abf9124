use crate::hash::{HashInput, HashScheme, VERSION_KEY};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type tag carried by every stored object.  Only commits are stored; trees and blobs
/// live in the underlying repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Commit,
}

/// An author or committer, optionally bound to an identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new<N: Into<String>, E: Into<String>>(
        name: N,
        email: E,
        when: DateTime<FixedOffset>,
    ) -> Signature {
        Signature {
            name: name.into(),
            email: email.into(),
            pubkey: None,
            when,
        }
    }

    /// Return a copy of this signature bound to the given identity key
    pub fn with_key(&self, key: &str) -> Signature {
        Signature {
            pubkey: Some(key.to_string()),
            ..self.clone()
        }
    }
}

/// One overlay commit.  Records are interlinked by overlay hash: `parent_hashes` are overlay
/// hashes, in the underlying commit's parent order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(alias = "mgit_hash")]
    pub overlay_hash: String,
    #[serde(alias = "git_hash")]
    pub source_hash: String,
    pub tree_hash: String,
    pub parent_hashes: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CommitRecord {
    /// The identity key this commit is bound to, taken from the author (empty if unbound).
    pub fn identity_key(&self) -> &str {
        self.author.pubkey.as_ref().map(|k| &k[..]).unwrap_or("")
    }

    /// The hash scheme this record declares, or None if its version tag is unrecognized.
    pub fn scheme(&self) -> Option<HashScheme> {
        HashScheme::from_version_tag(self.metadata.get(VERSION_KEY).map(|v| &v[..]))
    }

    /// Tag this record with the given scheme's version.
    pub fn set_scheme(&mut self, scheme: HashScheme) {
        self.metadata
            .insert(VERSION_KEY.to_string(), scheme.version_tag().to_string());
    }

    /// The data this record's hash is computed over.
    pub fn hash_input(&self) -> HashInput {
        HashInput {
            tree_hash: &self.tree_hash,
            parents: &self.parent_hashes,
            author: &self.author,
            committer: &self.committer,
            message: &self.message,
        }
    }

    /// The first line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
