use super::object::CommitRecord;
use crate::errors::*;
use std::fmt;

/// What HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD follows a reference, e.g. `refs/heads/master`
    Symbolic(String),
    /// HEAD names an overlay hash directly
    Detached(String),
}

const SYMBOLIC_PREFIX: &str = "ref: ";

impl Head {
    /// A symbolic HEAD for the given reference, normalized as by `normalize_ref`.
    pub fn symbolic(name: &str) -> Head {
        Head::Symbolic(normalize_ref(name))
    }

    /// Parse the content of a HEAD file.  Trailing whitespace is ignored.
    pub fn parse(content: &str) -> Head {
        let content = content.trim_end();
        if content.starts_with(SYMBOLIC_PREFIX) {
            Head::Symbolic(content[SYMBOLIC_PREFIX.len()..].to_string())
        } else {
            Head::Detached(content.to_string())
        }
    }
}

impl fmt::Display for Head {
    /// Format this HEAD as stored on disk
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Head::Symbolic(name) => write!(f, "{}{}", SYMBOLIC_PREFIX, name),
            Head::Detached(hash) => write!(f, "{}", hash),
        }
    }
}

/// The two reference namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Heads,
    Tags,
}

impl RefKind {
    pub fn prefix(self) -> &'static str {
        match self {
            RefKind::Heads => "refs/heads/",
            RefKind::Tags => "refs/tags/",
        }
    }
}

/// Qualify a reference name: names without a `refs/` prefix are taken to be branches.
pub fn normalize_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("{}{}", RefKind::Heads.prefix(), name)
    }
}

/// Check that a (normalized) reference name is safe to use as a relative path.
pub(crate) fn validate_ref(name: &str) -> Result<()> {
    let rest = &name["refs/".len()..];
    let valid = !rest.is_empty()
        && !name.contains('\\')
        && rest
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRecord(format!(
            "invalid reference name {:?}",
            name
        )))
    }
}

/// Storage for overlay commit records, references and HEAD.
///
/// Records are keyed by overlay hash and are never deleted.  Implementations use interior
/// mutability where they need it; none of them is safe for concurrent writers.
pub trait ObjectStore {
    /// Create whatever layout the store needs, including a default HEAD.  Idempotent.
    fn initialize(&self) -> Result<()>;

    /// Store a record under its `overlay_hash`, replacing any record already stored there.
    fn put(&self, record: &CommitRecord) -> Result<()>;

    /// Retrieve a record by full overlay hash or by an abbreviation of at least
    /// `MIN_PREFIX_LEN` characters.
    fn get(&self, hash_or_prefix: &str) -> Result<CommitRecord>;

    /// Check whether a record is stored under exactly this hash.
    fn contains(&self, hash: &str) -> Result<bool>;

    /// Point a reference at an overlay hash.  Names without `refs/` are branches.
    fn update_ref(&self, name: &str, hash: &str) -> Result<()>;

    /// Read the overlay hash a reference points at.
    fn get_ref(&self, name: &str) -> Result<String>;

    /// List the (fully qualified name, hash) pairs in one reference namespace, sorted by name.
    fn list_refs(&self, kind: RefKind) -> Result<Vec<(String, String)>>;

    fn set_head(&self, head: &Head) -> Result<()>;

    fn get_head(&self) -> Result<Head>;

    /// Load the record HEAD points at, following a symbolic HEAD through its reference.
    fn get_head_commit(&self) -> Result<CommitRecord> {
        match self.get_head()? {
            Head::Symbolic(name) => {
                let hash = self.get_ref(&name)?;
                self.get(&hash)
            }
            Head::Detached(hash) => self.get(&hash),
        }
    }
}
