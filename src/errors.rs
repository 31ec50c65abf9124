use failure::Fail;
use std::fmt;
use std::io;

/// The kind of thing a `NotFound` error failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Object,
    Reference,
    Head,
    Mapping,
    SourceCommit,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let what = match self {
            Missing::Object => "object",
            Missing::Reference => "reference",
            Missing::Head => "HEAD",
            Missing::Mapping => "mapping",
            Missing::SourceCommit => "source commit",
        };
        write!(f, "{}", what)
    }
}

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{} not found: {}", _0, _1)]
    NotFound(Missing, String),

    #[fail(
        display = "ambiguous hash prefix {} matches {} objects",
        prefix,
        count
    )]
    Ambiguous {
        prefix: String,
        count: usize,
        matches: Vec<String>,
    },

    #[fail(display = "integrity failure: {}", _0)]
    Integrity(String),

    #[fail(display = "invalid record: {}", _0)]
    InvalidRecord(String),

    #[fail(display = "invalid hash: {}", _0)]
    InvalidHash(String),

    #[fail(display = "IO Error: {}", _0)]
    IOError(#[cause] io::Error),

    #[fail(display = "JSON Error: {}", _0)]
    JSONError(#[cause] serde_json::Error),

    #[fail(display = "Git Error: {}", _0)]
    GitError(#[cause] git2::Error),
}

impl Error {
    /// True if this error means something was absent, as opposed to broken.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(..) => true,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JSONError(err)
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::GitError(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
