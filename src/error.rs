//! Error taxonomy for index construction, loading, and saving.
//!
//! Query-time "no match" is never an error: the query paths signal it with
//! sentinels (`-1`, empty vectors). Errors here are the fatal conditions a
//! caller must handle — bad input, an incompatible or truncated index file,
//! or a broken internal invariant.

use thiserror::Error;

/// Fatal conditions surfaced by the index core.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A target name occurred more than once in the input.
    #[error("repeated target name in input: {0} (run with --make-unique to rename duplicates)")]
    DuplicateName(String),

    /// No usable transcript sequences were provided.
    #[error("no transcript sequences in input")]
    EmptyInput,

    /// Unsupported k-mer length.
    #[error("k-mer length must be odd and between 3 and 31, got {0}")]
    InvalidK(usize),

    /// The index file was written by an incompatible version.
    #[error("incompatible index: found version {found}, expected version {expected}")]
    VersionMismatch { found: u64, expected: u64 },

    /// Underlying I/O failure (includes truncated index files).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An internal invariant did not hold.
    #[error("index invariant violated: {0}")]
    InvariantViolation(String),
}

impl IndexError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        IndexError::InvariantViolation(msg.into())
    }
}
