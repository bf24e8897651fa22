//! Error types for corpus access
//!
//! Every failing operation surfaces one of these synchronously; nothing is
//! retried or swallowed inside the crate.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::query::QueryError;

/// Error raised by corpus readers, cursors and writers
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Cannot open corpus {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Corpus has been closed")]
    Closed,

    #[error("Unknown entry: {0}")]
    NotFound(String),

    #[error("Query syntax error: {0}")]
    QuerySyntax(#[from] QueryError),

    #[error("Invalid marker attribute name: {0:?}")]
    InvalidMarker(String),

    #[error("Duplicate entry name: {0}")]
    DuplicateKey(String),

    #[error("Invalid entry name: {0:?}")]
    InvalidEntryName(String),

    #[error("Entry {name} is not valid UTF-8")]
    Encoding { name: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Batch(BatchError),
}

impl CorpusError {
    pub(crate) fn open(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CorpusError::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Several errors collected while copying a whole corpus
#[derive(Debug, Default)]
pub struct BatchError {
    errors: Vec<CorpusError>,
}

impl BatchError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure
    pub fn push(&mut self, error: CorpusError) {
        self.errors.push(error);
    }

    /// True iff no failures were recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[CorpusError] {
        &self.errors
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Errors in batch conversion:")?;
        for error in &self.errors {
            writeln!(f, "    {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}
