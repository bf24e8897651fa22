//! Cursors over entry names
//!
//! A cursor is the single traversal abstraction for both "all entries" and
//! "query result" sequences. It is forward-only and holds only a weak
//! reference to its corpus, so closing the reader invalidates every cursor
//! at once.

use crate::compiler::CompiledQuery;
use crate::error::CorpusError;
use crate::index::Slot;
use crate::reader::Corpus;
use crate::searcher;
use std::sync::{Arc, Weak};

/// Lifecycle of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not advanced yet
    Created,
    /// Advanced at least once, more names may follow
    Active,
    /// No further names; absorbing
    Exhausted,
}

#[derive(Debug)]
enum Traversal {
    Entries {
        position: Slot,
    },
    Query {
        query: CompiledQuery,
        /// Computed on first advance
        candidates: Option<Vec<Slot>>,
        position: usize,
    },
}

/// Forward-only, single-pass sequence of entry names
#[derive(Debug)]
pub struct Cursor {
    corpus: Weak<Corpus>,
    traversal: Traversal,
    state: CursorState,
    closed_reported: bool,
}

impl Cursor {
    pub(crate) fn entries(corpus: Weak<Corpus>) -> Self {
        Self::new(corpus, Traversal::Entries { position: 0 })
    }

    pub(crate) fn query(corpus: Weak<Corpus>, query: CompiledQuery) -> Self {
        Self::new(
            corpus,
            Traversal::Query {
                query,
                candidates: None,
                position: 0,
            },
        )
    }

    fn new(corpus: Weak<Corpus>, traversal: Traversal) -> Self {
        Self {
            corpus,
            traversal,
            state: CursorState::Created,
            closed_reported: false,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Move to the next name
    ///
    /// Returns `Ok(None)` once the sequence is exhausted, and keeps doing so
    /// forever after. Fails with [`CorpusError::Closed`] when the corpus has
    /// been closed; that leaves the cursor's state untouched. Any other error
    /// is reported once and exhausts the cursor.
    pub fn advance(&mut self) -> Result<Option<String>, CorpusError> {
        if self.state == CursorState::Exhausted {
            return Ok(None);
        }

        let corpus = self.corpus.upgrade().ok_or(CorpusError::Closed)?;
        self.state = CursorState::Active;

        match self.step(&corpus) {
            Ok(Some(name)) => Ok(Some(name)),
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.state = CursorState::Exhausted;
                Err(e)
            }
        }
    }

    fn step(&mut self, corpus: &Arc<Corpus>) -> Result<Option<String>, CorpusError> {
        match &mut self.traversal {
            Traversal::Entries { position } => {
                let name = corpus.index().name_at(*position).map(str::to_string);
                if name.is_some() {
                    *position += 1;
                }
                Ok(name)
            }
            Traversal::Query {
                query,
                candidates,
                position,
            } => {
                if candidates.is_none() {
                    *candidates = Some(searcher::candidates(corpus, query)?);
                }
                let candidates = candidates.as_deref().unwrap_or_default();

                while let Some(&slot) = candidates.get(*position) {
                    *position += 1;
                    if let Some(name) = searcher::accept(corpus, query, slot)? {
                        return Ok(Some(name));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Iterating yields names until exhaustion. A closed corpus is reported as
/// one `Err(CorpusError::Closed)` item, after which iteration ends.
impl Iterator for Cursor {
    type Item = Result<String, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed_reported {
            return None;
        }
        match self.advance() {
            Ok(Some(name)) => Some(Ok(name)),
            Ok(None) => None,
            Err(CorpusError::Closed) => {
                self.closed_reported = true;
                Some(Err(CorpusError::Closed))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
