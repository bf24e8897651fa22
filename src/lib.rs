//! Corpusreader: embedded reader and query engine for text corpora
//!
//! A corpus is a read-only collection of named text entries, stored as a
//! directory of files, as a compact `.data.dz`/`.index` pair, or in memory;
//! several corpora can be read as one under name prefixes.
//! Open one with [`Reader`], enumerate names, select names with a query, and
//! read content with the regions matched by [`MarkerQuery`]s marked up.

// Core modules (algorithm-first approach)
pub mod compiler; // Query compilation to VM opcodes and anchors
pub mod index; // Name order and trigram index for candidate lookup
pub mod query; // Query language parser
pub mod searcher; // Index lookup + VM verification
pub mod vm; // Virtual machine executor and instruction set

// Storage
mod bytes;
pub mod compact; // Compact .data.dz/.index corpora
pub mod store; // Entry store kinds
pub mod writer; // Compact corpus writer

// Reader surface
pub mod config;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod marker;
pub mod reader;

// Re-exports for convenience
pub use compiler::{CompiledQuery, compile_query};
pub use config::{ReaderConfig, SortOrder, load_config, load_config_from};
pub use cursor::{Cursor, CursorState};
pub use entry::Entry;
pub use error::{BatchError, CorpusError};
pub use marker::MarkerQuery;
pub use query::{QueryError, parse_query};
pub use reader::Reader;
pub use writer::CompactWriter;
