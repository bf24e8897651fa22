//! The corpus reader facade
//!
//! A [`Reader`] exclusively owns one open corpus. Cursors handed out by the
//! reader hold only weak references, so [`Reader::close`] (or dropping the
//! reader) releases the corpus immediately and every outstanding cursor
//! starts failing with [`CorpusError::Closed`].
//!
//! # Examples
//!
//! ```
//! use corpusreader::{MarkerQuery, Reader};
//!
//! let reader = Reader::from_entries("demo", [("a", "The cat sat."), ("b", "Dogs run fast.")])?;
//!
//! let names = reader
//!     .query("contains(text,'cat')")?
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(names, vec!["a"]);
//!
//! let marked = reader.read_marked("a", &[MarkerQuery::new("contains(text,'cat')", "active", "1")])?;
//! assert_eq!(marked, r#"The <mark active="1">cat</mark> sat."#);
//! # Ok::<(), corpusreader::CorpusError>(())
//! ```

use crate::compiler::compile_query;
use crate::config::ReaderConfig;
use crate::cursor::Cursor;
use crate::entry::Entry;
use crate::error::CorpusError;
use crate::index::CorpusIndex;
use crate::marker::{MarkerQuery, compile_markers, mark_content};
use crate::query::parse_query;
use crate::store::{EntryStore, MemoryStore, MultiStore};
use std::sync::{Arc, Weak};
use tracing::{debug, instrument};

/// An open corpus: its store, its index and the settings it was opened with
#[derive(Debug)]
pub struct Corpus {
    store: EntryStore,
    index: CorpusIndex,
    config: ReaderConfig,
}

impl Corpus {
    pub(crate) fn open(location: &str, config: &ReaderConfig) -> Result<Self, CorpusError> {
        config.validate()?;
        let store = EntryStore::open(location, config)?;
        Ok(Self::with_store(store, config.clone()))
    }

    pub(crate) fn open_recursive(directory: &str, config: &ReaderConfig) -> Result<Self, CorpusError> {
        config.validate()?;
        let store = EntryStore::Multi(MultiStore::open_recursive(directory, config)?);
        Ok(Self::with_store(store, config.clone()))
    }

    pub(crate) fn open_multi<I, P, L>(corpora: I, config: &ReaderConfig) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: AsRef<str>,
    {
        config.validate()?;
        let store = EntryStore::Multi(MultiStore::open(corpora, config)?);
        Ok(Self::with_store(store, config.clone()))
    }

    pub(crate) fn from_entries<I, N, C>(
        name: &str,
        pairs: I,
        config: ReaderConfig,
    ) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        config.validate()?;
        let store = EntryStore::Memory(MemoryStore::from_pairs(name, pairs)?);
        Ok(Self::with_store(store, config))
    }

    fn with_store(store: EntryStore, config: ReaderConfig) -> Self {
        let index = CorpusIndex::build(store.names(), config.sort_order);
        debug!(
            corpus = store.canonical(),
            kind = store.kind(),
            entries = index.len(),
            "opened corpus"
        );
        Self {
            store,
            index,
            config,
        }
    }

    pub fn name(&self) -> &str {
        self.store.canonical()
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Content of an entry known to the index
    pub fn load(&self, name: &str) -> Result<String, CorpusError> {
        if self.index.slot(name).is_none() {
            return Err(CorpusError::NotFound(name.to_string()));
        }
        self.store.get(name)
    }
}

/// Read-only access to one corpus
#[derive(Debug)]
pub struct Reader {
    name: String,
    corpus: Option<Arc<Corpus>>,
}

impl Reader {
    /// Open the corpus at `location` with default settings
    ///
    /// A directory is opened as a directory corpus; anything else is tried as
    /// a compact corpus (`<base>.data.dz`, `<base>.index`, or `<base>`).
    pub fn open(location: &str) -> Result<Self, CorpusError> {
        Self::open_with_config(location, &ReaderConfig::default())
    }

    #[instrument(level = "debug", skip(config))]
    pub fn open_with_config(location: &str, config: &ReaderConfig) -> Result<Self, CorpusError> {
        let corpus = Corpus::open(location, config)?;
        Ok(Self::with_corpus(corpus))
    }

    /// Every compact corpus below `directory` as one corpus
    ///
    /// Each `.data.dz`/`.index` pair found at any depth contributes its
    /// entries as `<relative base>/<entry name>`, so `a/one.index` holding
    /// `1.xml` yields the entry `a/one/1.xml`.
    pub fn open_recursive(directory: &str) -> Result<Self, CorpusError> {
        Self::open_recursive_with_config(directory, &ReaderConfig::default())
    }

    #[instrument(level = "debug", skip(config))]
    pub fn open_recursive_with_config(
        directory: &str,
        config: &ReaderConfig,
    ) -> Result<Self, CorpusError> {
        let corpus = Corpus::open_recursive(directory, config)?;
        Ok(Self::with_corpus(corpus))
    }

    /// Several corpora as one, each entry named `<prefix>/<entry name>`
    ///
    /// Every location is opened as by [`Reader::open`]. Colliding names are a
    /// [`CorpusError::DuplicateKey`].
    pub fn open_multi<I, P, L>(corpora: I, config: &ReaderConfig) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: AsRef<str>,
    {
        let corpus = Corpus::open_multi(corpora, config)?;
        Ok(Self::with_corpus(corpus))
    }

    /// An in-memory corpus built from `(name, content)` pairs
    pub fn from_entries<I, N, C>(name: &str, pairs: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        Self::from_entries_with_config(name, pairs, &ReaderConfig::default())
    }

    pub fn from_entries_with_config<I, N, C>(
        name: &str,
        pairs: I,
        config: &ReaderConfig,
    ) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let corpus = Corpus::from_entries(name, pairs, config.clone())?;
        Ok(Self::with_corpus(corpus))
    }

    fn with_corpus(corpus: Corpus) -> Self {
        Self {
            name: corpus.name().to_string(),
            corpus: Some(Arc::new(corpus)),
        }
    }

    fn corpus(&self) -> Result<&Arc<Corpus>, CorpusError> {
        self.corpus.as_ref().ok_or(CorpusError::Closed)
    }

    /// Canonical name of the corpus; still available after close
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize, CorpusError> {
        Ok(self.corpus()?.index().len())
    }

    pub fn is_empty(&self) -> Result<bool, CorpusError> {
        Ok(self.corpus()?.index().is_empty())
    }

    /// Every entry name, in enumeration order
    ///
    /// Never fails here; a closed reader yields a cursor that reports
    /// [`CorpusError::Closed`] when advanced.
    pub fn entries(&self) -> Cursor {
        let corpus = self.corpus.as_ref().map_or_else(Weak::new, Arc::downgrade);
        Cursor::entries(corpus)
    }

    /// Names of the entries matching `query`, in enumeration order
    ///
    /// The query is compiled immediately, so syntax errors surface here.
    /// Matching happens as the cursor is advanced.
    pub fn query(&self, query: &str) -> Result<Cursor, CorpusError> {
        let corpus = self.corpus()?;
        let compiled = compile_query(query)?;
        debug!(query, anchor = ?compiled.anchor(), "compiled query");
        Ok(Cursor::query(Arc::downgrade(corpus), compiled))
    }

    /// Check query syntax without running anything
    pub fn validate_query(&self, query: &str) -> Result<(), CorpusError> {
        parse_query(query)?;
        Ok(())
    }

    /// Content of one entry
    pub fn read(&self, name: &str) -> Result<String, CorpusError> {
        self.corpus()?.load(name)
    }

    /// Content of one entry with the regions matched by `markers` marked
    ///
    /// Markers are applied in order. All marker queries are compiled before
    /// the entry is read.
    pub fn read_marked(&self, name: &str, markers: &[MarkerQuery]) -> Result<String, CorpusError> {
        let corpus = self.corpus()?;
        let markers = compile_markers(markers)?;
        let content = corpus.load(name)?;
        if markers.is_empty() {
            return Ok(content);
        }
        mark_content(name, &content, &markers, &corpus.config().mark_element)
    }

    /// Name and content of one entry
    pub fn entry(&self, name: &str) -> Result<Entry, CorpusError> {
        Ok(Entry::new(name, self.read(name)?))
    }

    /// Release the corpus; later calls are no-ops
    pub fn close(&mut self) {
        if self.corpus.take().is_some() {
            debug!(corpus = %self.name, "closed corpus");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.corpus.is_none()
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}
