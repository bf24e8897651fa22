//! Name index and trigram index for candidate lookup
//!
//! The name index fixes the enumeration order of a corpus and maps names to
//! slots. The trigram index maps every three-byte sequence occurring in some
//! entry to the sorted slots of the entries containing it, so literal text
//! queries only verify entries that can possibly match.

use crate::config::SortOrder;
use crate::error::CorpusError;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::OnceLock;
use tracing::debug;

/// Position of an entry in enumeration order
pub type Slot = u32;

/// Enumeration order and name lookup for one corpus
#[derive(Debug)]
pub struct CorpusIndex {
    names: Vec<String>,
    slots: FxHashMap<String, Slot>,
    trigrams: OnceLock<TrigramIndex>,
}

impl CorpusIndex {
    /// Build from the store's names
    pub fn build(names: &[String], order: SortOrder) -> Self {
        let mut names = names.to_vec();
        match order {
            SortOrder::Natural => names.sort_by(|a, b| natural_cmp(a, b)),
            SortOrder::Lexical => names.sort(),
        }

        let slots = names
            .iter()
            .enumerate()
            .map(|(slot, name)| (name.clone(), slot as Slot))
            .collect();

        Self {
            names,
            slots,
            trigrams: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Slot of a name, if the corpus has it
    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    pub fn name_at(&self, slot: Slot) -> Option<&str> {
        self.names.get(slot as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The trigram index, built by reading every entry on first use
    pub fn trigrams<F>(&self, load: F) -> Result<&TrigramIndex, CorpusError>
    where
        F: Fn(&str) -> Result<String, CorpusError>,
    {
        if let Some(index) = self.trigrams.get() {
            return Ok(index);
        }

        let index = TrigramIndex::build(&self.names, load)?;
        // Another caller may have won the race; either index is equivalent
        Ok(self.trigrams.get_or_init(|| index))
    }

    /// Whether the trigram index has been built
    pub fn has_trigrams(&self) -> bool {
        self.trigrams.get().is_some()
    }
}

/// Inverted index from byte trigrams to slots
#[derive(Debug, Default)]
pub struct TrigramIndex {
    postings: FxHashMap<[u8; 3], Vec<Slot>>,
}

impl TrigramIndex {
    /// Index the content of every named entry; `names` is in slot order
    pub fn build<F>(names: &[String], load: F) -> Result<Self, CorpusError>
    where
        F: Fn(&str) -> Result<String, CorpusError>,
    {
        let mut index = TrigramIndex::default();
        for (slot, name) in names.iter().enumerate() {
            let content = load(name)?;
            index.add(slot as Slot, content.as_bytes());
        }

        debug!(
            entries = names.len(),
            trigrams = index.postings.len(),
            "built trigram index"
        );
        Ok(index)
    }

    /// Slots must be added in increasing order
    fn add(&mut self, slot: Slot, content: &[u8]) {
        for window in content.windows(3) {
            let key = [window[0], window[1], window[2]];
            let posting = self.postings.entry(key).or_default();
            if posting.last() != Some(&slot) {
                posting.push(slot);
            }
        }
    }

    /// Sorted slots of entries that contain every trigram of `literal`
    ///
    /// None when the literal is too short to constrain anything.
    pub fn candidates(&self, literal: &str) -> Option<Vec<Slot>> {
        let bytes = literal.as_bytes();
        if bytes.len() < 3 {
            return None;
        }

        let mut lists: Vec<&[Slot]> = Vec::new();
        for window in bytes.windows(3) {
            let key = [window[0], window[1], window[2]];
            match self.postings.get(&key) {
                Some(posting) => lists.push(posting),
                None => return Some(Vec::new()),
            }
        }

        // Intersect starting from the shortest posting list
        lists.sort_by_key(|list| list.len());
        let mut result = lists[0].to_vec();
        for list in &lists[1..] {
            result.retain(|slot| list.binary_search(slot).is_ok());
            if result.is_empty() {
                break;
            }
        }
        Some(result)
    }
}

/// A run of digits or of non-digits within a name
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let bytes = name.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != digit)
            .map_or(bytes.len(), |len| start + len);
        // ASCII digit boundaries are always char boundaries
        let run = &name[start..end];
        chunks.push(if digit {
            Chunk::Digits(run)
        } else {
            Chunk::Text(run)
        });
        start = end;
    }
    chunks
}

/// Compare digit runs by value without parsing, so long runs never overflow
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural name order: `2.xml` before `10.xml`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(&right) {
        let ordering = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            // A digit run sorts before text at the same position
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}
