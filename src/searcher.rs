//! Query execution combining index lookup + VM verification
//!
//! Execution follows the same pipeline for every query:
//! 1. Resolve the compiled query's anchor to candidate slots via the index
//! 2. Run the VM on each candidate, loading content only when a text test needs it
//! 3. Yield the names of accepted candidates in slot order

use crate::compiler::{Anchor, CompiledQuery};
use crate::error::CorpusError;
use crate::index::Slot;
use crate::reader::Corpus;
use crate::vm::EntryView;

/// Candidate slots for a query, sorted and free of duplicates
pub fn candidates(corpus: &Corpus, query: &CompiledQuery) -> Result<Vec<Slot>, CorpusError> {
    resolve(corpus, query.anchor())
}

fn resolve(corpus: &Corpus, anchor: &Anchor) -> Result<Vec<Slot>, CorpusError> {
    let index = corpus.index();
    match anchor {
        Anchor::All => Ok(all_slots(corpus)),
        Anchor::Nothing => Ok(Vec::new()),
        Anchor::Name(name) => Ok(index.slot(name).into_iter().collect()),
        Anchor::Substring(literal) => {
            if !corpus.config().trigram_index {
                return Ok(all_slots(corpus));
            }
            let trigrams = index.trigrams(|name| corpus.load(name))?;
            Ok(trigrams
                .candidates(literal)
                .unwrap_or_else(|| all_slots(corpus)))
        }
        Anchor::Union(parts) => {
            let mut slots = Vec::new();
            for part in parts {
                slots.extend(resolve(corpus, part)?);
            }
            slots.sort_unstable();
            slots.dedup();
            Ok(slots)
        }
    }
}

fn all_slots(corpus: &Corpus) -> Vec<Slot> {
    (0..corpus.index().len() as Slot).collect()
}

/// Name of the entry at `slot` if the query accepts it
pub fn accept(
    corpus: &Corpus,
    query: &CompiledQuery,
    slot: Slot,
) -> Result<Option<String>, CorpusError> {
    let Some(name) = corpus.index().name_at(slot) else {
        return Ok(None);
    };

    let load = |name: &str| corpus.load(name);
    let mut entry = EntryView::new(name, &load);
    if query.vm().execute(&mut entry)? {
        Ok(Some(name.to_string()))
    } else {
        Ok(None)
    }
}

/// Evaluate a query against every entry, eagerly
///
/// Convenience for callers that want all matches at once.
pub fn search(corpus: &Corpus, query: &CompiledQuery) -> Result<Vec<String>, CorpusError> {
    let mut matches = Vec::new();
    for slot in candidates(corpus, query)? {
        if let Some(name) = accept(corpus, query, slot)? {
            matches.push(name);
        }
    }
    Ok(matches)
}
