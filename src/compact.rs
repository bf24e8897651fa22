//! Compact corpus storage
//!
//! A compact corpus is a pair of files sharing a base name:
//! - `<base>.data.dz`: the contents of all entries, concatenated and
//!   gzip-compressed (dictzip files are valid gzip). An uncompressed
//!   `<base>.data` is accepted as well.
//! - `<base>.index`: one line per entry, `name TAB offset TAB size`, with
//!   offset and size in the dictd base64 number encoding.

use crate::bytes::{b64_decode, bs_rsplit_once, bs_trim_newline};
use crate::error::CorpusError;
use flate2::read::MultiGzDecoder;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const DATA_EXT: &str = ".data.dz";
pub const PLAIN_DATA_EXT: &str = ".data";
pub const INDEX_EXT: &str = ".index";

/// An opened compact corpus; content is decompressed once at open
#[derive(Debug)]
pub struct CompactStore {
    canonical: String,
    data: Vec<u8>,
    names: Vec<String>,
    ranges: FxHashMap<String, Range<usize>>,
}

impl CompactStore {
    /// Open from a `.data.dz` path, an `.index` path, or the bare base name
    pub fn open(location: &str) -> Result<Self, CorpusError> {
        let canonical = canonicalize(location)?;

        let index_path = PathBuf::from(format!("{}{}", canonical, INDEX_EXT));
        if !index_path.is_file() {
            return Err(CorpusError::open(
                index_path.display().to_string(),
                "not a regular file",
            ));
        }

        let data = read_data(&canonical)?;
        let index = fs::read(&index_path).map_err(|e| CorpusError::io(&index_path, e))?;
        let (names, ranges) = parse_index(&index, data.len())
            .map_err(|reason| CorpusError::open(index_path.display().to_string(), reason))?;

        Ok(Self {
            canonical,
            data,
            names,
            ranges,
        })
    }

    /// Base name shared by the data and index files
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Entry names in index file order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, name: &str) -> Result<String, CorpusError> {
        let range = self
            .ranges
            .get(name)
            .ok_or_else(|| CorpusError::NotFound(name.to_string()))?;
        String::from_utf8(self.data[range.clone()].to_vec()).map_err(|_| CorpusError::Encoding {
            name: name.to_string(),
        })
    }
}

/// Strip a known extension from the location, or accept a bare base name
fn canonicalize(location: &str) -> Result<String, CorpusError> {
    if let Some(base) = location.strip_suffix(DATA_EXT) {
        return Ok(base.to_string());
    }
    if let Some(base) = location.strip_suffix(INDEX_EXT) {
        return Ok(base.to_string());
    }
    if Path::new(&format!("{}{}", location, INDEX_EXT)).is_file() {
        return Ok(location.to_string());
    }
    Err(CorpusError::open(
        location,
        "not an indexed (.dz) corpus file",
    ))
}

fn read_data(canonical: &str) -> Result<Vec<u8>, CorpusError> {
    let compressed = PathBuf::from(format!("{}{}", canonical, DATA_EXT));
    if compressed.is_file() {
        let file = File::open(&compressed).map_err(|e| CorpusError::io(&compressed, e))?;
        let mut data = Vec::new();
        MultiGzDecoder::new(BufReader::new(file))
            .read_to_end(&mut data)
            .map_err(|e| CorpusError::open(compressed.display().to_string(), e.to_string()))?;
        return Ok(data);
    }

    let plain = PathBuf::from(format!("{}{}", canonical, PLAIN_DATA_EXT));
    if plain.is_file() {
        return fs::read(&plain).map_err(|e| CorpusError::io(&plain, e));
    }

    Err(CorpusError::open(
        compressed.display().to_string(),
        "not a regular file",
    ))
}

/// Split off the last field of an index line (tab separated, space tolerated)
fn split_field(line: &[u8]) -> Option<(&[u8], &[u8])> {
    bs_rsplit_once(line, b'\t').or_else(|| bs_rsplit_once(line, b' '))
}

type IndexTable = (Vec<String>, FxHashMap<String, Range<usize>>);

/// Parse index file contents, checking every entry against the data length
fn parse_index(index: &[u8], data_len: usize) -> Result<IndexTable, String> {
    let mut names = Vec::new();
    let mut ranges = FxHashMap::default();

    for (line_num, line) in index.split_inclusive(|&b| b == b'\n').enumerate() {
        let line = bs_trim_newline(line);
        if line.is_empty() {
            continue;
        }

        let malformed = || format!("malformed index line {}", line_num + 1);
        let (rest, size64) = split_field(line).ok_or_else(malformed)?;
        let (name, offset64) = split_field(rest).ok_or_else(malformed)?;

        let offset = b64_decode(offset64).ok_or_else(malformed)? as usize;
        let size = b64_decode(size64).ok_or_else(malformed)? as usize;
        let name = std::str::from_utf8(name)
            .map_err(|_| format!("index line {}: entry name is not UTF-8", line_num + 1))?;

        let end = offset
            .checked_add(size)
            .filter(|&end| end <= data_len)
            .ok_or_else(|| format!("entry {} lies outside the data file", name))?;

        if ranges.insert(name.to_string(), offset..end).is_some() {
            return Err(format!("duplicate entry name: {}", name));
        }
        names.push(name.to_string());
    }

    Ok((names, ranges))
}
