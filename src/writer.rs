//! Writing compact corpora
//!
//! Produces the `<base>.data.dz` / `<base>.index` pair read by
//! [`CompactStore`](crate::compact::CompactStore). Entry contents are
//! concatenated into one gzip stream; the index records where each one
//! starts in the uncompressed data.

use crate::bytes::b64_encode;
use crate::compact::{DATA_EXT, INDEX_EXT};
use crate::error::{BatchError, CorpusError};
use crate::reader::Reader;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Writer for a new compact corpus
pub struct CompactWriter {
    data_path: PathBuf,
    index_path: PathBuf,
    data: Option<GzEncoder<BufWriter<File>>>,
    index: BufWriter<File>,
    offset: u64,
    entries: usize,
}

impl CompactWriter {
    /// Create (or truncate) `<base>.data.dz` and `<base>.index`
    pub fn create(base: &str) -> Result<Self, CorpusError> {
        let data_path = PathBuf::from(format!("{}{}", base, DATA_EXT));
        let index_path = PathBuf::from(format!("{}{}", base, INDEX_EXT));

        let data = File::create(&data_path)
            .map_err(|e| CorpusError::open(data_path.display().to_string(), e.to_string()))?;
        let index = File::create(&index_path)
            .map_err(|e| CorpusError::open(index_path.display().to_string(), e.to_string()))?;

        Ok(Self {
            data: Some(GzEncoder::new(BufWriter::new(data), Compression::default())),
            index: BufWriter::new(index),
            data_path,
            index_path,
            offset: 0,
            entries: 0,
        })
    }

    /// Append one entry
    pub fn write_entry(&mut self, name: &str, content: &str) -> Result<(), CorpusError> {
        if name.is_empty() || name.contains(['\t', '\n', '\r']) {
            return Err(CorpusError::InvalidEntryName(name.to_string()));
        }
        let data = self
            .data
            .as_mut()
            .ok_or_else(|| CorpusError::open(self.data_path.display().to_string(), "writer finished"))?;

        data.write_all(content.as_bytes())
            .map_err(|e| CorpusError::io(&self.data_path, e))?;
        writeln!(
            self.index,
            "{}\t{}\t{}",
            name,
            b64_encode(self.offset),
            b64_encode(content.len() as u64)
        )
        .map_err(|e| CorpusError::io(&self.index_path, e))?;

        self.offset += content.len() as u64;
        self.entries += 1;
        Ok(())
    }

    /// Copy every entry of an open corpus
    ///
    /// With `fail_first` the first error aborts the copy. Otherwise failing
    /// entries are skipped and all errors are reported together as one
    /// [`CorpusError::Batch`].
    pub fn write_corpus(&mut self, reader: &Reader, fail_first: bool) -> Result<(), CorpusError> {
        let mut batch = BatchError::new();

        for name in reader.entries() {
            let result = name.and_then(|name| {
                let content = reader.read(&name)?;
                self.write_entry(&name, &content)
            });

            match result {
                Ok(()) => {}
                Err(e) if fail_first => return Err(e),
                Err(e) => {
                    warn!(error = %e, "skipping entry during corpus copy");
                    batch.push(e);
                }
            }
        }

        if batch.is_empty() {
            Ok(())
        } else {
            Err(CorpusError::Batch(batch))
        }
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Complete the gzip stream and flush both files
    pub fn finish(mut self) -> Result<(), CorpusError> {
        self.finish_files()
    }

    fn finish_files(&mut self) -> Result<(), CorpusError> {
        if let Some(data) = self.data.take() {
            let mut inner = data
                .finish()
                .map_err(|e| CorpusError::io(&self.data_path, e))?;
            inner
                .flush()
                .map_err(|e| CorpusError::io(&self.data_path, e))?;
            self.index
                .flush()
                .map_err(|e| CorpusError::io(&self.index_path, e))?;
            debug!(
                data = %self.data_path.display(),
                entries = self.entries,
                "finished compact corpus"
            );
        }
        Ok(())
    }
}

impl Drop for CompactWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish_files() {
            warn!(error = %e, "failed to finish compact corpus on drop");
        }
    }
}
