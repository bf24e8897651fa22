//! Entry stores: the durable name → content mapping behind a corpus
//!
//! The opener tries a directory corpus first and falls back to a compact
//! corpus. In-memory stores are built from pairs, and multi stores combine
//! several corpora under name prefixes.

use crate::compact::{CompactStore, INDEX_EXT};
use crate::config::ReaderConfig;
use crate::error::CorpusError;
use rustc_hash::FxHashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Backing storage of an open corpus
#[derive(Debug)]
pub enum EntryStore {
    /// Entries given in code
    Memory(MemoryStore),
    /// One file per entry below a directory
    Directory(DirectoryStore),
    /// A `.data.dz` / `.index` pair
    Compact(CompactStore),
    /// Several corpora, each under its own name prefix
    Multi(MultiStore),
}

impl EntryStore {
    /// Open the store at `location`
    pub fn open(location: &str, config: &ReaderConfig) -> Result<Self, CorpusError> {
        let path = Path::new(location);
        if path.is_dir() {
            return DirectoryStore::open(path, config).map(EntryStore::Directory);
        }

        if !path.exists() && !Path::new(&format!("{}.index", location)).exists() {
            return Err(CorpusError::open(location, "non-existent or not readable"));
        }
        CompactStore::open(location).map(EntryStore::Compact)
    }

    /// Short description of the store kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            EntryStore::Memory(_) => "memory",
            EntryStore::Directory(_) => "directory",
            EntryStore::Compact(_) => "compact",
            EntryStore::Multi(_) => "multi",
        }
    }

    /// Canonical name of the corpus behind this store
    pub fn canonical(&self) -> &str {
        match self {
            EntryStore::Memory(store) => &store.name,
            EntryStore::Directory(store) => &store.canonical,
            EntryStore::Compact(store) => store.canonical(),
            EntryStore::Multi(store) => &store.name,
        }
    }

    /// Every entry name, in discovery order
    pub fn names(&self) -> &[String] {
        match self {
            EntryStore::Memory(store) => &store.names,
            EntryStore::Directory(store) => &store.names,
            EntryStore::Compact(store) => store.names(),
            EntryStore::Multi(store) => &store.names,
        }
    }

    /// Content of one entry
    pub fn get(&self, name: &str) -> Result<String, CorpusError> {
        match self {
            EntryStore::Memory(store) => store
                .contents
                .get(name)
                .cloned()
                .ok_or_else(|| CorpusError::NotFound(name.to_string())),
            EntryStore::Directory(store) => store.get(name),
            EntryStore::Compact(store) => store.get(name),
            EntryStore::Multi(store) => store.get(name),
        }
    }
}

/// Entries held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    names: Vec<String>,
    contents: FxHashMap<String, String>,
}

impl MemoryStore {
    /// Build from `(name, content)` pairs; names must be unique
    pub fn from_pairs<I, N, C>(name: &str, pairs: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let mut store = MemoryStore {
            name: name.to_string(),
            ..MemoryStore::default()
        };
        for (entry_name, content) in pairs {
            let entry_name = entry_name.into();
            if store.contents.contains_key(&entry_name) {
                return Err(CorpusError::DuplicateKey(entry_name));
            }
            store.contents.insert(entry_name.clone(), content.into());
            store.names.push(entry_name);
        }
        Ok(store)
    }
}

/// A directory whose files are the entries
#[derive(Debug)]
pub struct DirectoryStore {
    /// Absolute, symlink-free form of the location
    root: PathBuf,
    canonical: String,
    names: Vec<String>,
}

impl DirectoryStore {
    pub fn open(root: &Path, config: &ReaderConfig) -> Result<Self, CorpusError> {
        let canonical = root
            .to_str()
            .ok_or_else(|| CorpusError::open(root.display().to_string(), "path is not UTF-8"))?
            .trim_end_matches('/')
            .to_string();

        // Fail early on unreadable directories
        fs::read_dir(root).map_err(|e| CorpusError::open(&canonical, e.to_string()))?;

        // glob drops `./` from the paths it yields, so match and strip against
        // the resolved root instead of the location as given
        let resolved = fs::canonicalize(root).map_err(|e| CorpusError::open(&canonical, e.to_string()))?;
        let base = resolved
            .to_str()
            .ok_or_else(|| CorpusError::open(&canonical, "path is not UTF-8"))?
            .trim_end_matches('/');

        let pattern = format!("{}/**/*", glob::Pattern::escape(base));
        let paths = glob::glob(&pattern).map_err(|e| CorpusError::open(&canonical, e.to_string()))?;

        let mut names = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable path");
                    continue;
                }
            };
            if !path.is_file() || !config.accepts_extension(&path) {
                continue;
            }
            match relative_name(&resolved, &path) {
                Some(name) => names.push(name),
                None => warn!(path = %path.display(), "skipping file with a non-UTF-8 name"),
            }
        }

        debug!(root = %canonical, entries = names.len(), "discovered directory corpus");
        Ok(Self {
            root: resolved,
            canonical,
            names,
        })
    }

    fn get(&self, name: &str) -> Result<String, CorpusError> {
        let path = self.root.join(name);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CorpusError::NotFound(name.to_string()),
            _ => CorpusError::io(path, e),
        })?;
        String::from_utf8(bytes).map_err(|_| CorpusError::Encoding {
            name: name.to_string(),
        })
    }
}

/// Several corpora combined into one; entry names are `<prefix>/<name>`
#[derive(Debug)]
pub struct MultiStore {
    name: String,
    parts: Vec<(String, EntryStore)>,
    names: Vec<String>,
    /// Entry name → (part, name within the part)
    lookup: FxHashMap<String, (usize, String)>,
}

impl MultiStore {
    /// Open each `(prefix, location)` pair as its own corpus
    pub fn open<I, P, L>(corpora: I, config: &ReaderConfig) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: AsRef<str>,
    {
        let mut parts = Vec::new();
        for (prefix, location) in corpora {
            parts.push((prefix.into(), EntryStore::open(location.as_ref(), config)?));
        }
        Self::from_parts("<multi>", parts)
    }

    /// Every compact corpus below `directory`, prefixed by its path without `.index`
    pub fn open_recursive(directory: &str, config: &ReaderConfig) -> Result<Self, CorpusError> {
        let root = Path::new(directory);
        if !root.is_dir() {
            return Err(CorpusError::open(directory, "non-existent or not a directory"));
        }
        let resolved = fs::canonicalize(root).map_err(|e| CorpusError::open(directory, e.to_string()))?;
        let base = resolved
            .to_str()
            .ok_or_else(|| CorpusError::open(directory, "path is not UTF-8"))?
            .trim_end_matches('/');

        let pattern = format!("{}/**/*{}", glob::Pattern::escape(base), INDEX_EXT);
        let paths = glob::glob(&pattern).map_err(|e| CorpusError::open(directory, e.to_string()))?;

        let mut parts = Vec::new();
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable path");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(prefix) = relative_name(&resolved, &path)
                .and_then(|name| name.strip_suffix(INDEX_EXT).map(str::to_string))
            else {
                warn!(path = %path.display(), "skipping corpus with a non-UTF-8 name");
                continue;
            };
            let location = path.to_string_lossy().into_owned();
            parts.push((prefix, EntryStore::Compact(CompactStore::open(&location)?)));
        }

        debug!(root = directory, corpora = parts.len(), "discovered recursive corpus");
        Self::from_parts(directory.trim_end_matches('/'), parts)
    }

    fn from_parts(name: &str, parts: Vec<(String, EntryStore)>) -> Result<Self, CorpusError> {
        let mut names = Vec::new();
        let mut lookup = FxHashMap::default();
        for (part, (prefix, store)) in parts.iter().enumerate() {
            for inner in store.names() {
                let full = format!("{}/{}", prefix, inner);
                if lookup.insert(full.clone(), (part, inner.clone())).is_some() {
                    return Err(CorpusError::DuplicateKey(full));
                }
                names.push(full);
            }
        }
        Ok(Self {
            name: name.to_string(),
            parts,
            names,
            lookup,
        })
    }

    /// Name prefixes of the combined corpora, in the order given
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(prefix, _)| prefix.as_str())
    }

    fn get(&self, name: &str) -> Result<String, CorpusError> {
        let (part, inner) = self
            .lookup
            .get(name)
            .ok_or_else(|| CorpusError::NotFound(name.to_string()))?;
        self.parts[*part].1.get(inner)
    }
}

/// Entry name of a file: its path below the root, `/`-separated
fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = EntryStore::Memory(
            MemoryStore::from_pairs("mem", [("a", "The cat sat."), ("b", "Dogs run fast.")]).unwrap(),
        );
        assert_eq!(store.kind(), "memory");
        assert_eq!(store.canonical(), "mem");
        assert_eq!(store.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(store.get("b").unwrap(), "Dogs run fast.");
        assert!(matches!(store.get("c"), Err(CorpusError::NotFound(_))));
    }

    #[test]
    fn test_memory_store_duplicate() {
        let result = MemoryStore::from_pairs("mem", [("a", "1"), ("a", "2")]);
        assert!(matches!(result, Err(CorpusError::DuplicateKey(name)) if name == "a"));
    }

    #[test]
    fn test_directory_store() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("1.xml"), "<one/>").unwrap();
        fs::write(dir.path().join("sub/2.xml"), "<two/>").unwrap();
        fs::write(dir.path().join("sub/deeper/3.xml"), "<three/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let location = dir.path().to_str().unwrap();
        let store = EntryStore::open(location, &ReaderConfig::default()).unwrap();
        assert_eq!(store.kind(), "directory");

        let mut names = store.names().to_vec();
        names.sort();
        assert_eq!(names, vec!["1.xml", "sub/2.xml", "sub/deeper/3.xml"]);
        assert_eq!(store.get("sub/deeper/3.xml").unwrap(), "<three/>");
        assert!(matches!(store.get("4.xml"), Err(CorpusError::NotFound(_))));
    }

    #[test]
    fn test_directory_store_all_extensions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        fs::write(dir.path().join("b"), "B").unwrap();

        let config = ReaderConfig {
            extensions: Vec::new(),
            ..ReaderConfig::default()
        };
        let store = EntryStore::open(dir.path().to_str().unwrap(), &config).unwrap();
        let mut names = store.names().to_vec();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b"]);
    }

    #[test]
    fn test_directory_store_encoding_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.xml"), [0xff, 0xfe, 0x00]).unwrap();

        let store = EntryStore::open(dir.path().to_str().unwrap(), &ReaderConfig::default()).unwrap();
        assert!(matches!(store.get("bad.xml"), Err(CorpusError::Encoding { .. })));
    }

    #[test]
    fn test_open_missing_location() {
        let dir = tempdir().unwrap();
        let location = dir.path().join("does-not-exist");
        let result = EntryStore::open(location.to_str().unwrap(), &ReaderConfig::default());
        assert!(matches!(result, Err(CorpusError::Open { .. })));
    }

    #[test]
    fn test_directory_store_relative_locations() {
        let dir = tempfile::Builder::new().prefix("store-rel").tempdir_in(".").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("1.xml"), "<one/>").unwrap();
        fs::write(dir.path().join("sub/2.xml"), "<two/>").unwrap();
        let name = dir.path().file_name().unwrap().to_str().unwrap();

        for location in [
            format!("./{}", name),
            name.to_string(),
            format!("{}/", name),
            format!("./{}/", name),
        ] {
            let store = EntryStore::open(&location, &ReaderConfig::default()).unwrap();
            let mut names = store.names().to_vec();
            names.sort();
            assert_eq!(names, vec!["1.xml", "sub/2.xml"], "location {}", location);
            assert_eq!(store.get("sub/2.xml").unwrap(), "<two/>");
            assert_eq!(store.canonical(), location.trim_end_matches('/'));
        }
    }

    fn write_compact(base: &Path, entries: &[(&str, &str)]) {
        let mut writer = crate::writer::CompactWriter::create(base.to_str().unwrap()).unwrap();
        for (name, content) in entries {
            writer.write_entry(name, content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_recursive_store() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        write_compact(&dir.path().join("a/one"), &[("1.xml", "The cat sat."), ("2.xml", "Dogs.")]);
        write_compact(&dir.path().join("two"), &[("1.xml", "A bird.")]);
        fs::write(dir.path().join("stray.xml"), "<not-a-corpus/>").unwrap();

        let store = EntryStore::Multi(
            MultiStore::open_recursive(dir.path().to_str().unwrap(), &ReaderConfig::default()).unwrap(),
        );
        assert_eq!(store.kind(), "multi");

        let mut names = store.names().to_vec();
        names.sort();
        assert_eq!(names, vec!["a/one/1.xml", "a/one/2.xml", "two/1.xml"]);
        assert_eq!(store.get("a/one/2.xml").unwrap(), "Dogs.");
        assert_eq!(store.get("two/1.xml").unwrap(), "A bird.");
        assert!(matches!(store.get("two/2.xml"), Err(CorpusError::NotFound(_))));
        assert!(matches!(store.get("1.xml"), Err(CorpusError::NotFound(_))));
    }

    #[test]
    fn test_recursive_store_requires_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            MultiStore::open_recursive(missing.to_str().unwrap(), &ReaderConfig::default()),
            Err(CorpusError::Open { .. })
        ));
    }

    #[test]
    fn test_multi_store() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain");
        fs::create_dir(&plain).unwrap();
        fs::write(plain.join("1.xml"), "<one/>").unwrap();
        let packed = dir.path().join("packed");
        write_compact(&packed, &[("1.xml", "<packed/>")]);

        let multi = MultiStore::open(
            [
                ("plain", plain.to_str().unwrap()),
                ("packed", packed.to_str().unwrap()),
            ],
            &ReaderConfig::default(),
        )
        .unwrap();
        assert_eq!(multi.prefixes().collect::<Vec<_>>(), vec!["plain", "packed"]);

        let store = EntryStore::Multi(multi);
        assert_eq!(store.canonical(), "<multi>");
        assert_eq!(store.names(), &["plain/1.xml".to_string(), "packed/1.xml".to_string()]);
        assert_eq!(store.get("packed/1.xml").unwrap(), "<packed/>");
    }

    #[test]
    fn test_multi_store_duplicate_names() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("c");
        write_compact(&base, &[("1.xml", "x")]);
        let location = base.to_str().unwrap();

        let result = MultiStore::open([("p", location), ("p", location)], &ReaderConfig::default());
        assert!(matches!(result, Err(CorpusError::DuplicateKey(name)) if name == "p/1.xml"));
    }

    #[test]
    fn test_open_unrecognized_file() {
        let dir = tempdir().unwrap();
        let location = dir.path().join("plain.txt");
        fs::write(&location, "just text").unwrap();
        let result = EntryStore::open(location.to_str().unwrap(), &ReaderConfig::default());
        assert!(matches!(result, Err(CorpusError::Open { .. })));
    }
}
