//! Reader configuration
//!
//! Settings can be given in code, or loaded from an optional `corpus.toml`
//! (or any other format the `config` crate understands) overlaid with
//! `CORPUS_*` environment variables, e.g. `CORPUS_TRIGRAM_INDEX=false`.

use crate::error::CorpusError;
use crate::marker::is_xml_name;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Order in which entry names are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Digit runs compare numerically: `2.xml` before `10.xml`
    #[default]
    Natural,
    /// Plain byte order
    Lexical,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// File extensions that count as entries in directory corpora; empty means every file
    pub extensions: Vec<String>,
    pub sort_order: SortOrder,
    /// Build a trigram index to narrow literal text queries
    pub trigram_index: bool,
    /// Element name used to wrap marked regions
    pub mark_element: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xml".to_string()],
            sort_order: SortOrder::Natural,
            trigram_index: true,
            mark_element: "mark".to_string(),
        }
    }
}

impl ReaderConfig {
    /// Whether a file name has one of the configured entry extensions
    pub fn accepts_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }

    /// Reject settings that would only fail later, e.g. a mark element
    /// that is not an XML name
    pub fn validate(&self) -> Result<(), CorpusError> {
        if !is_xml_name(&self.mark_element) {
            return Err(CorpusError::InvalidMarker(self.mark_element.clone()));
        }
        Ok(())
    }
}

/// Load configuration from `corpus.*` in the working directory (if present) and the environment
pub fn load_config() -> Result<ReaderConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("corpus").required(false))
        .add_source(
            Environment::with_prefix("CORPUS")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("extensions"),
        )
        .build()?;

    config.try_deserialize()
}

/// Load configuration from one explicit file
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ReaderConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()))
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert_eq!(config.extensions, vec!["xml".to_string()]);
        assert_eq!(config.sort_order, SortOrder::Natural);
        assert!(config.trigram_index);
        assert_eq!(config.mark_element, "mark");
    }

    #[test]
    fn test_accepts_extension() {
        let config = ReaderConfig::default();
        assert!(config.accepts_extension(Path::new("a/b/1.xml")));
        assert!(!config.accepts_extension(Path::new("a/b/1.txt")));
        assert!(!config.accepts_extension(Path::new("README")));

        let all = ReaderConfig {
            extensions: Vec::new(),
            ..ReaderConfig::default()
        };
        assert!(all.accepts_extension(Path::new("README")));
    }

    #[test]
    fn test_validate_mark_element() {
        assert!(ReaderConfig::default().validate().is_ok());

        for element in ["", "not valid", "1mark", "a<b"] {
            let config = ReaderConfig {
                mark_element: element.to_string(),
                ..ReaderConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(CorpusError::InvalidMarker(name)) if name == element
            ));
        }
    }

    #[test]
    fn test_load_from_file_keeps_missing_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.toml");
        fs::write(
            &path,
            "extensions = [\"txt\", \"xml\"]\nsort_order = \"lexical\"\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.extensions, vec!["txt".to_string(), "xml".to_string()]);
        assert_eq!(config.sort_order, SortOrder::Lexical);
        assert!(config.trigram_index);
        assert_eq!(config.mark_element, "mark");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(load_config_from(dir.path().join("nope.toml")).is_err());
    }
}
