//! Corpus entries

/// A named unit of corpus content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub content: String,
}

impl Entry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Name shortened to its last directory and file component
    ///
    /// The directory's extension is dropped, so `wr-p.dact/17.xml` becomes
    /// `wr-p/17.xml`. Names without a directory are returned unchanged.
    pub fn short_name(&self) -> String {
        let mut components = self.name.rsplit('/').filter(|c| !c.is_empty());
        let (Some(file), Some(dir)) = (components.next(), components.next()) else {
            return self.name.clone();
        };

        let dir = match dir.rfind('.') {
            Some(dot) if dot > 0 => &dir[..dot],
            _ => dir,
        };
        format!("{}/{}", dir, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(Entry::new("wr-p.dact/17.xml", "").short_name(), "wr-p/17.xml");
        assert_eq!(
            Entry::new("treebanks/cdb/1.xml", "").short_name(),
            "cdb/1.xml"
        );
        assert_eq!(Entry::new("1.xml", "").short_name(), "1.xml");
        assert_eq!(Entry::new(".hidden/1.xml", "").short_name(), ".hidden/1.xml");
    }
}
