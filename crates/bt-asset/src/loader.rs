use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::LoadError;

/// Fetches tree documents by path.
pub trait ResourceLoader {
    fn load(&self, path: &str) -> Result<String, LoadError>;
}

/// Reads documents from files below a root directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `path` onto the root. Absolute paths and `..` are refused.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(LoadError::OutsideRoot(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        let full = self.resolve(path)?;
        std::fs::read_to_string(&full).map_err(|source| match source.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.to_string()),
            _ => LoadError::Io {
                path: full.display().to_string(),
                source,
            },
        })
    }
}

/// In-memory documents keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: BTreeMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, document: impl Into<String>) -> Self {
        self.insert(path, document);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, document: impl Into<String>) {
        self.documents.insert(path.into(), document.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}
