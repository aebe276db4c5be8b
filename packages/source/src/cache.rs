use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::stylesheet::{Stylesheet, StylesheetError};

/// Cached state for one file
#[derive(Debug, Clone)]
pub struct CachedFile {
    pub source: String,

    /// Bumped every time the content changes
    pub version: u64,

    stylesheet: Option<Stylesheet>,
}

impl CachedFile {
    fn new(source: String, version: u64) -> Self {
        Self {
            source,
            version,
            stylesheet: None,
        }
    }

    /// Scanned stylesheet, built on first use
    pub fn stylesheet(&mut self) -> Result<&Stylesheet, StylesheetError> {
        let sheet = match self.stylesheet.take() {
            Some(sheet) => sheet,
            None => Stylesheet::parse(&self.source)?,
        };
        Ok(self.stylesheet.insert(sheet))
    }
}

/// Per-engine file cache keyed by absolute path
#[derive(Debug, Default)]
pub struct FileCache {
    files: HashMap<PathBuf, CachedFile>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` from disk, reusing the cached entry when the content is unchanged
    pub fn load(&mut self, path: &Path) -> io::Result<&mut CachedFile> {
        let on_disk = std::fs::read_to_string(path)?;

        let stale = match self.files.get(path) {
            Some(cached) => cached.source != on_disk,
            None => true,
        };

        if stale {
            let version = self.files.get(path).map(|f| f.version + 1).unwrap_or(1);
            debug!(path = %path.display(), version, "Reloading file into cache");
            self.files
                .insert(path.to_path_buf(), CachedFile::new(on_disk, version));
        }

        self.files
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "cache entry vanished"))
    }

    /// Record content that was just written to disk
    pub fn store(&mut self, path: &Path, source: String) {
        let version = self.files.get(path).map(|f| f.version + 1).unwrap_or(1);
        self.files
            .insert(path.to_path_buf(), CachedFile::new(source, version));
    }

    pub fn get(&self, path: &Path) -> Option<&CachedFile> {
        self.files.get(path)
    }

    /// Drop one entry, returns whether it was cached
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let removed = self.files.remove(path).is_some();
        if removed {
            debug!(path = %path.display(), "Invalidated cache entry");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_reload_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, ".a { color: red; }").unwrap();

        let mut cache = FileCache::new();
        assert_eq!(cache.load(&path).unwrap().version, 1);
        assert_eq!(cache.load(&path).unwrap().version, 1);

        std::fs::write(&path, ".a { color: blue; }").unwrap();
        let file = cache.load(&path).unwrap();
        assert_eq!(file.version, 2);
        assert!(file.source.contains("blue"));
    }

    #[test]
    fn test_stylesheet_is_lazy_and_reset_on_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, ".a { color: red; }").unwrap();

        let mut cache = FileCache::new();
        let rules = cache.load(&path).unwrap().stylesheet().unwrap().rules.len();
        assert_eq!(rules, 1);

        let next = ".a { color: red; } .b { color: blue; }".to_string();
        std::fs::write(&path, &next).unwrap();
        cache.store(&path, next);
        let file = cache.load(&path).unwrap();
        assert_eq!(file.version, 2);
        assert_eq!(file.stylesheet().unwrap().rules.len(), 2);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tsx");
        std::fs::write(&path, "<p>hi</p>").unwrap();

        let mut cache = FileCache::new();
        cache.load(&path).unwrap();
        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));

        cache.load(&path).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let mut cache = FileCache::new();
        let err = cache.load(Path::new("/definitely/not/here.css")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
