use std::path::{Path, PathBuf};

use crate::error::StateError;

/// Layout of the persistent data directory.
///
/// The root holds the librespot credential cache (`credentials.json`) and a
/// `download/` directory with finished mp3 files keyed by sanitized title.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Use the given path, or fall back to the platform data dir
    /// (e.g. `~/.local/share/toniesync`)
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, StateError> {
        let root = explicit
            .or_else(|| dirs::data_dir().map(|dir| dir.join("toniesync")))
            .ok_or(StateError::NoDataDir)?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.join("download")
    }

    /// Create the directory layout if it does not exist yet
    pub fn ensure(&self) -> Result<(), StateError> {
        for dir in [self.root.clone(), self.download_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| StateError::CreateDirectoryFailed {
                    path: dir.clone(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }

    /// Delete `.partial` files left behind by interrupted transcodes,
    /// returning how many were removed
    pub fn clean_partials(&self) -> Result<usize, StateError> {
        let dir = self.download_dir();
        let mut cleaned = 0;

        let entries = std::fs::read_dir(&dir).map_err(|e| StateError::ReadDirectoryFailed {
            path: dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| StateError::ReadDirectoryFailed {
                path: dir.clone(),
                source: e,
            })?;

            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".partial"));

            if is_partial && std::fs::remove_file(&path).is_ok() {
                cleaned += 1;
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_prefers_explicit_path() {
        let data = DataDir::resolve(Some(PathBuf::from("/tmp/custom"))).unwrap();
        assert_eq!(data.root(), Path::new("/tmp/custom"));
        assert_eq!(data.download_dir(), PathBuf::from("/tmp/custom/download"));
    }

    #[test]
    fn ensure_creates_layout() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");
        let data = DataDir::resolve(Some(root.clone())).unwrap();

        data.ensure().unwrap();

        assert!(root.exists());
        assert!(root.join("download").exists());
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let data = DataDir::resolve(Some(dir.path().to_path_buf())).unwrap();

        data.ensure().unwrap();
        data.ensure().unwrap();
    }

    #[test]
    fn clean_partials_removes_only_partial_files() {
        let dir = tempdir().unwrap();
        let data = DataDir::resolve(Some(dir.path().to_path_buf())).unwrap();
        data.ensure().unwrap();

        let download = data.download_dir();
        std::fs::write(download.join("Song.mp3.partial"), b"half").unwrap();
        std::fs::write(download.join("Other.mp3.partial"), b"half").unwrap();
        std::fs::write(download.join("Done.mp3"), b"full").unwrap();

        let cleaned = data.clean_partials().unwrap();

        assert_eq!(cleaned, 2);
        assert!(!download.join("Song.mp3.partial").exists());
        assert!(download.join("Done.mp3").exists());
    }
}
