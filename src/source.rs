//! File Source
//!
//! Directory-backed loader: the value of `key` is the content of
//! `<root>/<key>`. Keys are flat file names; anything that could escape the
//! root directory is rejected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::group::Getter;

/// Loader reading one file per key from a directory
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory values are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
            return Err(Error::InvalidArgument(format!("invalid key for file source: {:?}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Getter for FileSource {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        debug!(path = %path.display(), "Reading from file source");

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(key.to_string())),
            Err(e) => Err(Error::Loader(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("peercache-source-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_file_per_key() {
        let dir = scratch_dir("read");
        std::fs::write(dir.join("Tom"), b"630").unwrap();

        let source = FileSource::new(&dir);
        assert_eq!(source.get("Tom").await.unwrap(), b"630".to_vec());
        assert_matches!(source.get("Jack").await, Err(Error::NotFound(key)) if key == "Jack");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let source = FileSource::new(scratch_dir("escape"));
        for key in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert_matches!(source.get(key).await, Err(Error::InvalidArgument(_)), "key {:?}", key);
        }
        std::fs::remove_dir_all(source.root()).unwrap();
    }
}
