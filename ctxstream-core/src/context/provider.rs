//! File provider contract and implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::ContextFile;

/// Source of file contents for a context.
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Read a file, or `None` if it cannot be read.
    async fn read_file(&self, path: &str) -> Option<String>;
}

/// Reads files from the local filesystem. `~` is expanded to the home directory.
#[derive(Debug, Clone, Default)]
pub struct FsFileProvider;

impl FsFileProvider {
    pub fn new() -> Self {
        Self
    }

    /// Read a file, surfacing the underlying I/O error.
    pub async fn try_read(&self, path: &str) -> Result<String> {
        let expanded = shellexpand::tilde(path);
        tokio::fs::read_to_string(expanded.as_ref())
            .await
            .map_err(|e| Error::io(path, e))
    }
}

#[async_trait]
impl FileProvider for FsFileProvider {
    async fn read_file(&self, path: &str) -> Option<String> {
        match self.try_read(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                debug!("Could not read {}: {}", path, e);
                None
            }
        }
    }
}

/// In-memory provider for embedders that already hold the contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileProvider {
    files: HashMap<String, String>,
}

impl InMemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

#[async_trait]
impl FileProvider for InMemoryFileProvider {
    async fn read_file(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Read `paths` in order into context files, skipping unreadable ones.
pub async fn collect_files<P, S>(provider: &P, paths: &[S]) -> Vec<ContextFile>
where
    P: FileProvider + ?Sized,
    S: AsRef<str>,
{
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match provider.read_file(path).await {
            Some(content) => files.push(ContextFile::new(path, content)),
            None => warn!("Skipping unreadable context file: {}", path),
        }
    }
    files
}
