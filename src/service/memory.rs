//! In-memory storage backend (HashMap storage)
//!
//! Useful for tests and as the reference implementation of the primitive
//! contract. Failure and latency injection let tests drive the adapter's
//! error and cancellation paths.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ensure_active, run_cancellable, StorageService};
use crate::error::{Result, StorageError};
use crate::model::{collect_stream, stream_from_bytes, ByteStream, VirtualDirectory, VirtualFileInfo};
use crate::path;

const SEPARATOR: char = '/';

#[derive(Clone)]
struct MemoryFile {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// Directories keyed by path; each holds its files keyed by name
type Tree = HashMap<String, HashMap<String, MemoryFile>>;

/// Backend that keeps every directory and file in memory
#[derive(Clone)]
pub struct MemoryStorageService {
    tree: Arc<RwLock<Tree>>,
    /// Simulate errors if set
    permission_denied: Arc<RwLock<bool>>,
    failing_paths: Arc<RwLock<HashSet<String>>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl Default for MemoryStorageService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageService {
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(String::new(), HashMap::new());
        Self {
            tree: Arc::new(RwLock::new(tree)),
            permission_denied: Arc::new(RwLock::new(false)),
            failing_paths: Arc::new(RwLock::new(HashSet::new())),
            latency: Arc::new(RwLock::new(None)),
        }
    }

    /// Enable permission denied simulation for testing
    pub fn set_permission_denied(&self, enabled: bool) {
        *self.permission_denied.write() = enabled;
    }

    /// Make every operation addressing `path` fail with a backend error
    pub fn fail_on(&self, path: &str) {
        self.failing_paths.write().insert(path.to_string());
    }

    /// Delay every operation, honouring cancellation while waiting
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of stored files across all directories
    pub fn file_count(&self) -> usize {
        self.tree.read().values().map(HashMap::len).sum()
    }

    /// Number of directories, the root excluded
    pub fn directory_count(&self) -> usize {
        self.tree.read().len() - 1
    }

    async fn enter(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            run_cancellable(token, async {
                tokio::time::sleep(latency).await;
                Ok(())
            })
            .await?;
        }
        ensure_active(token)?;

        if *self.permission_denied.read() {
            return Err(StorageError::Unauthorized(format!(
                "Simulated permission denied: {}",
                path
            )));
        }
        if self.failing_paths.read().contains(path) {
            return Err(StorageError::backend(format!("Simulated failure: {}", path)));
        }
        Ok(())
    }

    fn split(path: &str) -> (String, String) {
        (
            path::directory_name(SEPARATOR, path),
            path::file_name(SEPARATOR, path),
        )
    }

    fn file_info(path: &str, name: &str, file: &MemoryFile) -> VirtualFileInfo {
        VirtualFileInfo {
            name: name.to_string(),
            path: path.to_string(),
            size: file.data.len() as i64,
            last_modified: file.last_modified,
        }
    }

    fn lookup(&self, path: &str) -> Result<MemoryFile> {
        let (parent, name) = Self::split(path);
        let tree = self.tree.read();
        let directory = tree
            .get(&parent)
            .ok_or_else(|| StorageError::NotFound(format!("Directory not found: {}", parent)))?;
        directory
            .get(&name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("File not found: {}", path)))
    }
}

#[async_trait]
impl StorageService for MemoryStorageService {
    fn separator(&self) -> char {
        SEPARATOR
    }

    async fn create_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        self.enter(path, token).await?;
        let mut tree = self.tree.write();
        if tree.contains_key(path) {
            return Ok(());
        }
        let parent = path::directory_name(SEPARATOR, path);
        if !tree.contains_key(&parent) {
            return Err(StorageError::NotFound(format!(
                "Parent directory not found: {}",
                parent
            )));
        }
        tree.insert(path.to_string(), HashMap::new());
        Ok(())
    }

    async fn delete_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        self.enter(path, token).await?;
        if path.is_empty() {
            return Err(StorageError::InvalidPath(
                "The root directory cannot be deleted".to_string(),
            ));
        }
        let mut tree = self.tree.write();
        let Some(files) = tree.get(path) else {
            return Err(StorageError::NotFound(format!(
                "Directory not found: {}",
                path
            )));
        };
        let has_children = tree
            .keys()
            .any(|key| !key.is_empty() && path::directory_name(SEPARATOR, key) == path);
        if !files.is_empty() || has_children {
            return Err(StorageError::backend(format!(
                "Directory not empty: {}",
                path
            )));
        }
        tree.remove(path);
        Ok(())
    }

    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<()> {
        self.enter(path, token).await?;
        let (parent, name) = Self::split(path);
        let mut tree = self.tree.write();
        let directory = tree
            .get_mut(&parent)
            .ok_or_else(|| StorageError::NotFound(format!("Directory not found: {}", parent)))?;
        match directory.remove(&name) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!("File not found: {}", path))),
        }
    }

    async fn directory_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        self.enter(path, token).await?;
        Ok(self.tree.read().contains_key(path))
    }

    async fn file_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        self.enter(path, token).await?;
        match self.lookup(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_directories(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualDirectory>> {
        self.enter(path, token).await?;
        let tree = self.tree.read();
        if !tree.contains_key(path) {
            return Err(StorageError::NotFound(format!(
                "Directory not found: {}",
                path
            )));
        }

        let mut directories: Vec<VirtualDirectory> = tree
            .keys()
            .filter(|key| !key.is_empty() && path::directory_name(SEPARATOR, key) == path)
            .map(|key| VirtualDirectory {
                name: path::file_name(SEPARATOR, key),
                path: key.clone(),
            })
            .collect();
        directories.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(directories)
    }

    async fn list_files(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualFileInfo>> {
        self.enter(path, token).await?;
        let tree = self.tree.read();
        let directory = tree
            .get(path)
            .ok_or_else(|| StorageError::NotFound(format!("Directory not found: {}", path)))?;

        let mut files: Vec<VirtualFileInfo> = directory
            .iter()
            .map(|(name, file)| {
                let file_path = path::combine(SEPARATOR, &[path, name.as_str()]);
                Self::file_info(&file_path, name, file)
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn get_file(&self, path: &str, token: &CancellationToken) -> Result<VirtualFileInfo> {
        self.enter(path, token).await?;
        let file = self.lookup(path)?;
        Ok(Self::file_info(path, &path::file_name(SEPARATOR, path), &file))
    }

    async fn read_file(&self, path: &str, token: &CancellationToken) -> Result<ByteStream> {
        self.enter(path, token).await?;
        let file = self.lookup(path)?;
        Ok(stream_from_bytes(file.data))
    }

    async fn save_file(
        &self,
        path: &str,
        data: ByteStream,
        token: &CancellationToken,
    ) -> Result<()> {
        self.enter(path, token).await?;
        let data = run_cancellable(token, collect_stream(data)).await?;

        let (parent, name) = Self::split(path);
        let mut tree = self.tree.write();
        let directory = tree
            .get_mut(&parent)
            .ok_or_else(|| StorageError::NotFound(format!("Directory not found: {}", parent)))?;
        directory.insert(
            name,
            MemoryFile {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }
}
