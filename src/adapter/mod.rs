//! Storage adapter: the public facade over one storage service
//!
//! The adapter cleans every path, applies the default timeout to calls made
//! without a token and builds the recursive operations out of the service's
//! single-level primitives, so they behave the same on every backend.
//!
//! Every operation comes in two forms: `op(..)` runs under the adapter's
//! default timeout, `op_with_token(.., &token)` runs until the caller's token
//! is cancelled.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::blob::BlobStorageService;
use crate::config::{AdapterConfig, BackendConfig, Config, TraversalDepth};
use crate::error::{Result, StorageError};
use crate::model::{ByteStream, VirtualDirectory, VirtualFileInfo};
use crate::path;
use crate::service::{ensure_active, LocalStorageService, MemoryStorageService, StorageService};

#[derive(Debug, Clone, Copy)]
enum EntryKind {
    File,
    Directory,
}

/// Unified file and directory operations over any [`StorageService`]
pub struct StorageAdapter {
    service: Arc<dyn StorageService>,
    default_timeout: Duration,
    traversal: TraversalDepth,
}

impl StorageAdapter {
    pub fn new(service: impl StorageService + 'static, config: &AdapterConfig) -> Self {
        Self::from_arc(Arc::new(service), config)
    }

    pub fn from_arc(service: Arc<dyn StorageService>, config: &AdapterConfig) -> Self {
        Self {
            service,
            default_timeout: config.default_timeout(),
            traversal: config.traversal,
        }
    }

    /// Builds the configured backend and wraps it
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(StorageError::Configuration)?;
        let service: Arc<dyn StorageService> = match &config.backend {
            BackendConfig::Blob(blob) => Arc::new(BlobStorageService::new(blob.clone())?),
            BackendConfig::Local(local) => Arc::new(LocalStorageService::new(local.clone())?),
            BackendConfig::Memory => Arc::new(MemoryStorageService::new()),
        };
        tracing::debug!(
            backend = ?config.backend,
            timeout_secs = config.adapter.default_timeout_secs,
            traversal = ?config.adapter.traversal,
            "Storage adapter created"
        );
        Ok(Self::from_arc(service, &config.adapter))
    }

    /// Adapter with the default timeout and unbounded traversal
    pub fn with_defaults(service: impl StorageService + 'static) -> Self {
        Self::new(service, &AdapterConfig::default())
    }

    pub fn service(&self) -> &Arc<dyn StorageService> {
        &self.service
    }

    pub fn separator(&self) -> char {
        self.service.separator()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    pub fn traversal(&self) -> TraversalDepth {
        self.traversal
    }

    /// Joins the non-blank parts with the backend separator
    pub fn path_combine<S: AsRef<str>>(&self, parts: &[S]) -> Result<String> {
        if parts.is_empty() {
            return Err(StorageError::ArgumentNull("parts"));
        }
        Ok(path::combine(self.separator(), parts))
    }

    /// Runs `operation` under the default timeout, cancelling `token` on expiry
    async fn timed<T>(
        &self,
        token: &CancellationToken,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.default_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                tracing::warn!(
                    timeout_ms = self.default_timeout.as_millis() as u64,
                    "Storage operation timed out"
                );
                Err(StorageError::Timeout(self.default_timeout))
            }
        }
    }

    fn clean(&self, path: &str) -> String {
        path::clean(self.separator(), path)
    }

    /// Cleaned file path; a file can never be the root
    fn clean_file(&self, path: &str) -> Result<String> {
        if path::is_root_path(path) {
            return Err(StorageError::ArgumentNull("path"));
        }
        let cleaned = self.clean(path);
        if cleaned.is_empty() {
            return Err(StorageError::ArgumentNull("path"));
        }
        Ok(cleaned)
    }

    fn join(&self, parent: &str, name: &str) -> String {
        path::combine(self.separator(), &[parent, name])
    }

    // Directories

    pub async fn create_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let token = CancellationToken::new();
        self.timed(&token, self.create_directory_with_token(path, recursive, &token))
            .await
    }

    /// Creates `path`; with `recursive` every missing ancestor is created first
    ///
    /// Not atomic: concurrent callers creating overlapping paths may both see
    /// an ancestor missing, which the services tolerate.
    pub async fn create_directory_with_token(
        &self,
        path: &str,
        recursive: bool,
        token: &CancellationToken,
    ) -> Result<()> {
        ensure_active(token)?;
        let separator = self.separator();
        let path = self.clean(path);
        if path.is_empty() {
            // The root always exists
            return Ok(());
        }

        if !recursive || !path.contains(separator) {
            return self.service.create_directory(&path, token).await;
        }

        let parent = path::directory_name(separator, &path);
        if self.service.directory_exist(&parent, token).await? {
            ensure_active(token)?;
            return self.service.create_directory(&path, token).await;
        }

        let mut current = String::new();
        for segment in path::segments(separator, &path) {
            ensure_active(token)?;
            current = self.join(&current, &segment);
            if !self.service.directory_exist(&current, token).await? {
                ensure_active(token)?;
                tracing::debug!(path = %current, "Creating missing directory");
                self.service.create_directory(&current, token).await?;
            }
        }
        Ok(())
    }

    pub async fn delete_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let token = CancellationToken::new();
        self.timed(&token, self.delete_directory_with_token(path, recursive, &token))
            .await
    }

    /// Deletes `path`; with `recursive` its whole subtree goes first
    ///
    /// Files are deleted concurrently, then subdirectories one depth level at
    /// a time (deepest first, each level concurrently), then `path` itself.
    /// Nothing is rolled back when a delete fails.
    pub async fn delete_directory_with_token(
        &self,
        path: &str,
        recursive: bool,
        token: &CancellationToken,
    ) -> Result<()> {
        ensure_active(token)?;
        let path = self.clean(path);
        if path.is_empty() {
            return Err(StorageError::InvalidPath(
                "The root directory cannot be deleted".to_string(),
            ));
        }

        if self.service.native_recursive_delete() {
            if !recursive {
                return Err(StorageError::NotSupported(format!(
                    "Non-recursive delete of '{}' is not supported by this backend",
                    path
                )));
            }
            return self.service.delete_directory(&path, token).await;
        }

        if !recursive {
            return self.service.delete_directory(&path, token).await;
        }

        let levels = self.walk(&path, TraversalDepth::Unbounded, token).await?;
        let mut files = Vec::new();
        let directories = levels.iter().flatten().map(|d| d.path.as_str());
        for directory in std::iter::once(path.as_str()).chain(directories) {
            ensure_active(token)?;
            files.extend(
                self.service
                    .list_files(directory, token)
                    .await?
                    .into_iter()
                    .map(|file| file.path),
            );
        }

        tracing::info!(
            path = %path,
            files = files.len(),
            directories = levels.iter().map(Vec::len).sum::<usize>(),
            "Deleting directory recursively"
        );

        self.delete_concurrently(EntryKind::File, files, token).await?;
        for level in levels.into_iter().rev() {
            let directories = level.into_iter().map(|d| d.path).collect();
            self.delete_concurrently(EntryKind::Directory, directories, token)
                .await?;
        }

        ensure_active(token)?;
        self.service.delete_directory(&path, token).await
    }

    /// Deletes every entry concurrently and waits for all of them
    ///
    /// Every failure is logged; the first one is returned.
    async fn delete_concurrently(
        &self,
        kind: EntryKind,
        paths: Vec<String>,
        token: &CancellationToken,
    ) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        ensure_active(token)?;

        let results = join_all(paths.iter().map(|path| async move {
            let result = match kind {
                EntryKind::File => self.service.delete_file(path, token).await,
                EntryKind::Directory => self.service.delete_directory(path, token).await,
            };
            (path, result)
        }))
        .await;

        let mut first_error = None;
        for (path, result) in results {
            if let Err(e) = result {
                tracing::warn!(path = %path, kind = ?kind, error = %e, "Delete failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Directories below `root`, grouped by depth (children first)
    ///
    /// `TwoLevel` lists the children of each immediate child and nothing
    /// else; that single level is the whole result.
    async fn walk(
        &self,
        root: &str,
        depth: TraversalDepth,
        token: &CancellationToken,
    ) -> Result<Vec<Vec<VirtualDirectory>>> {
        ensure_active(token)?;
        let children = self.service.list_directories(root, token).await?;

        match depth {
            TraversalDepth::TwoLevel => {
                let mut grandchildren = Vec::new();
                for child in &children {
                    ensure_active(token)?;
                    grandchildren.extend(self.service.list_directories(&child.path, token).await?);
                }
                Ok(vec![grandchildren])
            }
            TraversalDepth::Unbounded => {
                let mut levels = Vec::new();
                let mut current = children;
                while !current.is_empty() {
                    let mut next = Vec::new();
                    for directory in &current {
                        ensure_active(token)?;
                        next.extend(self.service.list_directories(&directory.path, token).await?);
                    }
                    levels.push(current);
                    current = next;
                }
                Ok(levels)
            }
        }
    }

    pub async fn directory_exist(&self, path: &str) -> Result<bool> {
        let token = CancellationToken::new();
        self.timed(&token, self.directory_exist_with_token(path, &token))
            .await
    }

    pub async fn directory_exist_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<bool> {
        ensure_active(token)?;
        let path = self.clean(path);
        if path.is_empty() {
            return Ok(true);
        }
        self.service.directory_exist(&path, token).await
    }

    pub async fn list_directories(&self, path: &str) -> Result<Vec<VirtualDirectory>> {
        let token = CancellationToken::new();
        self.timed(&token, self.list_directories_with_token(path, &token))
            .await
    }

    pub async fn list_directories_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualDirectory>> {
        ensure_active(token)?;
        self.service.list_directories(&self.clean(path), token).await
    }

    pub async fn list_directories_recursive(&self, path: &str) -> Result<Vec<VirtualDirectory>> {
        let token = CancellationToken::new();
        self.timed(&token, self.list_directories_recursive_with_token(path, &token))
            .await
    }

    /// Every directory below `path`, breadth first
    ///
    /// With [`TraversalDepth::TwoLevel`] only the children of the immediate
    /// children are returned, and the immediate children themselves are not.
    pub async fn list_directories_recursive_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualDirectory>> {
        let path = self.clean(path);
        let levels = self.walk(&path, self.traversal, token).await?;
        Ok(levels.into_iter().flatten().collect())
    }

    pub async fn list_files(&self, path: &str) -> Result<Vec<VirtualFileInfo>> {
        let token = CancellationToken::new();
        self.timed(&token, self.list_files_with_token(path, &token)).await
    }

    pub async fn list_files_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualFileInfo>> {
        ensure_active(token)?;
        self.service.list_files(&self.clean(path), token).await
    }

    pub async fn list_files_recursive(&self, path: &str) -> Result<Vec<VirtualFileInfo>> {
        let token = CancellationToken::new();
        self.timed(&token, self.list_files_recursive_with_token(path, &token))
            .await
    }

    /// Files in `path` plus the files of every directory the recursive
    /// directory listing reaches
    pub async fn list_files_recursive_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualFileInfo>> {
        let path = self.clean(path);
        let directories = self.list_directories_recursive_with_token(&path, token).await?;

        ensure_active(token)?;
        let mut files = self.service.list_files(&path, token).await?;
        for directory in directories {
            ensure_active(token)?;
            files.extend(self.service.list_files(&directory.path, token).await?);
        }
        Ok(files)
    }

    // Files

    pub async fn get_file(&self, path: &str) -> Result<VirtualFileInfo> {
        let token = CancellationToken::new();
        self.timed(&token, self.get_file_with_token(path, &token)).await
    }

    pub async fn get_file_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<VirtualFileInfo> {
        ensure_active(token)?;
        let path = self.clean_file(path)?;
        self.service.get_file(&path, token).await
    }

    pub async fn file_exist(&self, path: &str) -> Result<bool> {
        let token = CancellationToken::new();
        self.timed(&token, self.file_exist_with_token(path, &token)).await
    }

    pub async fn file_exist_with_token(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        ensure_active(token)?;
        let path = self.clean_file(path)?;
        self.service.file_exist(&path, token).await
    }

    /// Opens the file for reading
    ///
    /// The default timeout covers opening the file, not draining the stream.
    pub async fn read_file(&self, path: &str) -> Result<ByteStream> {
        let token = CancellationToken::new();
        self.timed(&token, self.read_file_with_token(path, &token)).await
    }

    pub async fn read_file_with_token(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<ByteStream> {
        ensure_active(token)?;
        let path = self.clean_file(path)?;
        self.service.read_file(&path, token).await
    }

    pub async fn save_file(&self, path: &str, data: ByteStream) -> Result<()> {
        let token = CancellationToken::new();
        self.timed(&token, self.save_file_with_token(path, data, &token))
            .await
    }

    pub async fn save_file_with_token(
        &self,
        path: &str,
        data: ByteStream,
        token: &CancellationToken,
    ) -> Result<()> {
        ensure_active(token)?;
        let path = self.clean_file(path)?;
        self.service.save_file(&path, data, token).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let token = CancellationToken::new();
        self.timed(&token, self.delete_file_with_token(path, &token)).await
    }

    pub async fn delete_file_with_token(&self, path: &str, token: &CancellationToken) -> Result<()> {
        ensure_active(token)?;
        let path = self.clean_file(path)?;
        self.service.delete_file(&path, token).await
    }
}
