//! Primitive storage service contract
//!
//! A service exposes single-level operations only. Everything recursive is
//! composed on top of this trait by the adapter, so a new backend needs just
//! these primitives to get recursive create, list and delete for free.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StorageError};
use crate::model::{ByteStream, VirtualDirectory, VirtualFileInfo};

pub use local::LocalStorageService;
pub use memory::MemoryStorageService;

/// Minimal backend contract, addressed by cleaned relative paths
///
/// Implementations must report a missing entry as `NotFound`, denied access
/// as `Unauthorized` and anything else as `Backend`; native error types stay
/// inside the implementation.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Separator the backend uses between path segments
    fn separator(&self) -> char;

    /// Whether the primitive directory delete also removes the contents
    ///
    /// The adapter delegates recursive deletes straight to such backends and
    /// refuses non-recursive ones, since it cannot guarantee emptiness.
    fn native_recursive_delete(&self) -> bool {
        false
    }

    /// Create one directory; parents are not created
    async fn create_directory(&self, path: &str, token: &CancellationToken) -> Result<()>;

    /// Delete one directory
    async fn delete_directory(&self, path: &str, token: &CancellationToken) -> Result<()>;

    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<()>;

    async fn directory_exist(&self, path: &str, token: &CancellationToken) -> Result<bool>;

    async fn file_exist(&self, path: &str, token: &CancellationToken) -> Result<bool>;

    /// Immediate child directories of `path`
    async fn list_directories(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualDirectory>>;

    /// Files directly inside `path`
    async fn list_files(&self, path: &str, token: &CancellationToken)
        -> Result<Vec<VirtualFileInfo>>;

    /// File metadata only
    async fn get_file(&self, path: &str, token: &CancellationToken) -> Result<VirtualFileInfo>;

    async fn read_file(&self, path: &str, token: &CancellationToken) -> Result<ByteStream>;

    /// Store the stream's bytes at `path`, replacing any existing file
    async fn save_file(
        &self,
        path: &str,
        data: ByteStream,
        token: &CancellationToken,
    ) -> Result<()>;
}

/// Fails with `Cancelled` once the token has fired
pub fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        return Err(StorageError::Cancelled);
    }
    Ok(())
}

/// Runs `operation` until it completes or the token fires, whichever is first
pub async fn run_cancellable<T, F>(token: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_active(token)?;
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StorageError::Cancelled),
        result = operation => result,
    }
}
