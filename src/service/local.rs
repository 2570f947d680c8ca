//! Local-disk backend built on tokio::fs
//!
//! Every path is resolved below a base directory. Resolution is lexical, so
//! `..` segments are collapsed before the containment check and paths that
//! do not exist yet can still be validated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use regex::Regex;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::{run_cancellable, StorageService};
use crate::config::LocalConfig;
use crate::error::{Result, StorageError};
use crate::model::{ByteStream, VirtualDirectory, VirtualFileInfo};
use crate::path;

/// Portable filesystem backend rooted at a base directory
#[derive(Debug)]
pub struct LocalStorageService {
    config: LocalConfig,
    base: PathBuf,
}

impl LocalStorageService {
    pub fn new(config: LocalConfig) -> Result<Self> {
        if config.base_directory.trim().is_empty() {
            return Err(StorageError::Configuration(
                "Local base directory cannot be empty".to_string(),
            ));
        }

        let base_directory = if config.expand_environment_variables {
            expand_env(&config.base_directory)
        } else {
            config.base_directory.clone()
        };
        let base = normalize(Path::new(&base_directory));

        Ok(Self { config, base })
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    pub fn base_directory(&self) -> &Path {
        &self.base
    }

    /// Absolute location of `path`, refusing anything that escapes the base
    pub fn full_path(&self, path: &str) -> Result<PathBuf> {
        let mut relative = path::clean(MAIN_SEPARATOR, path);
        if self.config.expand_environment_variables {
            relative = expand_env(&relative);
        }

        let full = normalize(&self.base.join(relative));
        if !self.config.allow_base_directory_escape && !full.starts_with(&self.base) {
            return Err(StorageError::InvalidPath(format!(
                "'{}' escapes the base directory",
                path
            )));
        }
        Ok(full)
    }

    /// Append bytes to an existing file
    pub async fn append_file(
        &self,
        path: &str,
        data: &[u8],
        token: &CancellationToken,
    ) -> Result<()> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&full)
                .await
                .map_err(|e| not_found_as(e, "File", path))?;
            file.write_all(data).await?;
            file.flush().await?;
            Ok(())
        })
        .await
    }

    fn file_info(path: &str, metadata: &std::fs::Metadata) -> VirtualFileInfo {
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        VirtualFileInfo {
            name: path::file_name(MAIN_SEPARATOR, path),
            path: path::clean(MAIN_SEPARATOR, path),
            size: metadata.len() as i64,
            last_modified,
        }
    }

    async fn read_entries(&self, path: &str) -> Result<Vec<(String, std::fs::Metadata)>> {
        let full = self.full_path(path)?;
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| not_found_as(e, "Directory", path))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            entries.push((entry.file_name().to_string_lossy().into_owned(), metadata));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    fn separator(&self) -> char {
        MAIN_SEPARATOR
    }

    async fn create_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            match tokio::fs::create_dir(&full).await {
                Ok(()) => Ok(()),
                // Lost a benign race with another creator
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && full.is_dir() => Ok(()),
                Err(e) => Err(not_found_as(e, "Parent directory", path)),
            }
        })
        .await
    }

    async fn delete_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        if path::is_root_path(path) {
            return Err(StorageError::InvalidPath(
                "The base directory cannot be deleted".to_string(),
            ));
        }
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            tokio::fs::remove_dir(&full)
                .await
                .map_err(|e| not_found_as(e, "Directory", path))
        })
        .await
    }

    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            let metadata = tokio::fs::metadata(&full)
                .await
                .map_err(|e| not_found_as(e, "File", path))?;
            if !metadata.is_file() {
                return Err(StorageError::NotFound(format!("File not found: {}", path)));
            }
            tokio::fs::remove_file(&full).await?;
            Ok(())
        })
        .await
    }

    async fn directory_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            match tokio::fs::metadata(&full).await {
                Ok(metadata) => Ok(metadata.is_dir()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn file_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            match tokio::fs::metadata(&full).await {
                Ok(metadata) => Ok(metadata.is_file()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn list_directories(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualDirectory>> {
        let entries = run_cancellable(token, self.read_entries(path)).await?;
        Ok(entries
            .into_iter()
            .filter(|(_, metadata)| metadata.is_dir())
            .map(|(name, _)| VirtualDirectory {
                path: path::combine(MAIN_SEPARATOR, &[path, name.as_str()]),
                name,
            })
            .collect())
    }

    async fn list_files(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<Vec<VirtualFileInfo>> {
        let entries = run_cancellable(token, self.read_entries(path)).await?;
        Ok(entries
            .into_iter()
            .filter(|(_, metadata)| metadata.is_file())
            .map(|(name, metadata)| {
                let file_path = path::combine(MAIN_SEPARATOR, &[path, name.as_str()]);
                Self::file_info(&file_path, &metadata)
            })
            .collect())
    }

    async fn get_file(&self, path: &str, token: &CancellationToken) -> Result<VirtualFileInfo> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            let metadata = tokio::fs::metadata(&full)
                .await
                .map_err(|e| not_found_as(e, "File", path))?;
            if !metadata.is_file() {
                return Err(StorageError::NotFound(format!("File not found: {}", path)));
            }
            Ok(Self::file_info(path, &metadata))
        })
        .await
    }

    async fn read_file(&self, path: &str, token: &CancellationToken) -> Result<ByteStream> {
        let full = self.full_path(path)?;
        let file = run_cancellable(token, async {
            tokio::fs::File::open(&full)
                .await
                .map_err(|e| not_found_as(e, "File", path))
        })
        .await?;

        Ok(ReaderStream::new(file)
            .map(|chunk| chunk.map_err(StorageError::from))
            .boxed())
    }

    async fn save_file(
        &self,
        path: &str,
        mut data: ByteStream,
        token: &CancellationToken,
    ) -> Result<()> {
        let full = self.full_path(path)?;
        run_cancellable(token, async {
            let mut file = tokio::fs::File::create(&full)
                .await
                .map_err(|e| not_found_as(e, "Directory", &path::directory_name(MAIN_SEPARATOR, path)))?;
            while let Some(chunk) = data.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            Ok(())
        })
        .await
    }
}

/// Maps an io error, naming the missing entry when it is a NotFound
fn not_found_as(err: std::io::Error, what: &str, path: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(format!("{} not found: {}", what, path))
    } else {
        err.into()
    }
}

/// Collapses `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Expands `$VAR` and `${VAR}`; unset variables are left untouched
fn expand_env(input: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("valid environment variable pattern")
    });

    re.replace_all(input, |caps: &regex::Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
