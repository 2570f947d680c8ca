//! Entries returned by storage queries and the byte stream type

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;

use crate::error::Result;

/// Byte stream consumed by `save_file` and produced by `read_file`
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A leaf entry. Built fresh for every query, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualFileInfo {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
}

/// A non-leaf entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VirtualDirectory {
    pub name: String,
    pub path: String,
}

impl std::fmt::Display for VirtualDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Wraps an in-memory buffer as a single-chunk stream
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    stream::once(async move { Ok(data) }).boxed()
}

/// Drains a stream into one contiguous buffer
pub async fn collect_stream(mut stream: ByteStream) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer.freeze())
}
