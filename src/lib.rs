// Storage Adapters Library
// One adapter interface over blob storage, local disk and memory backends

pub mod adapter;
pub mod blob;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod model;
pub mod path;
pub mod service;

pub use adapter::StorageAdapter;
pub use error::{ErrorKind, Result, StorageError};
pub use model::{ByteStream, VirtualDirectory, VirtualFileInfo};
pub use service::StorageService;
