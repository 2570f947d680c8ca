// End-to-end adapter tests against the local-disk backend

use rand::RngCore;
use std::path::MAIN_SEPARATOR;
use storage_adapters::config::LocalConfig;
use storage_adapters::model::{collect_stream, stream_from_bytes};
use storage_adapters::service::LocalStorageService;
use storage_adapters::{ErrorKind, StorageAdapter};
use tempfile::TempDir;

fn local_adapter() -> (StorageAdapter, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = LocalConfig::new(dir.path().to_string_lossy().into_owned());
    config.expand_environment_variables = false;
    let service = LocalStorageService::new(config).unwrap();
    (StorageAdapter::with_defaults(service), dir)
}

#[tokio::test]
async fn test_mkdir_parents_on_disk() {
    let (adapter, dir) = local_adapter();
    adapter.create_directory("a/b/c", true).await.unwrap();

    assert!(dir.path().join("a").join("b").join("c").is_dir());
    assert!(adapter.directory_exist("a\\b").await.unwrap());
}

#[tokio::test]
async fn test_random_payload_round_trip() {
    let (adapter, dir) = local_adapter();
    let mut payload = vec![0u8; 20001];
    rand::thread_rng().fill_bytes(&mut payload);

    adapter.create_directory("data", false).await.unwrap();
    adapter
        .save_file("data/blob.bin", stream_from_bytes(payload.clone()))
        .await
        .unwrap();

    // ReaderStream yields several chunks for this size
    let data = collect_stream(adapter.read_file("data/blob.bin").await.unwrap())
        .await
        .unwrap();
    assert_eq!(&data[..], &payload[..]);
    assert_eq!(std::fs::read(dir.path().join("data").join("blob.bin")).unwrap(), payload);

    let info = adapter.get_file("data/blob.bin").await.unwrap();
    assert_eq!(info.size, 20001);
    assert_eq!(info.name, "blob.bin");
}

#[tokio::test]
async fn test_recursive_delete_on_disk() {
    let (adapter, dir) = local_adapter();
    for directory in ["tree/x/y", "tree/z"] {
        adapter.create_directory(directory, true).await.unwrap();
    }
    for (i, file) in ["tree/1", "tree/x/2", "tree/x/y/3", "tree/z/4"].iter().enumerate() {
        adapter
            .save_file(file, stream_from_bytes(vec![i as u8; 100]))
            .await
            .unwrap();
    }

    let files = adapter.list_files_recursive("tree").await.unwrap();
    assert_eq!(files.len(), 4);

    adapter.delete_directory("tree", true).await.unwrap();
    assert!(!dir.path().join("tree").exists());
    assert!(dir.path().exists());
}

#[tokio::test]
async fn test_non_recursive_delete_refuses_non_empty_directory() {
    let (adapter, dir) = local_adapter();
    adapter.create_directory("keep", false).await.unwrap();
    adapter
        .save_file("keep/file.txt", stream_from_bytes(&b"x"[..]))
        .await
        .unwrap();

    assert!(adapter.delete_directory("keep", false).await.is_err());
    assert!(dir.path().join("keep").join("file.txt").exists());
}

#[tokio::test]
async fn test_escape_attempt_is_invalid_path() {
    let (adapter, _dir) = local_adapter();
    let err = adapter
        .save_file("../escaped.txt", stream_from_bytes(&b"x"[..]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let (adapter, _dir) = local_adapter();
    assert_eq!(
        adapter.read_file("nope.txt").await.err().unwrap().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        adapter.delete_file("nope.txt").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_listing_paths_use_platform_separator() {
    let (adapter, _dir) = local_adapter();
    adapter.create_directory("p/q", true).await.unwrap();
    let directories = adapter.list_directories_recursive("").await.unwrap();
    let paths: Vec<String> = directories.into_iter().map(|d| d.path).collect();
    assert_eq!(paths, vec!["p".to_string(), format!("p{}q", MAIN_SEPARATOR)]);
}
