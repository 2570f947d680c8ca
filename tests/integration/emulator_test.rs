// Blob backend tests against a running storage emulator
// Requires an emulator listening on 127.0.0.1:10000 (e.g. Azurite)
// Run with: cargo test --test integration_tests -- --ignored

use rand::RngCore;
use storage_adapters::blob::BlobStorageService;
use storage_adapters::config::BlobConfig;
use storage_adapters::model::{collect_stream, stream_from_bytes};
use storage_adapters::{ErrorKind, StorageAdapter};

fn emulator_adapter() -> StorageAdapter {
    let service = BlobStorageService::new(BlobConfig::development()).unwrap();
    StorageAdapter::with_defaults(service)
}

fn unique_container() -> String {
    format!("test{}", rand::random::<u32>())
}

#[tokio::test]
#[ignore]
async fn test_emulator_container_lifecycle() {
    let adapter = emulator_adapter();
    let container = unique_container();

    adapter.create_directory(&container, false).await.unwrap();
    assert!(adapter.directory_exist(&container).await.unwrap());

    adapter.delete_directory(&container, true).await.unwrap();
    assert!(!adapter.directory_exist(&container).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_emulator_blob_round_trip() {
    let adapter = emulator_adapter();
    let container = unique_container();
    adapter.create_directory(&container, false).await.unwrap();

    let mut payload = vec![0u8; 20001];
    rand::thread_rng().fill_bytes(&mut payload);
    let path = format!("{}/nested/payload.bin", container);

    adapter
        .save_file(&path, stream_from_bytes(payload.clone()))
        .await
        .unwrap();
    let data = collect_stream(adapter.read_file(&path).await.unwrap())
        .await
        .unwrap();
    assert_eq!(&data[..], &payload[..]);

    let info = adapter.get_file(&path).await.unwrap();
    assert_eq!(info.size, 20001);

    let files = adapter.list_files_recursive(&container).await.unwrap();
    assert_eq!(files.len(), 1);

    adapter.delete_file(&path).await.unwrap();
    assert_eq!(
        adapter.get_file(&path).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    adapter.delete_directory(&container, true).await.unwrap();
}
