// Storage adapter composite operation tests (in-memory backend)

use rand::RngCore;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use storage_adapters::config::{AdapterConfig, TraversalDepth};
use storage_adapters::model::{collect_stream, stream_from_bytes};
use storage_adapters::service::MemoryStorageService;
use storage_adapters::{ErrorKind, StorageAdapter};
use tokio_util::sync::CancellationToken;

fn memory_adapter() -> (StorageAdapter, MemoryStorageService) {
    let service = MemoryStorageService::new();
    (StorageAdapter::with_defaults(service.clone()), service)
}

#[rstest]
#[case(1, 0)]
#[case(0, 1)]
#[case(3, 2)]
#[case(25, 10)]
#[tokio::test]
async fn test_recursive_delete_leaves_nothing_behind(#[case] files: usize, #[case] subdirectories: usize) {
    let (adapter, service) = memory_adapter();
    adapter.create_directory("root/target", true).await.unwrap();

    // Scenario: N files directly inside, M subdirectories each holding a file and a nested directory
    for i in 0..files {
        adapter
            .save_file(&format!("root/target/file{}.bin", i), stream_from_bytes(vec![i as u8; 16]))
            .await
            .unwrap();
    }
    for i in 0..subdirectories {
        let nested = format!("root/target/sub{}/deeper", i);
        adapter.create_directory(&nested, true).await.unwrap();
        adapter
            .save_file(&format!("{}/leaf.txt", nested), stream_from_bytes(&b"leaf"[..]))
            .await
            .unwrap();
    }

    adapter.delete_directory("root/target", true).await.unwrap();

    assert!(!adapter.directory_exist("root/target").await.unwrap());
    assert!(adapter.directory_exist("root").await.unwrap());
    assert_eq!(service.file_count(), 0);
    assert_eq!(service.directory_count(), 1);
}

#[tokio::test]
async fn test_round_trip_crosses_chunk_boundaries() {
    let (adapter, _) = memory_adapter();
    let mut payload = vec![0u8; 20001];
    rand::thread_rng().fill_bytes(&mut payload);

    adapter
        .save_file("payload.bin", stream_from_bytes(payload.clone()))
        .await
        .unwrap();
    let data = collect_stream(adapter.read_file("payload.bin").await.unwrap())
        .await
        .unwrap();

    assert_eq!(data.len(), payload.len());
    assert_eq!(&data[..], &payload[..]);
}

#[tokio::test]
async fn test_get_file_reports_size_and_recent_timestamp() {
    let (adapter, _) = memory_adapter();
    adapter
        .save_file("sized.bin", stream_from_bytes(vec![7u8; 1234]))
        .await
        .unwrap();

    let info = adapter.get_file("sized.bin").await.unwrap();
    assert_eq!(info.size, 1234);
    let age = chrono::Utc::now() - info.last_modified;
    assert!(age < chrono::Duration::seconds(60));
}

#[tokio::test]
async fn test_missing_entries_are_not_found() {
    let (adapter, _) = memory_adapter();

    // Test: DeleteFile and GetFile on absent files fail with NotFound
    assert_eq!(
        adapter.delete_file("absent.txt").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        adapter.get_file("absent.txt").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        adapter.list_files("absent").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(!adapter.file_exist("absent.txt").await.unwrap());
    assert!(!adapter.directory_exist("absent").await.unwrap());
}

#[tokio::test]
async fn test_create_then_delete_round_trip() {
    let (adapter, _) = memory_adapter();
    adapter.create_directory("made", false).await.unwrap();
    assert!(adapter.directory_exist("made").await.unwrap());
    adapter.delete_directory("made", false).await.unwrap();
    assert!(!adapter.directory_exist("made").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_overlapping_creates_both_succeed() {
    let service = MemoryStorageService::new();
    let adapter = Arc::new(StorageAdapter::with_defaults(service.clone()));

    let first = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.create_directory("shared/left/one", true).await })
    };
    let second = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.create_directory("shared/right/two", true).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    for path in ["shared", "shared/left/one", "shared/right/two"] {
        assert!(adapter.directory_exist(path).await.unwrap(), "{} missing", path);
    }
    assert_eq!(service.directory_count(), 5);
}

#[tokio::test]
async fn test_cancellation_between_primitive_calls() {
    let service = MemoryStorageService::new();
    let adapter = StorageAdapter::with_defaults(service.clone());
    service.set_latency(Some(Duration::from_millis(30)));

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = adapter
        .create_directory_with_token("a/b/c/d/e/f/g/h/i/j", true, &token)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    // Partial progress stays in place, nothing is rolled back
    service.set_latency(None);
    let created = service.directory_count();
    assert!(created < 10, "expected a partial tree, got {} directories", created);
}

#[tokio::test]
async fn test_default_timeout_is_configurable() {
    let config = AdapterConfig {
        default_timeout_secs: 1,
        traversal: TraversalDepth::Unbounded,
    };
    let service = MemoryStorageService::new();
    let mut adapter = StorageAdapter::new(service.clone(), &config);
    assert_eq!(adapter.default_timeout(), Duration::from_secs(1));

    adapter.set_default_timeout(Duration::from_millis(10));
    service.set_latency(Some(Duration::from_secs(5)));
    let err = adapter.list_directories("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_unauthorized_is_propagated_unchanged() {
    let (adapter, service) = memory_adapter();
    service.set_permission_denied(true);
    let err = adapter.list_directories_recursive("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_recursive_listing_of_leaf_directory_is_empty() {
    let (adapter, _) = memory_adapter();
    adapter.create_directory("leaf", false).await.unwrap();
    assert!(adapter.list_directories_recursive("leaf").await.unwrap().is_empty());
    assert!(adapter.list_files_recursive("leaf").await.unwrap().is_empty());
}

#[test]
fn test_path_combine_uses_backend_separator() {
    let adapter = StorageAdapter::with_defaults(MemoryStorageService::new());
    assert_eq!(adapter.path_combine(&["a", "b", "", "c"]).unwrap(), "a/b/c");
    assert!(tokio_test::block_on(adapter.directory_exist("/")).unwrap());
}
