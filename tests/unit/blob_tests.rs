// Blob protocol client tests against a scripted transport

use chrono::{TimeZone, Utc};
use http::Method;
use std::sync::Arc;
use storage_adapters::blob::mock_transport::{MockConnector, MockTransport};
use storage_adapters::blob::signing::{canonicalized_resource, sign_request, SigningContext};
use storage_adapters::blob::{BlobStorageService, HttpRequest, HttpResponse, Sha256Hmac};
use storage_adapters::config::BlobConfig;
use storage_adapters::model::stream_from_bytes;
use storage_adapters::{ErrorKind, StorageAdapter};

const LAST_MODIFIED: &str = "Fri, 26 Jun 2015 23:39:12 GMT";

fn blob_adapter() -> (StorageAdapter, MockTransport) {
    let transport = MockTransport::new();
    let service = BlobStorageService::with_providers(
        BlobConfig::new("myaccount", "c2VjcmV0"),
        Arc::new(MockConnector::new(transport.clone())),
        Arc::new(Sha256Hmac),
    )
    .unwrap();
    (StorageAdapter::with_defaults(service), transport)
}

fn listing(blobs: &[&str], prefixes: &[&str]) -> HttpResponse {
    let mut xml = String::from("<EnumerationResults><Blobs>");
    for name in blobs {
        xml.push_str(&format!(
            "<Blob><Name>{}</Name><Properties><Last-Modified>{}</Last-Modified><Content-Length>10</Content-Length></Properties></Blob>",
            name, LAST_MODIFIED
        ));
    }
    for prefix in prefixes {
        xml.push_str(&format!("<BlobPrefix><Name>{}</Name></BlobPrefix>", prefix));
    }
    xml.push_str("</Blobs><NextMarker /></EnumerationResults>");
    HttpResponse::new(200, "OK").with_body(xml)
}

#[tokio::test]
async fn test_recursive_delete_of_container_is_one_request() {
    let (adapter, transport) = blob_adapter();
    transport.push_response(HttpResponse::new(202, "Accepted"));

    adapter.delete_directory("photos", true).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::DELETE);
    assert_eq!(
        requests[0].url,
        "https://myaccount.blob.core.windows.net/photos?restype=container"
    );
}

#[tokio::test]
async fn test_non_recursive_container_delete_is_not_supported() {
    let (adapter, transport) = blob_adapter();
    let err = adapter.delete_directory("photos", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_deleting_blob_prefix_is_not_supported() {
    let (adapter, _) = blob_adapter();
    let err = adapter.delete_directory("photos/2015", true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[tokio::test]
async fn test_recursive_file_listing_follows_prefixes() {
    let (adapter, transport) = blob_adapter();
    // Directory walk
    transport.push_response(listing(&["top.txt"], &["2015/"]));
    transport.push_response(listing(&["2015/a.jpg"], &[]));
    // File listing per directory
    transport.push_response(listing(&["top.txt"], &["2015/"]));
    transport.push_response(listing(&["2015/a.jpg"], &[]));

    let files = adapter.list_files_recursive("photos").await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["photos/top.txt", "photos/2015/a.jpg"]);
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn test_recursive_create_only_touches_the_container() {
    let (adapter, transport) = blob_adapter();
    // Parent check, existence check and create for "photos", then the
    // deeper prefixes report their container as existing
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(201, "Created"));
    transport.push_response(HttpResponse::new(200, "OK"));
    transport.push_response(HttpResponse::new(200, "OK"));

    adapter.create_directory("photos/2015/june", true).await.unwrap();

    let requests = transport.requests();
    let methods: Vec<Method> = requests.iter().map(|r| r.method.clone()).collect();
    assert_eq!(
        methods,
        vec![
            Method::HEAD,
            Method::HEAD,
            Method::HEAD,
            Method::PUT,
            Method::HEAD,
            Method::HEAD
        ]
    );
    assert!(requests
        .iter()
        .all(|r| r.url.ends_with("/photos?restype=container")));
}

#[tokio::test]
async fn test_recursive_create_survives_container_created_concurrently() {
    // Test: another caller creates the container between our HEAD and PUT
    let (adapter, transport) = blob_adapter();
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(404, "Not Found"));
    transport.push_response(HttpResponse::new(
        409,
        "The specified container already exists.",
    ));
    transport.push_response(HttpResponse::new(200, "OK"));

    let result = adapter.create_directory("shared/left", true).await;

    assert!(result.is_ok(), "unexpected error: {:?}", result);
    let methods: Vec<Method> = transport.requests().iter().map(|r| r.method.clone()).collect();
    assert_eq!(
        methods,
        vec![Method::HEAD, Method::HEAD, Method::HEAD, Method::PUT, Method::HEAD]
    );
    assert_eq!(transport.pending(), 0);
}

#[tokio::test]
async fn test_upload_through_adapter() {
    let (adapter, transport) = blob_adapter();
    transport.push_response(HttpResponse::new(201, "Created"));

    adapter
        .save_file("/photos/cat.jpg", stream_from_bytes(vec![1u8; 2048]))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://myaccount.blob.core.windows.net/photos/cat.jpg");
    assert_eq!(request.body.len(), 2048);
    assert_eq!(request.header("x-ms-blob-type"), Some("BlockBlob"));
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let (adapter, transport) = blob_adapter();
    transport.push_response(HttpResponse::new(503, "Server Busy"));

    let err = adapter.get_file("photos/cat.jpg").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert!(err.to_string().contains("503"));
    assert!(err.to_string().contains("Server Busy"));
}

#[test]
fn test_signature_is_reproducible_for_fixed_input() {
    let context = SigningContext {
        account_name: "myaccount".to_string(),
        account_key: b"secret".to_vec(),
        default_headers: vec![
            ("x-ms-version".to_string(), "2015-04-05".to_string()),
            ("x-ms-client-request-id".to_string(), "storage-adapters".to_string()),
        ],
    };
    let now = Utc.with_ymd_and_hms(2015, 6, 26, 23, 39, 12).unwrap();

    let sign = || {
        let mut request =
            HttpRequest::new(Method::GET, "https://myaccount.blob.core.windows.net/?comp=list");
        sign_request(&mut request, &context, &Sha256Hmac, now);
        request.header("Authorization").map(str::to_string)
    };

    assert_eq!(sign(), sign());
    assert_eq!(
        sign().as_deref(),
        Some("SharedKey myaccount:S3IDxqLmPvD38ATmBkotBr0Vzv+FU81rVFEsEF4u4fU=")
    );
}

#[test]
fn test_emulator_resource_includes_account_twice() {
    // The emulator serves the account under a path segment of its own
    let config = BlobConfig::development();
    let request = HttpRequest::new(Method::GET, format!("{}/photos", config.base_url()));
    assert_eq!(
        canonicalized_resource(&config.account_name, &request),
        "/devstoreaccount1/devstoreaccount1/photos"
    );
}
