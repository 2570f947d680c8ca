//! Blob storage backend
//!
//! Directory semantics are mapped onto the flat container/blob model: the
//! first path segment is a container, the rest is the blob name. Deeper
//! "directories" are only blob-name prefixes and exist implicitly.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Utc;
use http::Method;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::crypto::{HmacProvider, Sha256Hmac};
use super::listing::{parse_blob_page, parse_container_page, parse_http_date, BlobPage};
use super::signing::{sign_request, SigningContext};
use super::transport::{Connector, HttpRequest, HttpResponse, HttpTransport, ReqwestConnector};
use crate::config::{BlobConfig, ContainerAccess};
use crate::constants::{CUSTOM_HEADER_PREFIX, HTTP_SEPARATOR, MAX_SINGLE_PUT_BYTES};
use crate::error::{Result, StorageError};
use crate::model::{collect_stream, stream_from_bytes, ByteStream, VirtualDirectory, VirtualFileInfo};
use crate::path;
use crate::service::{run_cancellable, StorageService};

/// File metadata plus the blob-specific properties returned by a HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFileInfo {
    pub info: VirtualFileInfo,
    /// Base64 MD5 of the content, when the service stored one
    pub content_md5: Option<String>,
    /// `BlockBlob`, `PageBlob` or `AppendBlob`
    pub blob_type: Option<String>,
}

/// Everything derived from one configuration value
struct BlobConnection {
    config: BlobConfig,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    signing: SigningContext,
}

impl BlobConnection {
    fn build(config: BlobConfig, connector: &dyn Connector) -> Result<Self> {
        config.validate().map_err(StorageError::Configuration)?;
        let account_key = config.decoded_key().map_err(StorageError::Configuration)?;

        let mut default_headers = vec![("x-ms-version".to_string(), config.api_version.trim().to_string())];
        if !config.client_request_id.trim().is_empty() {
            default_headers.push((
                "x-ms-client-request-id".to_string(),
                config.client_request_id.trim().to_string(),
            ));
        }

        let transport = connector.connect(&config)?;

        Ok(Self {
            base_url: config.base_url(),
            signing: SigningContext {
                account_name: config.account_name.clone(),
                account_key,
                default_headers,
            },
            transport,
            config,
        })
    }

    /// Absolute URL for a resource relative to the account
    fn resolve(&self, resource: &str) -> String {
        if resource.contains("://") {
            return resource.to_string();
        }
        format!("{}/{}", self.base_url, resource.trim_start_matches('/'))
    }
}

/// Primitive storage service over the blob REST protocol
pub struct BlobStorageService {
    connection: ArcSwap<BlobConnection>,
    connector: Arc<dyn Connector>,
    crypto: Arc<dyn HmacProvider>,
}

impl BlobStorageService {
    /// Service using reqwest for transport and the `hmac` crate for signing
    pub fn new(config: BlobConfig) -> Result<Self> {
        Self::with_providers(config, Arc::new(ReqwestConnector), Arc::new(Sha256Hmac))
    }

    pub fn with_providers(
        config: BlobConfig,
        connector: Arc<dyn Connector>,
        crypto: Arc<dyn HmacProvider>,
    ) -> Result<Self> {
        let connection = BlobConnection::build(config, connector.as_ref())?;
        Ok(Self {
            connection: ArcSwap::from_pointee(connection),
            connector,
            crypto,
        })
    }

    pub fn configuration(&self) -> BlobConfig {
        self.connection.load().config.clone()
    }

    /// Replaces the configuration and rebuilds the connection
    ///
    /// Requests already in flight finish on the connection they started with.
    /// An invalid configuration is rejected and the current one stays active.
    pub fn set_configuration(&self, config: BlobConfig) -> Result<()> {
        let connection = BlobConnection::build(config, self.connector.as_ref())?;
        tracing::info!(
            account = %connection.config.account_name,
            endpoint = %connection.base_url,
            "Blob configuration replaced"
        );
        self.connection.store(Arc::new(connection));
        Ok(())
    }

    /// Signs and sends `request`, mapping non-success statuses to errors
    ///
    /// A relative request URL is resolved against the configured endpoint.
    async fn send(&self, mut request: HttpRequest, token: &CancellationToken) -> Result<HttpResponse> {
        let connection = self.connection.load_full();
        request.url = connection.resolve(&request.url);
        for (name, value) in &connection.signing.default_headers {
            if request.header(name).is_none() {
                request.set_header(name, value.clone());
            }
        }
        sign_request(&mut request, &connection.signing, self.crypto.as_ref(), Utc::now());

        let method = request.method.clone();
        let url = request.url.clone();
        tracing::debug!(method = %method, url = %url, "Sending blob request");

        let response = run_cancellable(token, connection.transport.send(request)).await?;
        if !response.is_success() {
            tracing::debug!(
                method = %method,
                url = %url,
                status = response.status,
                reason = %response.reason,
                "Blob request failed"
            );
            return Err(StorageError::from_status(response.status, &response.reason));
        }
        Ok(response)
    }

    // Containers

    /// Creates a container with the configured default access level
    pub async fn create_container(&self, name: &str, token: &CancellationToken) -> Result<()> {
        let access = self.connection.load().config.default_container_access;
        self.create_container_with_access(name, access, token).await
    }

    pub async fn create_container_with_access(
        &self,
        name: &str,
        access: ContainerAccess,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut request = HttpRequest::new(
            Method::PUT,
            format!("{}?restype=container", encode_path(name)),
        );
        if let Some(value) = access.header_value() {
            request.set_header("x-ms-blob-public-access", value);
        }
        self.send(request, token).await?;
        tracing::info!(container = %name, access = ?access, "Created container");
        Ok(())
    }

    pub async fn container_exists(&self, name: &str, token: &CancellationToken) -> Result<bool> {
        match self.container_properties(name, token).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `x-ms-*` response headers of a container HEAD, repeated values joined by `, `
    pub async fn container_properties(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> Result<BTreeMap<String, String>> {
        let request = HttpRequest::new(
            Method::HEAD,
            format!("{}?restype=container", encode_path(name)),
        );
        let response = self.send(request, token).await?;

        let mut properties: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in &response.headers {
            let key = key.to_ascii_lowercase();
            if !key.starts_with(CUSTOM_HEADER_PREFIX) {
                continue;
            }
            properties
                .entry(key)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        Ok(properties)
    }

    /// Every container name in the account, all pages drained
    pub async fn list_containers(&self, token: &CancellationToken) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = String::new();
        loop {
            let mut resource = "?comp=list".to_string();
            if !marker.is_empty() {
                resource.push_str("&marker=");
                resource.push_str(&urlencoding::encode(&marker));
            }

            let response = self.send(HttpRequest::new(Method::GET, resource), token).await?;
            let page = parse_container_page(&response.text())?;
            names.extend(page.names);

            if page.next_marker.is_empty() {
                break;
            }
            marker = page.next_marker;
        }
        Ok(names)
    }

    /// Deletes a container and every blob in it
    pub async fn delete_container(&self, name: &str, token: &CancellationToken) -> Result<()> {
        let request = HttpRequest::new(
            Method::DELETE,
            format!("{}?restype=container", encode_path(name)),
        );
        self.send(request, token).await?;
        tracing::info!(container = %name, "Deleted container");
        Ok(())
    }

    // Blobs

    /// Delimited listing of `container` under `prefix`, all pages drained
    pub async fn list_blobs(
        &self,
        container: &str,
        prefix: &str,
        token: &CancellationToken,
    ) -> Result<BlobPage> {
        let mut result = BlobPage::default();
        let mut marker = String::new();
        loop {
            let mut resource = format!("{}?restype=container&comp=list", encode_path(container));
            if !prefix.is_empty() {
                resource.push_str("&prefix=");
                resource.push_str(&urlencoding::encode(prefix));
            }
            resource.push_str("&delimiter=");
            resource.push_str(&urlencoding::encode(&HTTP_SEPARATOR.to_string()));
            if !marker.is_empty() {
                resource.push_str("&marker=");
                resource.push_str(&urlencoding::encode(&marker));
            }

            let response = self.send(HttpRequest::new(Method::GET, resource), token).await?;
            let page = parse_blob_page(&response.text())?;
            result.blobs.extend(page.blobs);
            result.prefixes.extend(page.prefixes);

            if page.next_marker.is_empty() {
                break;
            }
            marker = page.next_marker;
        }
        Ok(result)
    }

    /// HEAD of a blob with its MD5 and blob type
    pub async fn get_blob_properties(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> Result<BlobFileInfo> {
        let cleaned = blob_path(path)?;
        let response = self
            .send(HttpRequest::new(Method::HEAD, encode_path(&cleaned)), token)
            .await?;

        let size = match response.header("Content-Length") {
            Some(value) => value.trim().parse::<i64>().map_err(|e| {
                StorageError::backend(format!("Invalid Content-Length '{}': {}", value, e))
            })?,
            None => 0,
        };
        let last_modified = match response.header("Last-Modified") {
            Some(value) => parse_http_date(value)?,
            None => return Err(StorageError::backend("Response is missing Last-Modified")),
        };

        Ok(BlobFileInfo {
            info: VirtualFileInfo {
                name: path::file_name(HTTP_SEPARATOR, &cleaned),
                path: cleaned,
                size,
                last_modified,
            },
            content_md5: response.header("Content-MD5").map(str::to_string),
            blob_type: response.header("x-ms-blob-type").map(str::to_string),
        })
    }
}

/// Percent-encodes each segment of the cleaned path
pub fn encode_path(path: &str) -> String {
    path::segments(HTTP_SEPARATOR, path)
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Cleaned path of a blob; it must name a container and a blob
fn blob_path(path: &str) -> Result<String> {
    let segments = path::segments(HTTP_SEPARATOR, path);
    if segments.len() < 2 {
        return Err(StorageError::InvalidPath(format!(
            "'{}' must contain a container and a blob name",
            path
        )));
    }
    Ok(segments.join("/"))
}

/// Refuses payloads a single block blob PUT cannot take
fn check_upload_size(length: usize) -> Result<()> {
    if length >= MAX_SINGLE_PUT_BYTES {
        return Err(StorageError::NotSupported(format!(
            "Uploads of {} bytes or more need chunked upload (got {} bytes)",
            MAX_SINGLE_PUT_BYTES, length
        )));
    }
    Ok(())
}

#[async_trait]
impl StorageService for BlobStorageService {
    fn separator(&self) -> char {
        HTTP_SEPARATOR
    }

    /// Deleting a container removes every blob in it
    fn native_recursive_delete(&self) -> bool {
        true
    }

    async fn create_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let segments = path::segments(HTTP_SEPARATOR, path);
        let Some(container) = segments.first() else {
            return Ok(());
        };

        // Only the container is real, deeper directories are blob-name prefixes
        if self.container_exists(container, token).await? {
            return Ok(());
        }
        match self.create_container(container, token).await {
            // Lost a benign race with another creator
            Err(StorageError::Backend {
                status: Some(409), ..
            }) => {
                tracing::debug!(container = %container, "Container created concurrently");
                Ok(())
            }
            other => other,
        }
    }

    async fn delete_directory(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let segments = path::segments(HTTP_SEPARATOR, path);
        match segments.as_slice() {
            [] => Err(StorageError::InvalidPath(
                "The root directory cannot be deleted".to_string(),
            )),
            [container] => self.delete_container(container, token).await,
            _ => Err(StorageError::NotSupported(format!(
                "Deleting blob prefix '{}' is not supported, only containers can be deleted",
                path
            ))),
        }
    }

    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<()> {
        let cleaned = blob_path(path)?;
        self.send(HttpRequest::new(Method::DELETE, encode_path(&cleaned)), token)
            .await?;
        Ok(())
    }

    async fn directory_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        let segments = path::segments(HTTP_SEPARATOR, path);
        match segments.first() {
            None => Ok(true),
            Some(container) => self.container_exists(container, token).await,
        }
    }

    async fn file_exist(&self, path: &str, token: &CancellationToken) -> Result<bool> {
        match self.get_file(path, token).await {
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
        let segments = path::segments(HTTP_SEPARATOR, path);
        let Some((container, rest)) = segments.split_first() else {
            let containers = self.list_containers(token).await?;
            return Ok(containers
                .into_iter()
                .map(|name| VirtualDirectory {
                    path: name.clone(),
                    name,
                })
                .collect());
        };

        let page = self.list_blobs(container, &prefix_of(rest), token).await?;
        Ok(page
            .prefixes
            .iter()
            .map(|prefix| {
                let relative = prefix.trim_end_matches(HTTP_SEPARATOR);
                VirtualDirectory {
                    name: path::file_name(HTTP_SEPARATOR, relative),
                    path: format!("{}/{}", container, relative),
                }
            })
            .collect())
    }

    async fn list_files(&self, path: &str, token: &CancellationToken) -> Result<Vec<VirtualFileInfo>> {
        let segments = path::segments(HTTP_SEPARATOR, path);
        let Some((container, rest)) = segments.split_first() else {
            // Blobs always live inside a container
            return Ok(Vec::new());
        };

        let page = self.list_blobs(container, &prefix_of(rest), token).await?;
        Ok(page
            .blobs
            .into_iter()
            .map(|blob| VirtualFileInfo {
                name: path::file_name(HTTP_SEPARATOR, &blob.name),
                path: format!("{}/{}", container, blob.name),
                size: blob.content_length,
                last_modified: blob.last_modified,
            })
            .collect())
    }

    async fn get_file(&self, path: &str, token: &CancellationToken) -> Result<VirtualFileInfo> {
        Ok(self.get_blob_properties(path, token).await?.info)
    }

    async fn read_file(&self, path: &str, token: &CancellationToken) -> Result<ByteStream> {
        let cleaned = blob_path(path)?;
        let response = self
            .send(HttpRequest::new(Method::GET, encode_path(&cleaned)), token)
            .await?;
        Ok(stream_from_bytes(response.body))
    }

    async fn save_file(
        &self,
        path: &str,
        data: ByteStream,
        token: &CancellationToken,
    ) -> Result<()> {
        let cleaned = blob_path(path)?;
        // The signature covers Content-Length, so the payload is buffered first
        let body = run_cancellable(token, collect_stream(data)).await?;
        check_upload_size(body.len())?;

        let request = HttpRequest::new(Method::PUT, encode_path(&cleaned))
            .with_header("x-ms-blob-type", "BlockBlob")
            .with_body(body);
        self.send(request, token).await?;
        Ok(())
    }
}

/// Blob-name prefix for the directory below the container
fn prefix_of(rest: &[String]) -> String {
    if rest.is_empty() {
        String::new()
    } else {
        format!("{}{}", rest.join("/"), HTTP_SEPARATOR)
    }
}
