//! Blob storage connection settings.
//!
//! Default values for the endpoint, protocol version and client identifier are
//! sourced from `crate::constants`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{
    DEFAULT_API_VERSION, DEFAULT_CLIENT_REQUEST_ID, DEVELOPMENT_ACCOUNT_KEY,
    DEVELOPMENT_ACCOUNT_NAME, DEVELOPMENT_ENDPOINT, PUBLIC_ENDPOINT,
};

fn default_endpoint() -> String {
    PUBLIC_ENDPOINT.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_client_request_id() -> String {
    DEFAULT_CLIENT_REQUEST_ID.to_string()
}

fn default_use_https() -> bool {
    true
}

/// Public access level given to containers created by the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAccess {
    /// Container data is private to the account owner
    #[default]
    Private,
    /// Anonymous clients can read blobs and enumerate the container
    Container,
    /// Anonymous clients can read blobs but not enumerate
    Blob,
}

impl ContainerAccess {
    /// Value of `x-ms-blob-public-access`, or None for private containers
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContainerAccess::Private => None,
            ContainerAccess::Container => Some("container"),
            ContainerAccess::Blob => Some("blob"),
        }
    }
}

/// Blob storage account configuration (YAML format)
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobConfig {
    /// Host (and optional path) template; `{account}` is replaced by the account name
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub account_name: String,
    /// Base64 encoded shared key
    pub account_key: String,
    /// Protocol version sent with every request (x-ms-version)
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Client identifier sent with every request (x-ms-client-request-id)
    #[serde(default = "default_client_request_id")]
    pub client_request_id: String,
    #[serde(default = "default_use_https")]
    pub use_https: bool,
    #[serde(default)]
    pub default_container_access: ContainerAccess,
}

// Keeps the account key out of logs
impl fmt::Debug for BlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobConfig")
            .field("endpoint", &self.endpoint)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("client_request_id", &self.client_request_id)
            .field("use_https", &self.use_https)
            .field("default_container_access", &self.default_container_access)
            .finish()
    }
}

impl BlobConfig {
    /// Configuration for the public service with the given credentials
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint(),
            account_name: account_name.into(),
            account_key: account_key.into(),
            api_version: default_api_version(),
            client_request_id: default_client_request_id(),
            use_https: true,
            default_container_access: ContainerAccess::Private,
        }
    }

    /// Configuration for the local storage emulator
    pub fn development() -> Self {
        Self {
            endpoint: DEVELOPMENT_ENDPOINT.to_string(),
            use_https: false,
            ..Self::new(DEVELOPMENT_ACCOUNT_NAME, DEVELOPMENT_ACCOUNT_KEY)
        }
    }

    /// Decoded account key used as the HMAC key
    pub fn decoded_key(&self) -> Result<Vec<u8>, String> {
        BASE64
            .decode(self.account_key.trim())
            .map_err(|e| format!("Blob account key is not valid base64: {}", e))
    }

    /// `scheme://host[/path]` with the account name substituted
    pub fn base_url(&self) -> String {
        let host = self
            .endpoint
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .replace("{account}", self.account_name.trim());
        let scheme = if self.use_https { "https" } else { "http" };
        format!("{}://{}", scheme, host.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.account_name.trim().is_empty() {
            return Err("Blob account name cannot be empty".to_string());
        }
        if self.account_key.trim().is_empty() {
            return Err("Blob account key cannot be empty".to_string());
        }
        self.decoded_key()?;
        if self.api_version.trim().is_empty() {
            return Err("Blob api_version must be set".to_string());
        }
        if self.endpoint.trim().is_empty() {
            return Err("Blob endpoint cannot be empty".to_string());
        }
        Ok(())
    }
}
