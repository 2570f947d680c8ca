//! Blob storage protocol client
//!
//! - `signing`: shared-key canonicalization and request signatures
//! - `listing`: enumeration response parsing
//! - `transport`: request/response values and the HTTP seam
//! - `service`: the `StorageService` implementation

pub mod crypto;
pub mod listing;
pub mod mock_transport;
pub mod service;
pub mod signing;
pub mod transport;

pub use crypto::{HmacProvider, Sha256Hmac};
pub use listing::{BlobItem, BlobPage, ContainerPage};
pub use service::{encode_path, BlobFileInfo, BlobStorageService};
pub use signing::{sign_request, SigningContext};
pub use transport::{Connector, HttpRequest, HttpResponse, HttpTransport, ReqwestConnector};
