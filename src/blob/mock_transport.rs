//! Scripted transport for testing (queued responses, recorded requests)

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use super::transport::{Connector, HttpRequest, HttpResponse, HttpTransport};
use crate::config::BlobConfig;
use crate::error::{Result, StorageError};

/// Mock transport that replays queued responses in order
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<RwLock<VecDeque<Result<HttpResponse>>>>,
    requests: Arc<RwLock<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response
    pub fn push_response(&self, response: HttpResponse) {
        self.responses.write().push_back(Ok(response));
    }

    /// Queue a transport-level failure
    pub fn push_error(&self, error: StorageError) {
        self.responses.write().push_back(Err(error));
    }

    /// Every request sent so far, signed as it went out
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.read().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.read().len()
    }

    /// Number of queued responses not yet consumed
    pub fn pending(&self) -> usize {
        self.responses.read().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let description = format!("{} {}", request.method, request.url);
        self.requests.write().push(request);
        self.responses.write().pop_front().unwrap_or_else(|| {
            Err(StorageError::backend(format!(
                "No scripted response for {}",
                description
            )))
        })
    }
}

/// Connector handing out the same mock transport for every configuration
#[derive(Clone, Default)]
pub struct MockConnector {
    transport: MockTransport,
    connections: Arc<RwLock<Vec<BlobConfig>>>,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            connections: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }

    /// Configurations a connection was built for, oldest first
    pub fn connections(&self) -> Vec<BlobConfig> {
        self.connections.read().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, config: &BlobConfig) -> Result<Arc<dyn HttpTransport>> {
        self.connections.write().push(config.clone());
        Ok(Arc::new(self.transport.clone()))
    }
}
