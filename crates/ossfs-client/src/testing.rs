//! In-memory transport and observer for unit tests

use crate::{
    error::TransportError,
    observer::{Operation, OperationAttributes, OperationObserver},
    transport::{HttpRequest, HttpResponse, Transport},
    ClientError, Config, OssClient,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

/// Answers requests with canned responses, in order, and records them
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests received so far
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("no scripted response left".to_string()))
    }
}

/// Records every observer notification
#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<(Operation, bool, OperationAttributes)>>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(operation, succeeded, attributes)` in notification order
    pub(crate) fn events(&self) -> Vec<(Operation, bool, OperationAttributes)> {
        self.events.lock().clone()
    }
}

impl OperationObserver for RecordingObserver {
    fn on_success(&self, operation: Operation, attributes: &OperationAttributes) {
        self.events.lock().push((operation, true, attributes.clone()));
    }

    fn on_failure(&self, operation: Operation, attributes: &OperationAttributes, _error: &ClientError) {
        self.events.lock().push((operation, false, attributes.clone()));
    }
}

pub(crate) fn test_config() -> Config {
    Config::new("http://oss.test")
        .with_path_style()
        .with_credentials("testAccessKeyId", "testAccessKeySecret")
}

pub(crate) fn test_client(transport: Arc<ScriptedTransport>) -> OssClient {
    OssClient::with_transport(test_config(), transport).unwrap()
}
