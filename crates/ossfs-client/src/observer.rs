//! Per-operation outcome reporting
//!
//! Every network operation of [`OssClient`](crate::OssClient) reports exactly
//! once to the configured [`OperationObserver`], after the outcome is known.

use crate::ClientError;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Network operations the client performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    PutObject,
    GetObject,
    HeadObject,
    DeleteObject,
    CopyObject,
    ListObjects,
    InitiateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
    ListParts,
}

impl Operation {
    /// Stable snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PutObject => "put_object",
            Self::GetObject => "get_object",
            Self::HeadObject => "head_object",
            Self::DeleteObject => "delete_object",
            Self::CopyObject => "copy_object",
            Self::ListObjects => "list_objects",
            Self::InitiateMultipartUpload => "initiate_multipart_upload",
            Self::UploadPart => "upload_part",
            Self::CompleteMultipartUpload => "complete_multipart_upload",
            Self::AbortMultipartUpload => "abort_multipart_upload",
            Self::ListParts => "list_parts",
        }
    }

    /// Status code of a successful response
    pub fn success_status(self) -> u16 {
        match self {
            Self::DeleteObject | Self::AbortMultipartUpload => 204,
            _ => 200,
        }
    }

    /// Whether a 404 means the addressed object or upload does not exist
    pub fn maps_not_found(self) -> bool {
        matches!(
            self,
            Self::GetObject
                | Self::HeadObject
                | Self::DeleteObject
                | Self::ListParts
                | Self::AbortMultipartUpload
        )
    }

    /// Fallback error message when the service sends none
    pub fn failure_message(self) -> String {
        format!("Failed to {}", self.as_str().replace('_', " "))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about an operation when it finishes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationAttributes {
    pub bucket: String,
    pub key: Option<String>,
    /// Bytes sent or received
    pub size: Option<u64>,
    /// Entries returned by listing operations
    pub count: Option<usize>,
    pub upload_id: Option<String>,
    pub part_number: Option<u32>,
    pub etag: Option<String>,
    pub request_id: Option<String>,
    /// Wall-clock time from the start of the operation to its outcome
    pub latency: Duration,
}

impl OperationAttributes {
    /// Attributes for a bucket-level operation
    pub fn bucket(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    /// Attributes for an object-level operation
    pub fn object(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_upload_id(mut self, upload_id: &str) -> Self {
        self.upload_id = Some(upload_id.to_string());
        self
    }

    pub fn with_part_number(mut self, part_number: u32) -> Self {
        self.part_number = Some(part_number);
        self
    }
}

/// Receives one notification per finished operation
pub trait OperationObserver: Send + Sync {
    /// The operation succeeded
    fn on_success(&self, operation: Operation, attributes: &OperationAttributes);

    /// The operation failed with `error`
    fn on_failure(&self, operation: Operation, attributes: &OperationAttributes, error: &ClientError);
}

/// Emits one `tracing` event per operation
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl OperationObserver for TracingObserver {
    fn on_success(&self, operation: Operation, attributes: &OperationAttributes) {
        info!(
            operation = operation.as_str(),
            bucket = %attributes.bucket,
            key = attributes.key.as_deref(),
            size = attributes.size,
            count = attributes.count,
            upload_id = attributes.upload_id.as_deref(),
            part_number = attributes.part_number,
            request_id = attributes.request_id.as_deref(),
            latency_ms = attributes.latency.as_millis() as u64,
            "OSS operation succeeded"
        );
    }

    fn on_failure(&self, operation: Operation, attributes: &OperationAttributes, error: &ClientError) {
        // A missing object is an answer, not a fault.
        if error.is_not_found() {
            debug!(
                operation = operation.as_str(),
                bucket = %attributes.bucket,
                key = attributes.key.as_deref(),
                latency_ms = attributes.latency.as_millis() as u64,
                "OSS object not found"
            );
            return;
        }

        warn!(
            operation = operation.as_str(),
            bucket = %attributes.bucket,
            key = attributes.key.as_deref(),
            upload_id = attributes.upload_id.as_deref(),
            part_number = attributes.part_number,
            status = error.status(),
            code = error.code(),
            request_id = attributes.request_id.as_deref(),
            latency_ms = attributes.latency.as_millis() as u64,
            error = %error,
            "OSS operation failed"
        );
    }
}

/// Discards every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl OperationObserver for NoopObserver {
    fn on_success(&self, _operation: Operation, _attributes: &OperationAttributes) {}

    fn on_failure(&self, _operation: Operation, _attributes: &OperationAttributes, _error: &ClientError) {}
}
