//! Common types for the OSS client

use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use ossfs_signer::{HeaderSet, SignedPostPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content type sent when the caller gives none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Prefix of user metadata headers
pub const USER_METADATA_PREFIX: &str = "x-oss-meta-";

/// Metadata returned by HEAD and GET
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// HTTP-date, as sent by the service
    pub last_modified: Option<String>,
    pub request_id: Option<String>,
    /// `x-oss-meta-*` headers, keyed without the prefix
    pub user_metadata: BTreeMap<String, String>,
}

/// An object body with its metadata
#[derive(Clone, Debug)]
pub struct GetObjectOutput {
    pub body: bytes::Bytes,
    pub metadata: ObjectMetadata,
}

/// One object in a listing page
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// ISO-8601 timestamp, as sent by the service
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

/// One page of a listing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub objects: Vec<ObjectSummary>,
    /// Common prefixes, present when a delimiter was used
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Present exactly when `is_truncated` is true
    pub next_continuation_token: Option<String>,
}

impl ListingPage {
    /// Total entries on this page
    pub fn len(&self) -> usize {
        self.objects.len() + self.prefixes.len()
    }

    /// Check if the page has neither objects nor prefixes
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}

/// Parameters of a listing request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub prefix: String,
    pub delimiter: String,
    /// Falls back to the configured page size
    pub max_keys: Option<u32>,
    pub continuation_token: Option<String>,
}

impl ListObjectsRequest {
    /// List everything in the bucket
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_max_keys(mut self, max_keys: u32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }
}

/// A part accepted by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    /// ETag without quotes
    pub etag: String,
}

/// A part as reported by `list_parts`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSummary {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<String>,
}

/// One page of uploaded parts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartListing {
    pub parts: Vec<PartSummary>,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<u32>,
}

/// Options for uploads
#[derive(Clone, Debug, Default)]
pub struct PutObjectOptions {
    /// Defaults to `application/octet-stream`
    pub content_type: Option<String>,
    /// Stored as `x-oss-meta-{name}` headers
    pub user_metadata: BTreeMap<String, String>,
    /// Extra request headers, e.g. `Cache-Control` or `x-oss-storage-class`
    pub headers: HeaderSet,
}

impl PutObjectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Request headers these options describe
    pub(crate) fn to_headers(&self) -> HeaderSet {
        let mut headers = self.headers.clone();
        headers.insert(
            "content-type",
            self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        );
        for (name, value) in &self.user_metadata {
            headers.insert(format!("{}{}", USER_METADATA_PREFIX, name), value.as_str());
        }
        headers
    }
}

/// A signed POST policy plus the URL the form posts to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPolicyForm {
    #[serde(flatten)]
    pub policy: SignedPostPolicy,
    pub host: String,
}

/// Base64 MD5 digest, as carried by `Content-MD5`
pub fn content_md5(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}
