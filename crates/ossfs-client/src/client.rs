//! Main client implementation

use crate::{
    observer::{Operation, OperationAttributes, OperationObserver, TracingObserver},
    parser::{self, parse_error_body},
    transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport},
    types::{
        content_md5, CompletedPart, GetObjectOutput, ListObjectsRequest, ListingPage,
        ObjectMetadata, PartListing, PostPolicyForm, PutObjectOptions, USER_METADATA_PREFIX,
    },
    ClientError, Config, Result,
};
use bytes::Bytes;
use chrono::Utc;
use ossfs_signer::{HeaderSet, OssSigner, QueryParams};
use reqwest::Method;
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use tracing::{debug, instrument};

/// Highest part number the service accepts
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Content type of directory placeholder objects
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// Async client for an OSS-compatible object store
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct OssClient {
    config: Config,
    signer: OssSigner,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn OperationObserver>,
}

/// One request before signing
struct OssRequest<'a> {
    operation: Operation,
    method: Method,
    bucket: &'a str,
    key: &'a str,
    headers: HeaderSet,
    query: QueryParams,
    body: Option<Bytes>,
}

impl<'a> OssRequest<'a> {
    fn new(operation: Operation, method: Method, bucket: &'a str, key: &'a str) -> Self {
        Self {
            operation,
            method,
            bucket,
            key,
            headers: HeaderSet::new(),
            query: QueryParams::new(),
            body: None,
        }
    }

    fn headers(mut self, headers: HeaderSet) -> Self {
        self.headers.extend(headers.iter());
        self
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }
}

/// Current time as an RFC 1123 HTTP-date
fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Object keys are addressed without a leading slash
fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

fn check_part_number(part_number: u32) -> Result<()> {
    if part_number == 0 || part_number > MAX_PART_NUMBER {
        return Err(ClientError::InvalidArgument(format!(
            "part number must be between 1 and {}, got {}",
            MAX_PART_NUMBER, part_number
        )));
    }
    Ok(())
}

fn check_bucket(bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(ClientError::InvalidArgument("bucket name is empty".to_string()));
    }
    Ok(())
}

/// Body of a `CompleteMultipartUpload` request, parts in the order given
pub fn complete_multipart_body(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag></Part>",
            part.part_number,
            quick_xml::escape::escape(part.etag.as_str())
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

fn metadata_from_response(response: &HttpResponse) -> ObjectMetadata {
    let user_metadata = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix(USER_METADATA_PREFIX)?;
            Some((name.to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();

    ObjectMetadata {
        content_length: response
            .header("content-length")
            .and_then(|len| len.parse().ok()),
        content_type: response.header("content-type").map(str::to_string),
        etag: response.etag(),
        last_modified: response.header("last-modified").map(str::to_string),
        request_id: response.request_id(),
        user_metadata,
    }
}

impl OssClient {
    /// Create a client that sends requests with `reqwest`
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client from `ALIYUN_OSS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Create a client on top of a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            signer: config.signer(),
            config,
            transport,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Replace the operation observer
    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the request signer
    pub fn signer(&self) -> &OssSigner {
        &self.signer
    }

    // ==================== Object Operations ====================

    /// Upload an object and return its ETag
    #[instrument(skip(self, body, options))]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Bytes>,
        options: &PutObjectOptions,
    ) -> Result<String> {
        let key = normalize_key(key);
        let body: Bytes = body.into();
        let mut attributes = OperationAttributes::object(bucket, key).with_size(body.len() as u64);

        let started = Instant::now();
        let result = async {
            let mut headers = options.to_headers();
            if self.config.content_md5 {
                headers.insert("content-md5", content_md5(&body));
            }
            let response = self
                .dispatch(
                    OssRequest::new(Operation::PutObject, Method::PUT, bucket, key)
                        .headers(headers)
                        .body(body),
                )
                .await?;

            let etag = response.etag().unwrap_or_default();
            attributes.request_id = response.request_id();
            attributes.etag = Some(etag.clone());
            Ok::<_, ClientError>(etag)
        }
        .await;
        self.finish(Operation::PutObject, attributes, started, result)
    }

    /// Create a directory placeholder object (`<path>/`, empty body)
    #[instrument(skip(self))]
    pub async fn put_directory(&self, bucket: &str, path: &str) -> Result<String> {
        let mut key = normalize_key(path).trim_end_matches('/').to_string();
        key.push('/');
        let options = PutObjectOptions::new().with_content_type(DIRECTORY_CONTENT_TYPE);
        self.put_object(bucket, &key, Bytes::new(), &options).await
    }

    /// Download an object
    #[instrument(skip(self))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key);

        let started = Instant::now();
        let result = async {
            let response = self
                .dispatch(OssRequest::new(Operation::GetObject, Method::GET, bucket, key))
                .await?;

            let metadata = metadata_from_response(&response);
            attributes.request_id = metadata.request_id.clone();
            attributes.etag = metadata.etag.clone();
            attributes.size = Some(response.body.len() as u64);
            Ok::<_, ClientError>(GetObjectOutput {
                body: response.body,
                metadata,
            })
        }
        .await;
        self.finish(Operation::GetObject, attributes, started, result)
    }

    /// Get object metadata without downloading the body
    #[instrument(skip(self))]
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key);

        let started = Instant::now();
        let result = async {
            let response = self
                .dispatch(OssRequest::new(Operation::HeadObject, Method::HEAD, bucket, key))
                .await?;

            let metadata = metadata_from_response(&response);
            attributes.request_id = metadata.request_id.clone();
            attributes.etag = metadata.etag.clone();
            attributes.size = metadata.content_length;
            Ok::<_, ClientError>(metadata)
        }
        .await;
        self.finish(Operation::HeadObject, attributes, started, result)
    }

    /// Check if an object exists
    #[instrument(skip(self))]
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete an object
    ///
    /// A missing object is reported as [`ClientError::NotFound`].
    #[instrument(skip(self))]
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key);

        let started = Instant::now();
        let result = async {
            let response = self
                .dispatch(OssRequest::new(Operation::DeleteObject, Method::DELETE, bucket, key))
                .await?;
            attributes.request_id = response.request_id();
            Ok::<_, ClientError>(())
        }
        .await;
        self.finish(Operation::DeleteObject, attributes, started, result)
    }

    /// Server-side copy of `source_bucket/source_key` to `bucket/destination_key`
    ///
    /// `headers` are sent with the copy request, e.g. `x-oss-metadata-directive`.
    #[instrument(skip(self, headers))]
    pub async fn copy_object(
        &self,
        bucket: &str,
        destination_key: &str,
        source_bucket: &str,
        source_key: &str,
        headers: &HeaderSet,
    ) -> Result<String> {
        let destination_key = normalize_key(destination_key);
        let source_key = normalize_key(source_key);
        let mut attributes = OperationAttributes::object(bucket, destination_key);

        let started = Instant::now();
        let result = async {
            check_bucket(source_bucket)?;
            let copy_source = format!("/{}/{}", source_bucket, crate::config::encode_key(source_key));
            let response = self
                .dispatch(
                    OssRequest::new(Operation::CopyObject, Method::PUT, bucket, destination_key)
                        .headers(headers.clone())
                        .header("x-oss-copy-source", copy_source)
                        .body(Bytes::new()),
                )
                .await?;

            attributes.request_id = response.request_id();
            let etag = parser::parse_copy_object(&response.text())?;
            attributes.etag = Some(etag.clone());
            Ok::<_, ClientError>(etag)
        }
        .await;
        self.finish(Operation::CopyObject, attributes, started, result)
    }

    /// Move an object within a bucket: copy, then delete the source
    ///
    /// Not atomic. When the copy succeeds but the delete fails the error is
    /// [`ClientError::MoveIncomplete`] and both objects exist.
    #[instrument(skip(self))]
    pub async fn move_object(&self, bucket: &str, source_key: &str, destination_key: &str) -> Result<()> {
        self.copy_object(bucket, destination_key, bucket, source_key, &HeaderSet::new())
            .await?;

        match self.delete_object(bucket, source_key).await {
            Ok(()) => Ok(()),
            // Already gone: the destination holds the only copy.
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(ClientError::MoveIncomplete {
                source_key: normalize_key(source_key).to_string(),
                destination_key: normalize_key(destination_key).to_string(),
                source: Box::new(err),
            }),
        }
    }

    // ==================== Listing ====================

    /// Fetch one listing page
    #[instrument(skip(self))]
    pub async fn list_objects(&self, bucket: &str, request: &ListObjectsRequest) -> Result<ListingPage> {
        let mut attributes = OperationAttributes::bucket(bucket);

        let started = Instant::now();
        let result = async {
            let max_keys = request.max_keys.unwrap_or(self.config.list_page_size);
            let mut query = QueryParams::new()
                .with("list-type", "2")
                .with("max-keys", max_keys.to_string());
            if !request.prefix.is_empty() {
                query.insert("prefix", request.prefix.as_str());
            }
            if !request.delimiter.is_empty() {
                query.insert("delimiter", request.delimiter.as_str());
            }
            if let Some(token) = request.continuation_token.as_deref().filter(|t| !t.is_empty()) {
                query.insert("continuation-token", token);
            }

            let response = self
                .dispatch(OssRequest::new(Operation::ListObjects, Method::GET, bucket, "").query(query))
                .await?;

            attributes.request_id = response.request_id();
            let page = parser::parse_list_objects(&response.text())?;
            attributes.count = Some(page.len());
            Ok::<_, ClientError>(page)
        }
        .await;
        self.finish(Operation::ListObjects, attributes, started, result)
    }

    // ==================== Multipart Upload ====================

    /// Start a multipart upload and return its upload id
    #[instrument(skip(self, options))]
    pub async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutObjectOptions,
    ) -> Result<String> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key);

        let started = Instant::now();
        let result = async {
            let response = self
                .dispatch(
                    OssRequest::new(Operation::InitiateMultipartUpload, Method::POST, bucket, key)
                        .headers(options.to_headers())
                        .query(QueryParams::new().with_flag("uploads"))
                        .body(Bytes::new()),
                )
                .await?;

            attributes.request_id = response.request_id();
            let upload_id = parser::parse_initiate_multipart(&response.text())?;
            attributes.upload_id = Some(upload_id.clone());
            Ok::<_, ClientError>(upload_id)
        }
        .await;
        self.finish(Operation::InitiateMultipartUpload, attributes, started, result)
    }

    /// Upload one part and return its ETag
    #[instrument(skip(self, body))]
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: impl Into<Bytes>,
    ) -> Result<String> {
        let key = normalize_key(key);
        let body: Bytes = body.into();
        let mut attributes = OperationAttributes::object(bucket, key)
            .with_upload_id(upload_id)
            .with_part_number(part_number)
            .with_size(body.len() as u64);

        let started = Instant::now();
        let result = async {
            check_part_number(part_number)?;
            let mut request = OssRequest::new(Operation::UploadPart, Method::PUT, bucket, key)
                .query(
                    QueryParams::new()
                        .with("partNumber", part_number.to_string())
                        .with("uploadId", upload_id),
                );
            if self.config.content_md5 {
                request = request.header("content-md5", content_md5(&body));
            }
            let response = self.dispatch(request.body(body)).await?;

            attributes.request_id = response.request_id();
            let etag = response
                .etag()
                .ok_or_else(|| ClientError::Parse("upload part response has no ETag".to_string()))?;
            attributes.etag = Some(etag.clone());
            Ok::<_, ClientError>(etag)
        }
        .await;
        self.finish(Operation::UploadPart, attributes, started, result)
    }

    /// Complete a multipart upload
    ///
    /// Parts are submitted in the order given.
    #[instrument(skip(self, parts), fields(parts = parts.len()))]
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key).with_upload_id(upload_id);
        attributes.count = Some(parts.len());

        let started = Instant::now();
        let result = async {
            if parts.is_empty() {
                return Err(ClientError::InvalidArgument(
                    "cannot complete a multipart upload without parts".to_string(),
                ));
            }
            for part in parts {
                check_part_number(part.part_number)?;
            }

            let response = self
                .dispatch(
                    OssRequest::new(Operation::CompleteMultipartUpload, Method::POST, bucket, key)
                        .header("content-type", "application/xml")
                        .query(QueryParams::new().with("uploadId", upload_id))
                        .body(Bytes::from(complete_multipart_body(parts))),
                )
                .await?;

            attributes.request_id = response.request_id();
            let etag = parser::parse_complete_multipart(&response.text())?;
            attributes.etag = Some(etag.clone());
            Ok::<_, ClientError>(etag)
        }
        .await;
        self.finish(Operation::CompleteMultipartUpload, attributes, started, result)
    }

    /// Abort a multipart upload, discarding its parts
    #[instrument(skip(self))]
    pub async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key).with_upload_id(upload_id);

        let started = Instant::now();
        let result = async {
            let response = self
                .dispatch(
                    OssRequest::new(Operation::AbortMultipartUpload, Method::DELETE, bucket, key)
                        .query(QueryParams::new().with("uploadId", upload_id)),
                )
                .await?;
            attributes.request_id = response.request_id();
            Ok::<_, ClientError>(())
        }
        .await;
        self.finish(Operation::AbortMultipartUpload, attributes, started, result)
    }

    /// List the parts uploaded so far, starting after `part_number_marker`
    #[instrument(skip(self))]
    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<u32>,
    ) -> Result<PartListing> {
        let key = normalize_key(key);
        let mut attributes = OperationAttributes::object(bucket, key).with_upload_id(upload_id);

        let started = Instant::now();
        let result = async {
            let mut query = QueryParams::new().with("uploadId", upload_id);
            if let Some(marker) = part_number_marker {
                query.insert("part-number-marker", marker.to_string());
            }
            let response = self
                .dispatch(OssRequest::new(Operation::ListParts, Method::GET, bucket, key).query(query))
                .await?;

            attributes.request_id = response.request_id();
            let listing = parser::parse_list_parts(&response.text())?;
            attributes.count = Some(listing.parts.len());
            Ok::<_, ClientError>(listing)
        }
        .await;
        self.finish(Operation::ListParts, attributes, started, result)
    }

    // ==================== Signed URLs and Policies ====================

    /// Build a presigned URL valid until `expires` (unix seconds)
    ///
    /// `query` carries pass-through parameters such as
    /// `response-content-disposition`.
    pub fn presigned_url(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        expires: i64,
        headers: &HeaderSet,
        query: QueryParams,
    ) -> Result<String> {
        let key = normalize_key(key);
        let signed = self
            .signer
            .presign_query(method, bucket, key, expires, headers, query)?;
        Ok(format!("{}?{}", self.config.object_url(bucket, key), signed))
    }

    /// Build a signed POST policy for browser uploads under `key_prefix`
    pub fn post_policy<C: Serialize>(
        &self,
        bucket: &str,
        key_prefix: &str,
        expires: i64,
        conditions: &[C],
    ) -> Result<PostPolicyForm> {
        let policy = self.signer.post_policy(bucket, key_prefix, expires, conditions)?;
        Ok(PostPolicyForm {
            policy,
            host: self.config.bucket_url(bucket),
        })
    }

    // ==================== Internal ====================

    /// Report an operation's outcome to the observer and pass it through
    fn finish<T>(
        &self,
        operation: Operation,
        mut attributes: OperationAttributes,
        started: Instant,
        result: Result<T>,
    ) -> Result<T> {
        attributes.latency = started.elapsed();
        match &result {
            Ok(_) => self.observer.on_success(operation, &attributes),
            Err(err) => {
                if attributes.request_id.is_none() {
                    attributes.request_id = err.request_id().map(str::to_string);
                }
                self.observer.on_failure(operation, &attributes, err);
            }
        }
        result
    }

    /// Sign and send a request, then classify the response status
    async fn dispatch(&self, request: OssRequest<'_>) -> Result<HttpResponse> {
        let OssRequest {
            operation,
            method,
            bucket,
            key,
            mut headers,
            query,
            body,
        } = request;
        check_bucket(bucket)?;

        headers.insert("date", http_date());
        let authorization = self
            .signer
            .authorize(method.as_str(), bucket, key, &headers, &query)?;
        headers.insert("authorization", authorization);

        let mut url = self.config.object_url(bucket, key);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.to_query_string());
        }

        debug!("Sending {} request to {}", method, url);
        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;

        classify(operation, bucket, key, response)
    }
}

/// Map a response to success, `NotFound` or a service error
fn classify(operation: Operation, bucket: &str, key: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.status == operation.success_status() {
        return Ok(response);
    }
    if response.status == 404 && operation.maps_not_found() {
        return Err(ClientError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }

    let body = response.text();
    let details = parse_error_body(&body);
    Err(ClientError::Service {
        operation,
        status: response.status,
        code: details.code,
        message: details
            .message
            .unwrap_or_else(|| operation.failure_message()),
        request_id: response.request_id().or(details.request_id),
        body,
    })
}
