//! # ossfs Client
//!
//! An async client for OSS-compatible object storage.
//!
//! ## Features
//!
//! - **Signed requests**: Every request carries a fresh `Date` and an
//!   `OSS <id>:<signature>` authorization header
//! - **Paginated listing**: Continuation tokens are followed lazily through a
//!   `futures::Stream`
//! - **Multipart upload**: Parts are tracked by number and completed in
//!   ascending order; failed uploads are aborted
//! - **Observability**: One observer notification per operation
//!
//! ## Example
//!
//! ```rust,ignore
//! use ossfs_client::{Config, OssClient, PutObjectOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OssClient::new(
//!         Config::new("oss-cn-hangzhou.aliyuncs.com")
//!             .with_credentials("access-key-id", "access-key-secret"),
//!     )?;
//!
//!     client
//!         .put_object("my-bucket", "hello.txt", "Hello, World!", &PutObjectOptions::new())
//!         .await?;
//!
//!     let object = client.get_object("my-bucket", "hello.txt").await?;
//!     println!("Content: {}", String::from_utf8_lossy(&object.body));
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod listing;
mod multipart;
pub mod observer;
pub mod parser;
mod public_url;
pub mod transport;
mod types;

#[cfg(test)]
mod testing;

pub use client::{complete_multipart_body, OssClient, DIRECTORY_CONTENT_TYPE, MAX_PART_NUMBER};
pub use config::{
    encode_key, region_endpoint, Config, UrlStyle, DEFAULT_REGION, ENV_ACCESS_KEY_ID,
    ENV_ACCESS_KEY_SECRET, ENV_ENDPOINT, ENV_REGION, MIN_PART_SIZE,
};
pub use error::{ClientError, Result, TransportError};
pub use listing::collect_listing;
pub use multipart::{upload_multipart, MultipartUpload, ProgressCallback, UploadProgress};
pub use observer::{NoopObserver, Operation, OperationAttributes, OperationObserver, TracingObserver};
pub use public_url::PublicUrlGenerator;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::*;

// Re-export the signing types used in client signatures
pub use ossfs_signer::{HeaderSet, OssSigner, QueryParams, SignedPostPolicy};
