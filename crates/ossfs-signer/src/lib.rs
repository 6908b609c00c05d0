//! # ossfs Signer
//!
//! Request signing for OSS-style object storage.
//!
//! This crate provides:
//! - **Canonicalization**: Deterministic string-to-sign construction from a
//!   request's method, resource, headers and query
//! - **Request signatures**: Base64 HMAC-SHA1 over the string-to-sign
//! - **Presigned URLs**: Query strings carrying an absolute expiry and signature
//! - **POST policies**: Signed browser-upload policy documents
//!
//! Nothing in this crate performs I/O. Identical inputs always produce
//! identical signatures.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ossfs_signer::{HeaderSet, OssSigner, QueryParams};
//!
//! let signer = OssSigner::new("access-key-id", "access-key-secret");
//!
//! let headers = HeaderSet::new()
//!     .with("Date", "Wed, 28 Dec 2022 12:00:00 GMT")
//!     .with("Content-Type", "text/plain");
//!
//! let authorization = signer.authorize("PUT", "bucket", "hello.txt", &headers, &QueryParams::new())?;
//! assert!(authorization.starts_with("OSS access-key-id:"));
//! ```

pub mod canonical;
pub mod error;
pub mod headers;
pub mod policy;
pub mod query;
pub mod signer;

pub use canonical::{
    canonicalize_headers, canonicalize_resource, is_sub_resource, string_to_sign, CanonicalRequest,
    OSS_HEADER_PREFIX, SIGNED_SUB_RESOURCES,
};
pub use error::{Result, SigningError};
pub use headers::HeaderSet;
pub use policy::SignedPostPolicy;
pub use query::QueryParams;
pub use signer::{Credentials, OssSigner};

/// Scheme prefix of the `Authorization` header value
pub const AUTHORIZATION_SCHEME: &str = "OSS";

/// Query parameter carrying the access key id in presigned URLs
pub const PRESIGN_ACCESS_KEY_PARAM: &str = "OSSAccessKeyId";

/// Query parameter carrying the absolute expiry in presigned URLs
pub const PRESIGN_EXPIRES_PARAM: &str = "Expires";

/// Query parameter carrying the signature in presigned URLs
pub const PRESIGN_SIGNATURE_PARAM: &str = "Signature";
