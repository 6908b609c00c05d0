//! # ossfs Adapter
//!
//! Filesystem-style access to a bucket through [`ossfs_client`].
//!
//! Paths are relative to an optional key prefix. Missing files surface as
//! [`FilesystemError::FileNotFound`]; every other failure names the path
//! it was addressed to and carries the underlying client error.
//!
//! ```rust,ignore
//! use ossfs_adapter::{AdapterFactory, WriteOptions};
//!
//! let adapter = AdapterFactory::from_env()
//!     .create_adapter()?
//!     .expect("ALIYUN_OSS_* variables are set");
//! adapter.write("notes/today.txt", "hello", &WriteOptions::new()).await?;
//! ```

mod adapter;
mod attributes;
mod error;
mod factory;
mod path;

pub use adapter::{OssAdapter, WriteOptions};
pub use attributes::{parse_timestamp, DirectoryAttributes, FileAttributes, StorageAttributes, Visibility};
pub use error::{FilesystemError, MetadataKind, Result};
pub use factory::{
    AdapterFactory, ENV_BUCKET, ENV_CNAME_ENABLED, ENV_INTERNAL, ENV_PREFIX, ENV_PUBLIC_DOMAIN,
};
pub use path::PathPrefixer;
