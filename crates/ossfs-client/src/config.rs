//! Client configuration

use crate::{ClientError, Result};
use ossfs_signer::OssSigner;
use std::time::Duration;

/// Environment variable holding the access key id
pub const ENV_ACCESS_KEY_ID: &str = "ALIYUN_OSS_ACCESS_KEY_ID";
/// Environment variable holding the access key secret
pub const ENV_ACCESS_KEY_SECRET: &str = "ALIYUN_OSS_ACCESS_KEY_SECRET";
/// Environment variable holding the region, e.g. `cn-hangzhou`
pub const ENV_REGION: &str = "ALIYUN_OSS_REGION";
/// Environment variable holding an explicit endpoint host
pub const ENV_ENDPOINT: &str = "ALIYUN_OSS_ENDPOINT";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "cn-hangzhou";

/// Smallest part size the service accepts for all but the last part
pub const MIN_PART_SIZE: u64 = 100 * 1024;

/// How bucket and key are placed in request URLs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UrlStyle {
    /// `https://{bucket}.{endpoint}/{key}`
    #[default]
    VirtualHosted,
    /// `https://{endpoint}/{bucket}/{key}`, for emulators and proxies
    Path,
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint host, without scheme (e.g. `oss-cn-hangzhou.aliyuncs.com`)
    pub endpoint: String,
    /// `https` or `http`
    pub scheme: String,
    /// URL addressing style
    pub url_style: UrlStyle,
    /// Access key id
    pub access_key_id: String,
    /// Access key secret
    pub access_key_secret: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Send `Content-MD5` with uploads and parts
    pub content_md5: bool,
    /// Page size for listing requests (`max-keys`)
    pub list_page_size: u32,
    /// Multipart upload threshold (bytes)
    pub multipart_threshold: u64,
    /// Multipart chunk size (bytes)
    pub multipart_chunk_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: region_endpoint(DEFAULT_REGION),
            scheme: "https".to_string(),
            url_style: UrlStyle::VirtualHosted,
            access_key_id: String::new(),
            access_key_secret: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("ossfs-client/{}", env!("CARGO_PKG_VERSION")),
            content_md5: false,
            list_page_size: 1000,
            multipart_threshold: 100 * 1024 * 1024, // 100 MB
            multipart_chunk_size: 8 * 1024 * 1024,  // 8 MB
        }
    }
}

/// Default endpoint host of a region
pub fn region_endpoint(region: &str) -> String {
    format!("oss-{}.aliyuncs.com", region)
}

impl Config {
    /// Create a new config with the given endpoint
    ///
    /// A leading `http://` or `https://` sets the scheme.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::default().with_endpoint(endpoint)
    }

    /// Read the configuration from `ALIYUN_OSS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through a variable lookup function
    ///
    /// Credentials are required. The endpoint falls back to the region's
    /// default host and the region to [`DEFAULT_REGION`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let access_key_id = non_empty(ENV_ACCESS_KEY_ID)
            .ok_or_else(|| ClientError::Config(format!("{} is not set", ENV_ACCESS_KEY_ID)))?;
        let access_key_secret = non_empty(ENV_ACCESS_KEY_SECRET)
            .ok_or_else(|| ClientError::Config(format!("{} is not set", ENV_ACCESS_KEY_SECRET)))?;
        let region = non_empty(ENV_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = non_empty(ENV_ENDPOINT).unwrap_or_else(|| region_endpoint(&region));

        Ok(Self::new(endpoint).with_credentials(access_key_id, access_key_secret))
    }

    /// Set the endpoint, taking the scheme from it when present
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let (scheme, host) = match endpoint.split_once("://") {
            Some((scheme, host)) => (Some(scheme.to_ascii_lowercase()), host),
            None => (None, endpoint.as_str()),
        };
        if let Some(scheme) = scheme {
            self.scheme = scheme;
        }
        self.endpoint = host.trim_end_matches('/').to_string();
        self
    }

    /// Set the access key pair
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        self.access_key_id = access_key_id.into();
        self.access_key_secret = access_key_secret.into();
        self
    }

    /// Use path-style URLs
    pub fn with_path_style(mut self) -> Self {
        self.url_style = UrlStyle::Path;
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `Content-MD5` with uploads
    pub fn with_content_md5(mut self) -> Self {
        self.content_md5 = true;
        self
    }

    /// Set the listing page size
    pub fn with_list_page_size(mut self, page_size: u32) -> Self {
        self.list_page_size = page_size;
        self
    }

    /// Set the multipart chunk size
    pub fn with_multipart_chunk_size(mut self, chunk_size: u64) -> Self {
        self.multipart_chunk_size = chunk_size;
        self
    }

    /// Set the size above which uploads go multipart
    pub fn with_multipart_threshold(mut self, threshold: u64) -> Self {
        self.multipart_threshold = threshold;
        self
    }

    /// Check the configuration for values the service would reject
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Config("endpoint is empty".to_string()));
        }
        if self.scheme != "https" && self.scheme != "http" {
            return Err(ClientError::Config(format!("unsupported scheme: {}", self.scheme)));
        }
        if self.access_key_id.is_empty() || self.access_key_secret.is_empty() {
            return Err(ClientError::Config("access key id and secret are required".to_string()));
        }
        if !(1..=1000).contains(&self.list_page_size) {
            return Err(ClientError::Config(format!(
                "list page size must be between 1 and 1000, got {}",
                self.list_page_size
            )));
        }
        if self.multipart_chunk_size < MIN_PART_SIZE {
            return Err(ClientError::Config(format!(
                "multipart chunk size must be at least {} bytes, got {}",
                MIN_PART_SIZE, self.multipart_chunk_size
            )));
        }
        Ok(())
    }

    /// Signer for the configured credentials
    pub fn signer(&self) -> OssSigner {
        OssSigner::new(self.access_key_id.clone(), self.access_key_secret.clone())
    }

    /// Base URL of a bucket, with a trailing slash
    pub fn bucket_url(&self, bucket: &str) -> String {
        match self.url_style {
            UrlStyle::VirtualHosted => format!("{}://{}.{}/", self.scheme, bucket, self.endpoint),
            UrlStyle::Path => format!("{}://{}/{}/", self.scheme, self.endpoint, bucket),
        }
    }

    /// URL of an object; each key segment is percent-encoded
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let mut url = self.bucket_url(bucket);
        url.push_str(&encode_key(key.trim_start_matches('/')));
        url
    }
}

/// Percent-encode an object key, keeping `/` separators
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
