//! Building adapters from the environment

use crate::adapter::OssAdapter;
use ossfs_client::{
    ClientError, Config, OssClient, PublicUrlGenerator, DEFAULT_REGION, ENV_ACCESS_KEY_ID,
    ENV_ACCESS_KEY_SECRET, ENV_ENDPOINT, ENV_REGION,
};
use std::sync::Arc;
use tracing::debug;

pub const ENV_BUCKET: &str = "ALIYUN_OSS_BUCKET";
pub const ENV_PREFIX: &str = "ALIYUN_OSS_PREFIX";
pub const ENV_PUBLIC_DOMAIN: &str = "ALIYUN_OSS_PUBLIC_DOMAIN";
pub const ENV_CNAME_ENABLED: &str = "ALIYUN_OSS_CNAME_ENABLED";
pub const ENV_INTERNAL: &str = "ALIYUN_OSS_INTERNAL";

/// Adapter settings read from `ALIYUN_OSS_*` variables
///
/// Nothing is built unless credentials and a bucket are all present, so an
/// unconfigured environment yields `None` rather than an error.
#[derive(Clone, Debug, Default)]
pub struct AdapterFactory {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub prefix: String,
    pub public_domain: Option<String>,
    pub cname_enabled: bool,
    pub internal: bool,
}

impl AdapterFactory {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            access_key_id: non_empty(ENV_ACCESS_KEY_ID),
            access_key_secret: non_empty(ENV_ACCESS_KEY_SECRET),
            region: non_empty(ENV_REGION),
            endpoint: non_empty(ENV_ENDPOINT),
            bucket: non_empty(ENV_BUCKET),
            prefix: non_empty(ENV_PREFIX).unwrap_or_default(),
            public_domain: non_empty(ENV_PUBLIC_DOMAIN),
            cname_enabled: non_empty(ENV_CNAME_ENABLED).is_some_and(|value| parse_flag(&value)),
            internal: non_empty(ENV_INTERNAL).is_some_and(|value| parse_flag(&value)),
        }
    }

    /// Whether credentials and a bucket are all set
    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some() && self.access_key_secret.is_some() && self.bucket.is_some()
    }

    /// Endpoint host, derived from the region when not set explicitly
    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            let region = self.region.as_deref().unwrap_or(DEFAULT_REGION);
            let host = ossfs_client::region_endpoint(region);
            if self.internal {
                host.replace(".aliyuncs.com", "-internal.aliyuncs.com")
            } else {
                host
            }
        })
    }

    pub fn create_client(&self) -> Result<Option<Arc<OssClient>>, ClientError> {
        let (Some(access_key_id), Some(access_key_secret)) =
            (&self.access_key_id, &self.access_key_secret)
        else {
            debug!("credentials are not configured");
            return Ok(None);
        };

        let config = Config::new(self.endpoint())
            .with_credentials(access_key_id.as_str(), access_key_secret.as_str());
        OssClient::new(config).map(|client| Some(Arc::new(client)))
    }

    pub fn create_adapter(&self) -> Result<Option<OssAdapter>, ClientError> {
        let Some(bucket) = &self.bucket else {
            debug!("bucket is not configured");
            return Ok(None);
        };

        let client = self.create_client()?;
        Ok(client.map(|client| OssAdapter::new(client, bucket.as_str(), &self.prefix)))
    }

    pub fn create_url_generator(&self) -> Option<PublicUrlGenerator> {
        let bucket = self.bucket.as_ref()?;
        let mut generator = PublicUrlGenerator::new(self.endpoint(), bucket.as_str())
            .with_prefix(self.prefix.as_str())
            .with_cname(self.cname_enabled)
            .with_internal(self.internal);
        if let Some(domain) = &self.public_domain {
            generator = generator.with_public_domain(domain.as_str());
        }
        Some(generator)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
