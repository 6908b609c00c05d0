//! Public (unsigned) object URLs

use crate::config::encode_key;

/// Builds public URLs for objects of one bucket
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicUrlGenerator {
    endpoint: String,
    bucket: String,
    prefix: String,
    public_domain: Option<String>,
    cname_enabled: bool,
    internal: bool,
}

impl PublicUrlGenerator {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            prefix: String::new(),
            public_domain: None,
            cname_enabled: false,
            internal: false,
        }
    }

    /// Prefix prepended to every key, without surrounding slashes
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    /// Custom domain bound to the bucket; used when `cname_enabled` is set
    pub fn with_public_domain(mut self, domain: impl Into<String>) -> Self {
        self.public_domain = Some(domain.into());
        self
    }

    pub fn with_cname(mut self, enabled: bool) -> Self {
        self.cname_enabled = enabled;
        self
    }

    /// Address the bucket through the region's internal network endpoint
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Public URL of `key`, through the custom domain when one is enabled
    pub fn url(&self, key: &str) -> String {
        format!("https://{}/{}", self.host(), self.full_key(key))
    }

    /// URL of `key` on the bucket's own endpoint, never the custom domain
    pub fn secure_url(&self, key: &str) -> String {
        format!("https://{}/{}", self.bucket_host(), self.full_key(key))
    }

    /// Host that `url` points at
    pub fn host(&self) -> String {
        match (&self.public_domain, self.cname_enabled) {
            (Some(domain), true) => domain.clone(),
            _ => self.bucket_host(),
        }
    }

    fn bucket_host(&self) -> String {
        format!("{}.{}", self.bucket, self.endpoint())
    }

    fn endpoint(&self) -> String {
        if self.internal && !self.endpoint.contains("-internal.") {
            self.endpoint.replace(".aliyuncs.com", "-internal.aliyuncs.com")
        } else {
            self.endpoint.clone()
        }
    }

    fn full_key(&self, key: &str) -> String {
        let key = encode_key(key.trim_start_matches('/'));
        if self.prefix.is_empty() {
            key
        } else {
            format!("{}/{}", encode_key(&self.prefix), key)
        }
    }
}
