//! Request canonicalization
//!
//! The service recomputes the signature from its own view of the request, so
//! the string-to-sign must be rebuilt byte for byte:
//!
//! ```text
//! METHOD\n
//! content-md5\n
//! content-type\n
//! date (or expiry for presigned requests)\n
//! canonicalized-headers + canonicalized-resource
//! ```
//!
//! Missing optional fields become empty lines; a line is never dropped.

use crate::{HeaderSet, QueryParams};

/// Prefix of headers that take part in the signature
pub const OSS_HEADER_PREFIX: &str = "x-oss-";

/// Query parameters that are part of the signed resource
///
/// Everything else in the query is sent but not signed.
pub const SIGNED_SUB_RESOURCES: &[&str] = &[
    "acl",
    "uploads",
    "location",
    "cors",
    "logging",
    "website",
    "referer",
    "lifecycle",
    "delete",
    "append",
    "tagging",
    "objectMeta",
    "uploadId",
    "partNumber",
    "security-token",
    "position",
    "img",
    "style",
    "styleName",
    "replication",
    "replicationProgress",
    "replicationLocation",
    "cname",
    "bucketInfo",
    "comp",
    "qos",
    "live",
    "status",
    "vod",
    "startTime",
    "endTime",
    "symlink",
    "x-oss-process",
    "response-content-type",
    "response-content-language",
    "response-expires",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
];

/// Check whether a query parameter name is a signed sub-resource
pub fn is_sub_resource(name: &str) -> bool {
    SIGNED_SUB_RESOURCES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Build the canonicalized resource: `/bucket/key[?sub-resources]`
///
/// Signed sub-resources are sorted by name and rendered as `name` when the
/// value is empty, `name=value` otherwise.
pub fn canonicalize_resource(bucket: &str, key: &str, query: &QueryParams) -> String {
    let mut resource = String::with_capacity(bucket.len() + key.len() + 2);
    resource.push('/');
    resource.push_str(bucket);
    resource.push('/');
    resource.push_str(key);

    let mut signed: Vec<(&str, &str)> = query.iter().filter(|(n, _)| is_sub_resource(n)).collect();
    if signed.is_empty() {
        return resource;
    }
    signed.sort_unstable();

    resource.push('?');
    for (i, (name, value)) in signed.into_iter().enumerate() {
        if i > 0 {
            resource.push('&');
        }
        resource.push_str(name);
        if !value.is_empty() {
            resource.push('=');
            resource.push_str(value);
        }
    }
    resource
}

/// Build the canonicalized `x-oss-*` headers
///
/// One `name:value\n` line per header, sorted by name, values trimmed. An
/// empty string when no such header is present.
pub fn canonicalize_headers(headers: &HeaderSet) -> String {
    // HeaderSet names are already lower-cased and iterate in sorted order.
    let mut result = String::new();
    for (name, value) in headers.iter().filter(|(n, _)| n.starts_with(OSS_HEADER_PREFIX)) {
        result.push_str(name);
        result.push(':');
        result.push_str(value.trim());
        result.push('\n');
    }
    result
}

/// The signed view of one request
#[derive(Clone, Copy, Debug)]
pub struct CanonicalRequest<'a> {
    /// HTTP method, any case
    pub method: &'a str,
    /// Bucket name
    pub bucket: &'a str,
    /// Object key, empty for bucket-level requests
    pub key: &'a str,
    /// Request headers
    pub headers: &'a HeaderSet,
    /// Request query
    pub query: &'a QueryParams,
}

impl<'a> CanonicalRequest<'a> {
    /// Create a canonical view of a request
    pub fn new(
        method: &'a str,
        bucket: &'a str,
        key: &'a str,
        headers: &'a HeaderSet,
        query: &'a QueryParams,
    ) -> Self {
        Self {
            method,
            bucket,
            key,
            headers,
            query,
        }
    }

    /// Canonicalized resource of this request
    pub fn resource(&self) -> String {
        canonicalize_resource(self.bucket, self.key, self.query)
    }

    /// Canonicalized `x-oss-*` headers of this request
    pub fn canonical_headers(&self) -> String {
        canonicalize_headers(self.headers)
    }

    /// String-to-sign using the request's own `date` header
    pub fn string_to_sign(&self) -> String {
        self.string_to_sign_with(self.headers.get("date").unwrap_or(""))
    }

    /// String-to-sign with an explicit fourth line (the expiry for presigning)
    pub fn string_to_sign_with(&self, date_or_expires: &str) -> String {
        string_to_sign(
            self.method,
            self.headers,
            date_or_expires,
            &self.canonical_headers(),
            &self.resource(),
        )
    }
}

/// Join the five string-to-sign lines
///
/// `content-md5` and `content-type` come from `headers`; absent ones leave
/// their line empty.
pub fn string_to_sign(
    method: &str,
    headers: &HeaderSet,
    fourth_line: &str,
    canonical_headers: &str,
    canonical_resource: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        method.to_ascii_uppercase(),
        headers.get("content-md5").unwrap_or(""),
        headers.get("content-type").unwrap_or(""),
        fourth_line,
        canonical_headers,
        canonical_resource
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_without_query() {
        let query = QueryParams::new();
        assert_eq!(
            canonicalize_resource("test-bucket", "dir/file.txt", &query),
            "/test-bucket/dir/file.txt"
        );
        assert_eq!(canonicalize_resource("test-bucket", "", &query), "/test-bucket/");
    }

    #[test]
    fn test_resource_keeps_only_sub_resources_sorted() {
        let query = QueryParams::new()
            .with("uploadId", "test-upload-id")
            .with("list-type", "2")
            .with("partNumber", "1")
            .with("max-keys", "100")
            .with("response-content-type", "text/plain");

        assert_eq!(
            canonicalize_resource("test-bucket", "test-key.txt", &query),
            "/test-bucket/test-key.txt?partNumber=1&response-content-type=text/plain&uploadId=test-upload-id"
        );
    }

    #[test]
    fn test_resource_bare_sub_resource() {
        let query = QueryParams::new().with_flag("uploads");
        assert_eq!(
            canonicalize_resource("b", "k", &query),
            "/b/k?uploads"
        );
    }

    #[test]
    fn test_resource_allow_list_ignores_case() {
        let query = QueryParams::new().with("UPLOADID", "x").with("Acl", "");
        assert_eq!(canonicalize_resource("b", "k", &query), "/b/k?Acl&UPLOADID=x");
    }

    #[test]
    fn test_resource_non_reserved_only() {
        let query = QueryParams::new()
            .with("prefix", "a/")
            .with("continuation-token", "tok");
        assert_eq!(canonicalize_resource("b", "", &query), "/b/");
    }

    #[test]
    fn test_headers_empty() {
        let headers = HeaderSet::new()
            .with("date", "Wed, 28 Dec 2022 12:00:00 GMT")
            .with("content-type", "text/plain");
        assert_eq!(canonicalize_headers(&headers), "");
    }

    #[test]
    fn test_headers_order_independent() {
        let forward = HeaderSet::new()
            .with("x-oss-meta-user", " test-user ")
            .with("X-OSS-Server-Side-Encryption", "AES256")
            .with("x-oss-copy-source", "/b/k");
        let backward = HeaderSet::new()
            .with("x-oss-copy-source", "/b/k")
            .with("X-OSS-Server-Side-Encryption", "AES256")
            .with("x-oss-meta-user", "test-user");

        let expected = "x-oss-copy-source:/b/k\nx-oss-meta-user:test-user\nx-oss-server-side-encryption:AES256\n";
        assert_eq!(canonicalize_headers(&forward), expected);
        assert_eq!(canonicalize_headers(&backward), expected);
    }

    #[test]
    fn test_string_to_sign_keeps_empty_lines() {
        let headers = HeaderSet::new().with("date", "Wed, 28 Dec 2022 12:00:00 GMT");
        let query = QueryParams::new();
        let request = CanonicalRequest::new("get", "b", "k", &headers, &query);

        assert_eq!(
            request.string_to_sign(),
            "GET\n\n\nWed, 28 Dec 2022 12:00:00 GMT\n/b/k"
        );
    }

    #[test]
    fn test_string_to_sign_full() {
        let headers = HeaderSet::new()
            .with("Content-MD5", "eB5eJF1ptWaXm4bijSPyxw==")
            .with("Content-Type", "text/html")
            .with("Date", "Thu, 17 Nov 2005 18:49:58 GMT")
            .with("X-OSS-Meta-Author", "foo@bar.com")
            .with("X-OSS-Magic", "abracadabra");
        let query = QueryParams::new();
        let request = CanonicalRequest::new("PUT", "oss-example", "nelson", &headers, &query);

        assert_eq!(
            request.string_to_sign(),
            "PUT\neB5eJF1ptWaXm4bijSPyxw==\ntext/html\nThu, 17 Nov 2005 18:49:58 GMT\n\
             x-oss-magic:abracadabra\nx-oss-meta-author:foo@bar.com\n/oss-example/nelson"
        );
    }

    #[test]
    fn test_string_to_sign_with_expiry() {
        let headers = HeaderSet::new().with("date", "ignored");
        let query = QueryParams::new();
        let request = CanonicalRequest::new("GET", "b", "k", &headers, &query);

        assert_eq!(request.string_to_sign_with("1700000000"), "GET\n\n\n1700000000\n/b/k");
    }
}
