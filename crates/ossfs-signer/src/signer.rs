//! HMAC-SHA1 request signer

use crate::{
    canonical::CanonicalRequest,
    policy::{policy_document, SignedPostPolicy},
    HeaderSet, QueryParams, Result, SigningError, AUTHORIZATION_SCHEME, PRESIGN_ACCESS_KEY_PARAM,
    PRESIGN_EXPIRES_PARAM, PRESIGN_SIGNATURE_PARAM,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// Access key pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    access_key_secret: String,
}

impl Credentials {
    /// Create credentials from an access key id and secret
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// The public access key id
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Signs requests, presigned URLs and POST policies
#[derive(Clone, Debug)]
pub struct OssSigner {
    credentials: Credentials,
}

impl OssSigner {
    /// Create a signer from an access key id and secret
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self::from_credentials(Credentials::new(access_key_id, access_key_secret))
    }

    /// Create a signer from existing credentials
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// The access key id requests are signed for
    pub fn access_key_id(&self) -> &str {
        self.credentials.access_key_id()
    }

    /// Compute the base64 signature of a request
    ///
    /// The fourth line of the string-to-sign is the request's `date` header.
    pub fn sign_request(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        headers: &HeaderSet,
        query: &QueryParams,
    ) -> Result<String> {
        let string_to_sign = CanonicalRequest::new(method, bucket, key, headers, query).string_to_sign();
        self.sign_string(&string_to_sign)
    }

    /// Format an `Authorization` header value for a signature
    pub fn authorization(&self, signature: &str) -> String {
        format!(
            "{} {}:{}",
            AUTHORIZATION_SCHEME,
            self.credentials.access_key_id, signature
        )
    }

    /// Sign a request and return the full `Authorization` header value
    pub fn authorize(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        headers: &HeaderSet,
        query: &QueryParams,
    ) -> Result<String> {
        let signature = self.sign_request(method, bucket, key, headers, query)?;
        Ok(self.authorization(&signature))
    }

    /// Build a presigned query string
    ///
    /// `query` gains `OSSAccessKeyId` and `Expires` before canonicalization and
    /// the string-to-sign carries `expires` (unix seconds) instead of a date.
    /// Returns the encoded query string, ending with `Signature`, without the
    /// leading `?`.
    pub fn presign_query(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        expires: i64,
        headers: &HeaderSet,
        query: QueryParams,
    ) -> Result<String> {
        let mut query = query;
        query.insert(PRESIGN_ACCESS_KEY_PARAM, self.credentials.access_key_id.as_str());
        query.insert(PRESIGN_EXPIRES_PARAM, expires.to_string());

        let string_to_sign = CanonicalRequest::new(method, bucket, key, headers, &query)
            .string_to_sign_with(&expires.to_string());
        let signature = self.sign_string(&string_to_sign)?;
        query.insert(PRESIGN_SIGNATURE_PARAM, signature);

        Ok(query.to_query_string())
    }

    /// Build and sign a POST policy
    ///
    /// The signature covers the base64 text of the policy, not the raw JSON.
    pub fn post_policy<C: Serialize>(
        &self,
        bucket: &str,
        key_prefix: &str,
        expires: i64,
        conditions: &[C],
    ) -> Result<SignedPostPolicy> {
        let document = policy_document(bucket, key_prefix, expires, conditions)?;
        let policy = STANDARD.encode(document);
        let signature = self.sign_string(&policy)?;

        Ok(SignedPostPolicy {
            policy,
            signature,
            access_key_id: self.credentials.access_key_id.clone(),
            expires,
        })
    }

    /// Base64 HMAC-SHA1 of `message` keyed with the secret
    pub fn sign_string(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.credentials.access_key_secret.as_bytes())
            .map_err(|_| SigningError::InvalidKey)?;
        mac.update(message.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signer() -> OssSigner {
        OssSigner::new("testAccessKeyId", "testAccessKeySecret")
    }

    fn put_headers() -> HeaderSet {
        HeaderSet::new()
            .with("date", "Wed, 28 Dec 2022 12:00:00 GMT")
            .with("content-type", "application/octet-stream")
    }

    #[test]
    fn test_access_key_id() {
        assert_eq!(signer().access_key_id(), "testAccessKeyId");
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", signer());
        assert!(debug.contains("testAccessKeyId"));
        assert!(!debug.contains("testAccessKeySecret"));
    }

    #[test]
    fn test_sign_request_is_stable() {
        let signer = signer();
        let query = QueryParams::new();

        let first = signer
            .sign_request("PUT", "test-bucket", "test-key.txt", &put_headers(), &query)
            .unwrap();
        let second = signer
            .sign_request("PUT", "test-bucket", "test-key.txt", &put_headers(), &query)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, "yvFvMt8qQqia83xOA11oN3gs5dQ=");
    }

    #[test]
    fn test_sign_request_known_vector() {
        let signer = OssSigner::new("44CF9590006BF252F707", "OtxrzxIsfpFjA7SwPzILwy8Bw21TLhquhboDYROV");
        let headers = HeaderSet::new()
            .with("Content-MD5", "eB5eJF1ptWaXm4bijSPyxw==")
            .with("Content-Type", "text/html")
            .with("Date", "Thu, 17 Nov 2005 18:49:58 GMT")
            .with("X-OSS-Meta-Author", "foo@bar.com")
            .with("X-OSS-Magic", "abracadabra");

        let authorization = signer
            .authorize("PUT", "oss-example", "nelson", &headers, &QueryParams::new())
            .unwrap();
        assert_eq!(
            authorization,
            "OSS 44CF9590006BF252F707:hD208RWMpg77svXkQRwWXS+V5KQ="
        );
    }

    #[test]
    fn test_method_case_does_not_matter() {
        let signer = signer();
        let query = QueryParams::new();
        let upper = signer.sign_request("PUT", "b", "k", &put_headers(), &query).unwrap();
        let lower = signer.sign_request("put", "b", "k", &put_headers(), &query).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_non_reserved_query_does_not_change_signature() {
        let signer = signer();
        let plain = signer
            .sign_request("GET", "b", "", &put_headers(), &QueryParams::new())
            .unwrap();
        let listed = signer
            .sign_request(
                "GET",
                "b",
                "",
                &put_headers(),
                &QueryParams::new().with("list-type", "2").with("max-keys", "1000"),
            )
            .unwrap();
        assert_eq!(plain, listed);

        let part = signer
            .sign_request(
                "GET",
                "b",
                "",
                &put_headers(),
                &QueryParams::new().with("uploadId", "u1"),
            )
            .unwrap();
        assert_ne!(plain, part);
    }

    #[test]
    fn test_signature_is_twenty_bytes() {
        let signature = signer()
            .sign_request("GET", "b", "k", &put_headers(), &QueryParams::new())
            .unwrap();
        let raw = STANDARD.decode(signature).unwrap();
        assert_eq!(raw.len(), 20);
    }

    #[test]
    fn test_presign_query() {
        let query = signer()
            .presign_query(
                "GET",
                "test-bucket",
                "test-key",
                1_700_003_600,
                &HeaderSet::new(),
                QueryParams::new(),
            )
            .unwrap();

        assert_eq!(
            query,
            "OSSAccessKeyId=testAccessKeyId&Expires=1700003600&Signature=axjlde%2BSVr3I0PDHHzbG5DMz%2B6U%3D"
        );
    }

    #[test]
    fn test_presign_signs_reserved_pass_through_query() {
        let query = signer()
            .presign_query(
                "GET",
                "test-bucket",
                "test-key.txt",
                1_700_003_600,
                &HeaderSet::new(),
                QueryParams::new().with("response-content-type", "text/plain"),
            )
            .unwrap();

        assert!(query.starts_with("response-content-type=text%2Fplain&OSSAccessKeyId="));
        assert!(query.ends_with("Signature=%2FDGM13S1jnPS0l9SS9sru4uePUw%3D"));
    }

    #[test]
    fn test_post_policy() {
        let conditions = vec![json!(["content-length-range", 0, 10485760])];
        let policy = signer()
            .post_policy("test-bucket", "uploads/", 1_700_000_000, &conditions)
            .unwrap();

        assert_eq!(policy.access_key_id, "testAccessKeyId");
        assert_eq!(policy.expires, 1_700_000_000);

        let document: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&policy.policy).unwrap()).unwrap();
        assert_eq!(document["expiration"], "2023-11-14T22:13:20.000Z");
        assert_eq!(document["conditions"][0], json!({ "bucket": "test-bucket" }));
        assert_eq!(document["conditions"][1], json!(["starts-with", "$key", "uploads/"]));
        assert_eq!(document["conditions"][2], json!(["content-length-range", 0, 10485760]));

        // Signed over the base64 text, not the JSON
        assert_eq!(policy.signature, signer().sign_string(&policy.policy).unwrap());
    }
}
