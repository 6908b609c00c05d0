//! POST policy documents for browser uploads

use crate::{Result, SigningError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A signed POST policy, ready to be embedded in an upload form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPostPolicy {
    /// Base64-encoded JSON policy document
    pub policy: String,
    /// Base64 HMAC-SHA1 of `policy`
    pub signature: String,
    /// Access key id the form must present
    pub access_key_id: String,
    /// Expiry as unix seconds
    pub expires: i64,
}

#[derive(Serialize)]
struct PolicyDocument {
    expiration: String,
    conditions: Vec<Value>,
}

/// Format an expiry as the ISO-8601 millisecond UTC timestamp policies use
pub fn policy_expiration(expires: i64) -> Result<String> {
    let at: DateTime<Utc> =
        DateTime::from_timestamp(expires, 0).ok_or(SigningError::InvalidExpiry(expires))?;
    Ok(at.format("%Y-%m-%dT%H:%M:%S.000Z").to_string())
}

/// Build the JSON policy document
///
/// Conditions are the bucket match, the key prefix match, then `extra` in
/// the order given.
pub fn policy_document<C: Serialize>(
    bucket: &str,
    key_prefix: &str,
    expires: i64,
    extra: &[C],
) -> Result<String> {
    let mut conditions = Vec::with_capacity(extra.len() + 2);
    conditions.push(json!({ "bucket": bucket }));
    conditions.push(json!(["starts-with", "$key", key_prefix]));
    for condition in extra {
        conditions.push(serde_json::to_value(condition)?);
    }

    let document = PolicyDocument {
        expiration: policy_expiration(expires)?,
        conditions,
    };
    Ok(serde_json::to_string(&document)?)
}
