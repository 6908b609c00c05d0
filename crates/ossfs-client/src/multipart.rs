//! Multipart upload support for large files

use crate::{
    types::{CompletedPart, PartSummary, PutObjectOptions},
    ClientError, OssClient, Result, MAX_PART_NUMBER,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, warn};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Upload progress information
#[derive(Clone, Debug)]
pub struct UploadProgress {
    /// Bytes uploaded so far
    pub bytes_uploaded: u64,
    /// Total bytes to upload
    pub total_bytes: u64,
    /// Current part number
    pub current_part: u32,
    /// Total number of parts
    pub total_parts: u32,
}

impl UploadProgress {
    /// Get percentage complete
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_uploaded as f64 / self.total_bytes as f64) * 100.0
    }
}

/// Multipart upload handle
///
/// Parts may be uploaded in any order and concurrently; they are always
/// completed in ascending part-number order. Uploading a part number again
/// replaces the earlier ETag. `complete` and `abort` consume the handle.
pub struct MultipartUpload {
    client: Arc<OssClient>,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Mutex<BTreeMap<u32, String>>,
}

impl MultipartUpload {
    /// Start a new multipart upload
    pub async fn initiate(
        client: Arc<OssClient>,
        bucket: &str,
        key: &str,
        options: &PutObjectOptions,
    ) -> Result<Self> {
        let upload_id = client.initiate_multipart_upload(bucket, key, options).await?;
        debug!(bucket, key, upload_id = %upload_id, "multipart upload initiated");
        Ok(Self::resume(client, bucket, key, upload_id))
    }

    /// Attach to an upload started earlier
    ///
    /// No parts are known until they are uploaded or recorded; see
    /// [`MultipartUpload::record_uploaded_parts`].
    pub fn resume(
        client: Arc<OssClient>,
        bucket: &str,
        key: &str,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            key: key.trim_start_matches('/').to_string(),
            upload_id: upload_id.into(),
            parts: Mutex::new(BTreeMap::new()),
        }
    }

    /// Upload a part and remember its ETag
    pub async fn upload_part(&self, part_number: u32, data: impl Into<Bytes>) -> Result<CompletedPart> {
        let etag = self
            .client
            .upload_part(&self.bucket, &self.key, &self.upload_id, part_number, data)
            .await?;

        let part = CompletedPart { part_number, etag };
        self.record_part(part.clone());
        Ok(part)
    }

    /// Remember a part uploaded through another path
    pub fn record_part(&self, part: CompletedPart) {
        self.parts.lock().insert(part.part_number, part.etag);
    }

    /// Fetch the parts the service holds for this upload and remember them
    pub async fn record_uploaded_parts(&self) -> Result<Vec<PartSummary>> {
        let mut uploaded = Vec::new();
        let mut marker = None;
        loop {
            let listing = self
                .client
                .list_parts(&self.bucket, &self.key, &self.upload_id, marker)
                .await?;
            uploaded.extend(listing.parts);
            match listing.next_part_number_marker {
                Some(next) if listing.is_truncated => marker = Some(next),
                _ => break,
            }
        }

        let mut parts = self.parts.lock();
        for part in &uploaded {
            parts.insert(part.part_number, part.etag.clone());
        }
        Ok(uploaded)
    }

    /// Parts recorded so far, ascending by part number
    pub fn parts(&self) -> Vec<CompletedPart> {
        self.parts
            .lock()
            .iter()
            .map(|(&part_number, etag)| CompletedPart {
                part_number,
                etag: etag.clone(),
            })
            .collect()
    }

    /// Complete the upload and return the object's ETag
    pub async fn complete(self) -> Result<String> {
        self.submit().await
    }

    /// Abort the upload
    pub async fn abort(self) -> Result<()> {
        self.client
            .abort_multipart_upload(&self.bucket, &self.key, &self.upload_id)
            .await
    }

    /// Get the upload ID
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Get the number of completed parts
    pub fn completed_parts(&self) -> usize {
        self.parts.lock().len()
    }

    async fn submit(&self) -> Result<String> {
        let parts = self.parts();
        self.client
            .complete_multipart_upload(&self.bucket, &self.key, &self.upload_id, &parts)
            .await
    }
}

/// Upload `data` in `chunk_size` parts
///
/// Any part or completion failure aborts the upload before the error is
/// returned, so every started upload is either completed or aborted.
pub async fn upload_multipart(
    client: Arc<OssClient>,
    bucket: &str,
    key: &str,
    data: Bytes,
    options: &PutObjectOptions,
    progress: Option<ProgressCallback>,
) -> Result<String> {
    let chunk_size = client.config().multipart_chunk_size as usize;
    let total_size = data.len() as u64;
    let total_parts = part_count(data.len(), chunk_size)?;

    let upload = MultipartUpload::initiate(Arc::clone(&client), bucket, key, options).await?;

    let uploaded = upload_chunks(&upload, &data, chunk_size, total_parts, total_size, progress.as_ref()).await;
    let result = match uploaded {
        Ok(()) => upload.submit().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(etag) => Ok(etag),
        Err(err) => {
            let upload_id = upload.upload_id().to_string();
            if let Err(abort_err) = upload.abort().await {
                warn!(
                    bucket,
                    key,
                    upload_id = %upload_id,
                    error = %abort_err,
                    "failed to abort multipart upload"
                );
            }
            Err(err)
        }
    }
}

/// Number of parts `total_size` bytes split into, checked before anything
/// is initiated
fn part_count(total_size: usize, chunk_size: usize) -> Result<u32> {
    if chunk_size == 0 {
        return Err(ClientError::InvalidArgument("multipart chunk size is zero".to_string()));
    }
    let parts = total_size.div_ceil(chunk_size).max(1);
    if parts > MAX_PART_NUMBER as usize {
        return Err(ClientError::InvalidArgument(format!(
            "{} bytes in {} byte parts needs {} parts, at most {} are allowed",
            total_size, chunk_size, parts, MAX_PART_NUMBER
        )));
    }
    Ok(parts as u32)
}

async fn upload_chunks(
    upload: &MultipartUpload,
    data: &Bytes,
    chunk_size: usize,
    total_parts: u32,
    total_size: u64,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let mut bytes_uploaded = 0u64;
    let mut offset = 0usize;

    for part_number in 1..=total_parts {
        let end = (offset + chunk_size).min(data.len());
        upload.upload_part(part_number, data.slice(offset..end)).await?;

        bytes_uploaded += (end - offset) as u64;
        offset = end;

        if let Some(cb) = progress {
            cb(UploadProgress {
                bytes_uploaded,
                total_bytes: total_size,
                current_part: part_number,
                total_parts,
            });
        }
    }
    Ok(())
}
