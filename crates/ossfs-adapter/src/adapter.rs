//! Filesystem operations on top of the object-storage client

use crate::{
    attributes::{parse_timestamp, DirectoryAttributes, FileAttributes, StorageAttributes, Visibility},
    error::{FilesystemError, MetadataKind, Result},
    path::PathPrefixer,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, stream::BoxStream, StreamExt, TryStreamExt};
use ossfs_client::{
    upload_multipart, ClientError, HeaderSet, ListObjectsRequest, ListingPage, ObjectMetadata,
    OssClient, PutObjectOptions, QueryParams,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, instrument};

/// Options for [`OssAdapter::write`]
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Guessed from the path's extension when absent
    pub content_type: Option<String>,
    /// Stored as `x-oss-meta-*` headers
    pub metadata: BTreeMap<String, String>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    fn to_put_options(&self, path: &str) -> PutObjectOptions {
        let content_type = self
            .content_type
            .clone()
            .or_else(|| mime_guess::from_path(path).first_raw().map(str::to_string));
        PutObjectOptions {
            content_type,
            user_metadata: self.metadata.clone(),
            headers: HeaderSet::new(),
        }
    }
}

/// A bucket, optionally narrowed to a key prefix, seen as a filesystem
///
/// Paths are relative to the prefix. Directories exist implicitly through the
/// keys below them, or explicitly as `<dir>/` placeholder objects.
pub struct OssAdapter {
    client: Arc<OssClient>,
    bucket: String,
    prefixer: PathPrefixer,
}

impl OssAdapter {
    pub fn new(client: Arc<OssClient>, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefixer: PathPrefixer::new(prefix),
        }
    }

    pub fn client(&self) -> &Arc<OssClient> {
        &self.client
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefixer(&self) -> &PathPrefixer {
        &self.prefixer
    }

    /// Check if a file exists
    #[instrument(skip(self))]
    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        self.client
            .object_exists(&self.bucket, &self.prefixer.prefix_path(path))
            .await
            .map_err(|source| FilesystemError::UnableToCheckExistence {
                location: path.to_string(),
                source,
            })
    }

    /// Check if anything is stored below a directory
    #[instrument(skip(self))]
    pub async fn directory_exists(&self, path: &str) -> Result<bool> {
        let request = ListObjectsRequest::new()
            .with_prefix(self.prefixer.prefix_directory_path(path))
            .with_max_keys(1);
        let page = self
            .client
            .list_objects(&self.bucket, &request)
            .await
            .map_err(|source| FilesystemError::UnableToCheckExistence {
                location: path.to_string(),
                source,
            })?;
        Ok(!page.is_empty())
    }

    /// Write a file, going multipart above the configured threshold
    #[instrument(skip(self, contents, options))]
    pub async fn write(&self, path: &str, contents: impl Into<Bytes>, options: &WriteOptions) -> Result<()> {
        let key = self.prefixer.prefix_path(path);
        let contents: Bytes = contents.into();
        let put_options = options.to_put_options(path);

        let result = if contents.len() as u64 > self.client.config().multipart_threshold {
            debug!(size = contents.len(), "writing with multipart upload");
            upload_multipart(
                Arc::clone(&self.client),
                &self.bucket,
                &key,
                contents,
                &put_options,
                None,
            )
            .await
        } else {
            self.client
                .put_object(&self.bucket, &key, contents, &put_options)
                .await
        };

        result
            .map(|_| ())
            .map_err(|source| FilesystemError::UnableToWrite {
                location: path.to_string(),
                source,
            })
    }

    /// Read a whole file
    #[instrument(skip(self))]
    pub async fn read(&self, path: &str) -> Result<Bytes> {
        match self
            .client
            .get_object(&self.bucket, &self.prefixer.prefix_path(path))
            .await
        {
            Ok(object) => Ok(object.body),
            Err(source) if source.is_not_found() => Err(FilesystemError::FileNotFound {
                location: path.to_string(),
            }),
            Err(source) => Err(FilesystemError::UnableToRead {
                location: path.to_string(),
                source,
            }),
        }
    }

    /// Delete a file; deleting a missing file succeeds
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        match self
            .client
            .delete_object(&self.bucket, &self.prefixer.prefix_path(path))
            .await
        {
            Ok(()) => Ok(()),
            Err(source) if source.is_not_found() => Ok(()),
            Err(source) => Err(FilesystemError::UnableToDelete {
                location: path.to_string(),
                source,
            }),
        }
    }

    /// Delete every object below a directory, one listing page at a time
    #[instrument(skip(self))]
    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        let error = |source: ClientError| FilesystemError::UnableToDeleteDirectory {
            location: path.to_string(),
            source,
        };

        let request = ListObjectsRequest::new().with_prefix(self.prefixer.prefix_directory_path(path));
        let pages = self.client.list_all(&self.bucket, request);
        futures::pin_mut!(pages);

        let mut deleted = 0usize;
        while let Some(page) = pages.try_next().await.map_err(error)? {
            for object in page.objects {
                match self.client.delete_object(&self.bucket, &object.key).await {
                    Ok(()) => deleted += 1,
                    Err(source) if source.is_not_found() => {}
                    Err(source) => return Err(error(source)),
                }
            }
        }

        debug!(deleted, "directory deleted");
        Ok(())
    }

    /// Create a `<dir>/` placeholder object
    #[instrument(skip(self))]
    pub async fn create_directory(&self, path: &str) -> Result<()> {
        self.client
            .put_directory(&self.bucket, &self.prefixer.prefix_directory_path(path))
            .await
            .map(|_| ())
            .map_err(|source| FilesystemError::UnableToCreateDirectory {
                location: path.to_string(),
                source,
            })
    }

    /// Stream the entries below `path`
    ///
    /// A shallow listing yields files and the directories directly below
    /// `path`; a deep one yields every file. The directory itself is never
    /// part of its own listing.
    pub fn list_contents<'a>(&'a self, path: &'a str, deep: bool) -> BoxStream<'a, Result<StorageAttributes>> {
        let request = ListObjectsRequest::new()
            .with_prefix(self.prefixer.prefix_directory_path(path))
            .with_delimiter(if deep { "" } else { "/" });

        self.client
            .list_all(&self.bucket, request)
            .map_err(move |source| FilesystemError::UnableToList {
                location: path.to_string(),
                source,
            })
            .map_ok(move |page| {
                stream::iter(
                    self.page_entries(page, path)
                        .into_iter()
                        .map(Ok::<_, FilesystemError>),
                )
            })
            .try_flatten()
            .boxed()
    }

    fn page_entries(&self, page: ListingPage, path: &str) -> Vec<StorageAttributes> {
        let own_path = path.trim_matches('/');
        let mut entries = Vec::with_capacity(page.len());

        for object in page.objects {
            let object_path = self.prefixer.strip_prefix(&object.key);
            if object_path.is_empty() || object_path.trim_end_matches('/') == own_path {
                continue;
            }
            if object_path.ends_with('/') {
                entries.push(StorageAttributes::Directory(DirectoryAttributes {
                    path: object_path.trim_end_matches('/').to_string(),
                }));
                continue;
            }
            entries.push(StorageAttributes::File(FileAttributes {
                path: object_path.to_string(),
                file_size: Some(object.size),
                last_modified: object.last_modified.as_deref().and_then(parse_timestamp),
                ..Default::default()
            }));
        }

        for prefix in &page.prefixes {
            let dir_path = self.prefixer.strip_directory_prefix(prefix);
            if !dir_path.is_empty() && dir_path != own_path {
                entries.push(StorageAttributes::Directory(DirectoryAttributes {
                    path: dir_path.to_string(),
                }));
            }
        }
        entries
    }

    /// Server-side copy
    #[instrument(skip(self))]
    pub async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        self.client
            .copy_object(
                &self.bucket,
                &self.prefixer.prefix_path(destination),
                &self.bucket,
                &self.prefixer.prefix_path(source),
                &HeaderSet::new(),
            )
            .await
            .map(|_| ())
            .map_err(|err| FilesystemError::UnableToCopy {
                from: source.to_string(),
                to: destination.to_string(),
                source: err,
            })
    }

    /// Copy then delete the source
    ///
    /// When only the delete fails the error wraps
    /// [`ClientError::MoveIncomplete`] and both files exist.
    #[instrument(skip(self))]
    pub async fn move_file(&self, source: &str, destination: &str) -> Result<()> {
        self.client
            .move_object(
                &self.bucket,
                &self.prefixer.prefix_path(source),
                &self.prefixer.prefix_path(destination),
            )
            .await
            .map_err(|err| FilesystemError::UnableToMove {
                from: source.to_string(),
                to: destination.to_string(),
                source: err,
            })
    }

    /// File size in bytes
    pub async fn file_size(&self, path: &str) -> Result<FileAttributes> {
        let metadata = self.metadata(path, MetadataKind::FileSize).await?;
        let size = required(path, MetadataKind::FileSize, metadata.content_length, "Content-Length")?;
        Ok(FileAttributes {
            file_size: Some(size),
            ..FileAttributes::new(path)
        })
    }

    /// Last modification time in unix seconds
    pub async fn last_modified(&self, path: &str) -> Result<FileAttributes> {
        let metadata = self.metadata(path, MetadataKind::LastModified).await?;
        let timestamp = metadata.last_modified.as_deref().and_then(parse_timestamp);
        let timestamp = required(path, MetadataKind::LastModified, timestamp, "Last-Modified")?;
        Ok(FileAttributes {
            last_modified: Some(timestamp),
            ..FileAttributes::new(path)
        })
    }

    /// Stored content type
    pub async fn mime_type(&self, path: &str) -> Result<FileAttributes> {
        let metadata = self.metadata(path, MetadataKind::MimeType).await?;
        let mime_type = required(path, MetadataKind::MimeType, metadata.content_type, "Content-Type")?;
        Ok(FileAttributes {
            mime_type: Some(mime_type),
            ..FileAttributes::new(path)
        })
    }

    /// ETag of the stored file
    #[instrument(skip(self))]
    pub async fn checksum(&self, path: &str) -> Result<String> {
        let metadata = match self
            .client
            .head_object(&self.bucket, &self.prefixer.prefix_path(path))
            .await
        {
            Ok(metadata) => metadata,
            Err(source) if source.is_not_found() => {
                return Err(FilesystemError::FileNotFound {
                    location: path.to_string(),
                })
            }
            Err(source) => {
                return Err(FilesystemError::UnableToProvideChecksum {
                    location: path.to_string(),
                    source,
                })
            }
        };

        metadata.etag.ok_or_else(|| FilesystemError::UnableToProvideChecksum {
            location: path.to_string(),
            source: ClientError::Parse("response has no ETag header".to_string()),
        })
    }

    /// Presigned GET URL valid until `expires_at`
    pub fn temporary_url(&self, path: &str, expires_at: DateTime<Utc>) -> Result<String> {
        self.client
            .presigned_url(
                "GET",
                &self.bucket,
                &self.prefixer.prefix_path(path),
                expires_at.timestamp(),
                &HeaderSet::new(),
                QueryParams::new(),
            )
            .map_err(|source| FilesystemError::UnableToGenerateUrl {
                location: path.to_string(),
                source,
            })
    }

    /// Objects are always served as public
    pub fn visibility(&self, path: &str) -> FileAttributes {
        FileAttributes {
            visibility: Some(Visibility::Public),
            ..FileAttributes::new(path)
        }
    }

    /// Per-object visibility is not supported
    pub fn set_visibility(&self, path: &str, _visibility: Visibility) -> Result<()> {
        Err(FilesystemError::UnableToSetVisibility {
            location: path.to_string(),
            reason: "OSS does not support visibility".to_string(),
        })
    }

    async fn metadata(&self, path: &str, kind: MetadataKind) -> Result<ObjectMetadata> {
        match self
            .client
            .head_object(&self.bucket, &self.prefixer.prefix_path(path))
            .await
        {
            Ok(metadata) => Ok(metadata),
            Err(source) if source.is_not_found() => Err(FilesystemError::FileNotFound {
                location: path.to_string(),
            }),
            Err(source) => Err(FilesystemError::UnableToRetrieveMetadata {
                location: path.to_string(),
                metadata: kind,
                source,
            }),
        }
    }
}

fn required<T>(path: &str, kind: MetadataKind, value: Option<T>, header: &str) -> Result<T> {
    value.ok_or_else(|| FilesystemError::UnableToRetrieveMetadata {
        location: path.to_string(),
        metadata: kind,
        source: ClientError::Parse(format!("response has no valid {} header", header)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ossfs_client::{Config, NoopObserver};
    use wiremock::matchers::{body_string, header, method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BUCKET: &str = "test-bucket";

    async fn adapter(server: &MockServer, prefix: &str) -> OssAdapter {
        let config = Config::new(server.uri())
            .with_path_style()
            .with_credentials("testAccessKeyId", "testAccessKeySecret");
        let client = OssClient::new(config).unwrap().with_observer(Arc::new(NoopObserver));
        OssAdapter::new(Arc::new(client), BUCKET, prefix)
    }

    #[tokio::test]
    async fn test_file_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(url_path("/test-bucket/uploads/present.txt"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(url_path("/test-bucket/uploads/absent.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(url_path("/test-bucket/uploads/forbidden.txt"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "uploads").await;
        assert!(adapter.file_exists("present.txt").await.unwrap());
        assert!(!adapter.file_exists("absent.txt").await.unwrap());
        assert!(matches!(
            adapter.file_exists("forbidden.txt").await,
            Err(FilesystemError::UnableToCheckExistence { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_guesses_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(url_path("/test-bucket/uploads/notes/today.txt"))
            .and(header("content-type", "text/plain"))
            .and(body_string("hello"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"e\""))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, "uploads/").await;
        adapter
            .write("/notes/today.txt", "hello", &WriteOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_write_explicit_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(url_path("/test-bucket/blob"))
            .and(header("content-type", "application/json"))
            .and(header("x-oss-meta-origin", "test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        let options = WriteOptions::new()
            .with_content_type("application/json")
            .with_metadata("origin", "test");
        adapter.write("blob", "{}", &options).await.unwrap();
    }

    #[tokio::test]
    async fn test_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("contents"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/missing.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        assert_eq!(adapter.read("a.txt").await.unwrap(), Bytes::from("contents"));

        let err = adapter.read("missing.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.location(), "missing.txt");
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(url_path("/test-bucket/gone.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        adapter.delete("gone.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_directory() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(url_path("/test-bucket/uploads/albums/"))
            .and(header("content-type", "application/x-directory"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, "uploads").await;
        adapter.create_directory("albums").await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/"))
            .and(query_param("prefix", "full/"))
            .and(query_param("max-keys", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<ListBucketResult><Contents><Key>full/a</Key><Size>1</Size></Contents></ListBucketResult>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/"))
            .and(query_param("prefix", "empty/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ListBucketResult/>"))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        assert!(adapter.directory_exists("full").await.unwrap());
        assert!(!adapter.directory_exists("empty/").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_contents_shallow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/"))
            .and(query_param("prefix", "uploads/albums/"))
            .and(query_param("delimiter", "/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<ListBucketResult>\
                 <Contents><Key>uploads/albums/</Key><Size>0</Size></Contents>\
                 <Contents><Key>uploads/albums/cover.jpg</Key><Size>2048</Size>\
                 <LastModified>2024-01-15T10:30:00.000Z</LastModified></Contents>\
                 <CommonPrefixes><Prefix>uploads/albums/2023/</Prefix></CommonPrefixes>\
                 </ListBucketResult>",
            ))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "uploads").await;
        let entries: Vec<StorageAttributes> = adapter
            .list_contents("albums", false)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            entries,
            vec![
                StorageAttributes::File(FileAttributes {
                    path: "albums/cover.jpg".to_string(),
                    file_size: Some(2048),
                    last_modified: Some(1_705_314_600),
                    ..Default::default()
                }),
                StorageAttributes::Directory(DirectoryAttributes {
                    path: "albums/2023".to_string(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_contents_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/test-bucket/"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        let results: Vec<_> = adapter.list_contents("", true).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FilesystemError::UnableToList { .. })));
    }

    #[tokio::test]
    async fn test_copy_and_move() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(url_path("/test-bucket/p/b.txt"))
            .and(header("x-oss-copy-source", "/test-bucket/p/a.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<CopyObjectResult><ETag>\"e\"</ETag></CopyObjectResult>"),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(url_path("/test-bucket/p/a.txt"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, "p").await;
        adapter.copy("a.txt", "b.txt").await.unwrap();
        adapter.move_file("a.txt", "b.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_move_incomplete() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<CopyObjectResult><ETag>\"e\"</ETag></CopyObjectResult>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        let err = adapter.move_file("a.txt", "b.txt").await.unwrap_err();
        assert!(matches!(
            err,
            FilesystemError::UnableToMove {
                source: ClientError::MoveIncomplete { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(url_path("/test-bucket/photo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .insert_header("etag", "\"abc123\"")
                    .insert_header("last-modified", "Wed, 28 Dec 2022 12:00:00 GMT"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(url_path("/test-bucket/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = adapter(&server, "").await;
        assert_eq!(
            adapter.mime_type("photo.png").await.unwrap().mime_type.as_deref(),
            Some("image/png")
        );
        assert_eq!(
            adapter.last_modified("photo.png").await.unwrap().last_modified,
            Some(1_672_228_800)
        );
        assert_eq!(adapter.checksum("photo.png").await.unwrap(), "abc123");

        assert!(adapter.file_size("missing.png").await.unwrap_err().is_not_found());
        assert!(adapter.checksum("missing.png").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_temporary_url_and_visibility() {
        let server = MockServer::start().await;
        let adapter = adapter(&server, "uploads").await;

        let expires_at = DateTime::from_timestamp(1_700_003_600, 0).unwrap();
        let url = adapter.temporary_url("a.txt", expires_at).unwrap();
        assert!(url.starts_with(&format!("{}/test-bucket/uploads/a.txt?", server.uri())));
        assert!(url.contains("OSSAccessKeyId=testAccessKeyId&Expires=1700003600&Signature="));

        assert_eq!(adapter.visibility("a.txt").visibility, Some(Visibility::Public));
        assert!(matches!(
            adapter.set_visibility("a.txt", Visibility::Private),
            Err(FilesystemError::UnableToSetVisibility { .. })
        ));
    }
}
