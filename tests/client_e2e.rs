//! End-to-end tests for the client over HTTP
//!
//! A wiremock server stands in for the service; requests go through the
//! reqwest transport with path-style addressing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use ossfs_client::{
    collect_listing, upload_multipart, ClientError, Config, HeaderSet, ListObjectsRequest,
    OssClient, PutObjectOptions, QueryParams, MIN_PART_SIZE,
};
use ossfs_signer::OssSigner;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const BUCKET: &str = "test-bucket";
const ACCESS_KEY_ID: &str = "testAccessKeyId";
const ACCESS_KEY_SECRET: &str = "testAccessKeySecret";

fn client(server: &MockServer) -> OssClient {
    let config = Config::new(server.uri())
        .with_path_style()
        .with_credentials(ACCESS_KEY_ID, ACCESS_KEY_SECRET)
        .with_multipart_chunk_size(MIN_PART_SIZE);
    OssClient::new(config).unwrap()
}

fn header<'a>(request: &'a Request, name: &str) -> &'a str {
    request.headers.get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_signed_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/hello.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-oss-request-id", "req-1")
                .set_body_string("hello world"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let object = client(&server).get_object(BUCKET, "/hello.txt").await.unwrap();
    assert_eq!(object.body, Bytes::from("hello world"));
    assert_eq!(object.metadata.request_id.as_deref(), Some("req-1"));

    let requests = server.received_requests().await.unwrap();
    let date = header(&requests[0], "date");
    let expected = OssSigner::new(ACCESS_KEY_ID, ACCESS_KEY_SECRET)
        .sign_string(&format!("GET\n\n\n{}\n/test-bucket/hello.txt", date))
        .unwrap();
    assert_eq!(
        header(&requests[0], "authorization"),
        format!("OSS {}:{}", ACCESS_KEY_ID, expected)
    );
    assert!(date.ends_with(" GMT"));
}

#[tokio::test]
async fn test_missing_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/missing.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
        ))
        .mount(&server)
        .await;

    let err = client(&server).get_object(BUCKET, "missing.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/denied.txt"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-oss-request-id", "req-403")
                .set_body_string(
                    "<Error><Code>AccessDenied</Code><Message>Access denied.</Message></Error>",
                ),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .put_object(BUCKET, "denied.txt", "data", &PutObjectOptions::new())
        .await
        .unwrap_err();

    match &err {
        ClientError::Service { status, code, message, .. } => {
            assert_eq!(*status, 403);
            assert_eq!(code.as_deref(), Some("AccessDenied"));
            assert_eq!(message, "Access denied.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.request_id(), Some("req-403"));
}

#[tokio::test]
async fn test_listing_follows_continuation_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "photos/"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ListBucketResult>\
             <IsTruncated>true</IsTruncated>\
             <NextContinuationToken>page-2</NextContinuationToken>\
             <Contents><Key>photos/a.jpg</Key><Size>1</Size></Contents>\
             <Contents><Key>photos/b.jpg</Key><Size>2</Size></Contents>\
             </ListBucketResult>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/test-bucket/"))
        .and(query_param("prefix", "photos/"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ListBucketResult>\
             <IsTruncated>false</IsTruncated>\
             <Contents><Key>photos/c.jpg</Key><Size>3</Size></Contents>\
             </ListBucketResult>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let request = ListObjectsRequest::new().with_prefix("photos/");
    let listing = collect_listing(client.list_all(BUCKET, request)).await.unwrap();

    let keys: Vec<&str> = listing.objects.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["photos/a.jpg", "photos/b.jpg", "photos/c.jpg"]);
    assert_eq!(listing.objects.iter().map(|o| o.size).sum::<u64>(), 6);
}

async fn mount_multipart_start(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/test-bucket/big.bin"))
        .and(query_param("uploads", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<InitiateMultipartUploadResult>\
             <Bucket>test-bucket</Bucket><Key>big.bin</Key><UploadId>upload-1</UploadId>\
             </InitiateMultipartUploadResult>",
        ))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_multipart_upload() {
    let server = MockServer::start().await;
    mount_multipart_start(&server).await;
    for part in 1..=3 {
        Mock::given(method("PUT"))
            .and(path("/test-bucket/big.bin"))
            .and(query_param("uploadId", "upload-1"))
            .and(query_param("partNumber", part.to_string()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", format!("\"etag-{}\"", part)))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/test-bucket/big.bin"))
        .and(query_param("uploadId", "upload-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<CompleteMultipartUploadResult><ETag>\"final-3\"</ETag></CompleteMultipartUploadResult>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(client(&server));
    let data = Bytes::from(vec![7u8; (MIN_PART_SIZE * 5 / 2) as usize]);
    let etag = upload_multipart(client, BUCKET, "big.bin", data, &PutObjectOptions::new(), None)
        .await
        .unwrap();
    assert_eq!(etag, "final-3");

    let requests = server.received_requests().await.unwrap();
    let part_sizes: Vec<usize> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.body.len())
        .collect();
    assert_eq!(part_sizes.len(), 3);
    assert_eq!(part_sizes.iter().sum::<usize>(), (MIN_PART_SIZE * 5 / 2) as usize);

    let complete = requests.last().unwrap();
    let body = String::from_utf8(complete.body.clone()).unwrap();
    let first = body.find("<PartNumber>1</PartNumber><ETag>\"etag-1\"</ETag>").unwrap();
    let second = body.find("<PartNumber>2</PartNumber><ETag>\"etag-2\"</ETag>").unwrap();
    let third = body.find("<PartNumber>3</PartNumber><ETag>\"etag-3\"</ETag>").unwrap();
    assert!(first < second && second < third);
}

#[tokio::test]
async fn test_failed_multipart_upload_is_aborted() {
    let server = MockServer::start().await;
    mount_multipart_start(&server).await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/big.bin"))
        .and(query_param("partNumber", "1"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/big.bin"))
        .and(query_param("partNumber", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/test-bucket/big.bin"))
        .and(query_param("uploadId", "upload-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(client(&server));
    let data = Bytes::from(vec![1u8; (MIN_PART_SIZE * 2) as usize]);
    let err = upload_multipart(client, BUCKET, "big.bin", data, &PutObjectOptions::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[test]
fn test_presigned_url() {
    let config = Config::new("http://127.0.0.1:9000")
        .with_path_style()
        .with_credentials(ACCESS_KEY_ID, ACCESS_KEY_SECRET);
    let client = OssClient::new(config).unwrap();

    let url = client
        .presigned_url(
            "GET",
            BUCKET,
            "dir/hello world.txt",
            1_700_003_600,
            &HeaderSet::new(),
            QueryParams::new(),
        )
        .unwrap();

    let (base, query) = url.split_once('?').unwrap();
    assert_eq!(base, "http://127.0.0.1:9000/test-bucket/dir/hello%20world.txt");
    assert!(query.contains(&format!("OSSAccessKeyId={}", ACCESS_KEY_ID)));
    assert!(query.contains("Expires=1700003600"));

    let signature = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("Signature="))
        .unwrap();
    let signature = urlencoding::decode(signature).unwrap();
    assert_eq!(STANDARD.decode(signature.as_bytes()).unwrap().len(), 20);
}
