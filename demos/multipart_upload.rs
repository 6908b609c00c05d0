//! Multipart upload with progress reporting
//!
//! Run with: cargo run --example multipart_upload

use bytes::Bytes;
use ossfs_client::{upload_multipart, OssClient, PutObjectOptions, UploadProgress};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let bucket = std::env::var("ALIYUN_OSS_BUCKET")?;
    let client = Arc::new(OssClient::from_env()?);

    // 20 MB of data, uploaded in the default 8 MB parts
    let data = Bytes::from(vec![0x42u8; 20 * 1024 * 1024]);
    let progress = Box::new(|progress: UploadProgress| {
        println!(
            "  part {}/{}: {:.1}%",
            progress.current_part,
            progress.total_parts,
            progress.percentage()
        );
    });

    let options = PutObjectOptions::new().with_content_type("application/octet-stream");
    let etag = upload_multipart(
        Arc::clone(&client),
        &bucket,
        "demo/large.bin",
        data,
        &options,
        Some(progress),
    )
    .await?;
    println!("Uploaded demo/large.bin (ETag {})", etag);

    client.delete_object(&bucket, "demo/large.bin").await?;
    Ok(())
}
