//! Basic usage of the ossfs adapter
//!
//! This example demonstrates:
//! - Building an adapter from `ALIYUN_OSS_*` variables
//! - Writing, reading and listing files
//! - Presigned and public URLs
//!
//! Run with: cargo run --example basic_usage

use chrono::{Duration, Utc};
use futures::TryStreamExt;
use ossfs_adapter::{AdapterFactory, StorageAttributes, WriteOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let factory = AdapterFactory::from_env();
    let Some(adapter) = factory.create_adapter()? else {
        anyhow::bail!("set ALIYUN_OSS_ACCESS_KEY_ID, ALIYUN_OSS_ACCESS_KEY_SECRET and ALIYUN_OSS_BUCKET");
    };

    // ==================== Files ====================

    adapter
        .write("demo/hello.txt", "Hello, World!", &WriteOptions::new())
        .await?;
    adapter
        .write(
            "demo/config.json",
            serde_json::to_vec_pretty(&serde_json::json!({ "app": "ossfs-demo" }))?,
            &WriteOptions::new().with_metadata("origin", "basic_usage"),
        )
        .await?;
    println!("Uploaded 2 files");

    let contents = adapter.read("demo/hello.txt").await?;
    println!("demo/hello.txt: {}", String::from_utf8_lossy(&contents));

    // ==================== Listing ====================

    let mut entries = adapter.list_contents("demo", false);
    while let Some(entry) = entries.try_next().await? {
        match entry {
            StorageAttributes::File(file) => {
                println!("  {} ({} bytes)", file.path, file.file_size.unwrap_or_default())
            }
            StorageAttributes::Directory(dir) => println!("  {}/", dir.path),
        }
    }

    // ==================== URLs ====================

    let url = adapter.temporary_url("demo/hello.txt", Utc::now() + Duration::minutes(10))?;
    println!("Presigned: {}", url);
    if let Some(generator) = factory.create_url_generator() {
        println!("Public: {}", generator.url("demo/hello.txt"));
    }

    adapter.delete_directory("demo").await?;
    println!("Cleaned up");
    Ok(())
}
