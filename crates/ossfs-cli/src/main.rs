//! ossfs - command-line access to OSS buckets

use anyhow::Context;
use bytes::Bytes;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use ossfs_adapter::{OssAdapter, StorageAttributes, WriteOptions};
use ossfs_client::{Config, OssClient, PublicUrlGenerator, DEFAULT_REGION};
use std::{path::PathBuf, sync::Arc};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ossfs")]
#[command(about = "Filesystem-style access to OSS buckets")]
#[command(version)]
struct Args {
    /// Access key id
    #[arg(long, env = "ALIYUN_OSS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Access key secret
    #[arg(long, env = "ALIYUN_OSS_ACCESS_KEY_SECRET", hide_env_values = true)]
    access_key_secret: Option<String>,

    /// Region used to derive the endpoint
    #[arg(long, default_value = DEFAULT_REGION, env = "ALIYUN_OSS_REGION")]
    region: String,

    /// Endpoint host, optionally with a scheme (overrides the region)
    #[arg(long, env = "ALIYUN_OSS_ENDPOINT")]
    endpoint: Option<String>,

    /// Bucket name
    #[arg(short, long, env = "ALIYUN_OSS_BUCKET")]
    bucket: String,

    /// Key prefix every path is relative to
    #[arg(long, default_value = "", env = "ALIYUN_OSS_PREFIX")]
    prefix: String,

    /// Address buckets as a path segment instead of a subdomain
    #[arg(long, env = "ALIYUN_OSS_PATH_STYLE")]
    path_style: bool,

    /// Custom domain bound to the bucket
    #[arg(long, env = "ALIYUN_OSS_PUBLIC_DOMAIN")]
    public_domain: Option<String>,

    /// Serve public URLs from the custom domain
    #[arg(long, env = "ALIYUN_OSS_CNAME_ENABLED")]
    cname: bool,

    /// Use the region's internal endpoint
    #[arg(long, env = "ALIYUN_OSS_INTERNAL")]
    internal: bool,

    /// Enable debug logging
    #[arg(short, long, env = "OSSFS_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
        /// Include everything below the directory
        #[arg(short, long)]
        recursive: bool,
        /// Print one JSON object per entry
        #[arg(long)]
        json: bool,
    },
    /// Print a file to stdout
    Cat { path: String },
    /// Download a file
    Get { path: String, destination: PathBuf },
    /// Upload a local file
    Put {
        source: PathBuf,
        path: String,
        /// Content type (guessed from the path when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Delete a file
    Rm { path: String },
    /// Delete a directory and everything below it
    Rmdir { path: String },
    /// Create a directory placeholder
    Mkdir { path: String },
    /// Copy a file
    Cp { from: String, to: String },
    /// Move a file
    Mv { from: String, to: String },
    /// Show file metadata as JSON
    Stat { path: String },
    /// Print a presigned download URL
    Presign {
        path: String,
        /// Seconds until the URL expires
        #[arg(long, default_value = "3600")]
        expires_in: i64,
    },
    /// Print a signed POST policy for browser uploads as JSON
    Policy {
        /// Key prefix uploads are restricted to
        #[arg(default_value = "")]
        key_prefix: String,
        /// Seconds until the policy expires
        #[arg(long, default_value = "3600")]
        expires_in: i64,
        /// Largest accepted upload in bytes
        #[arg(long)]
        max_size: Option<u64>,
    },
    /// Print the public URL of a file
    Url { path: String },
}

impl Args {
    fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            let host = ossfs_client::region_endpoint(&self.region);
            if self.internal {
                host.replace(".aliyuncs.com", "-internal.aliyuncs.com")
            } else {
                host
            }
        })
    }

    fn adapter(&self) -> anyhow::Result<OssAdapter> {
        let (Some(access_key_id), Some(access_key_secret)) =
            (&self.access_key_id, &self.access_key_secret)
        else {
            anyhow::bail!("--access-key-id and --access-key-secret are required");
        };

        let mut config = Config::new(self.endpoint())
            .with_credentials(access_key_id.as_str(), access_key_secret.as_str());
        if self.path_style {
            config = config.with_path_style();
        }
        let client = OssClient::new(config).context("invalid client configuration")?;
        Ok(OssAdapter::new(Arc::new(client), self.bucket.as_str(), &self.prefix))
    }

    fn url_generator(&self) -> PublicUrlGenerator {
        let mut generator = PublicUrlGenerator::new(self.endpoint(), self.bucket.as_str())
            .with_prefix(self.prefix.as_str())
            .with_cname(self.cname)
            .with_internal(self.internal);
        if let Some(domain) = &self.public_domain {
            generator = generator.with_public_domain(domain.as_str());
        }
        generator
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so command output stays pipeable
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ossfs={0},ossfs_client={0},ossfs_adapter={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(bucket = %args.bucket, endpoint = %args.endpoint(), "starting");
    run(&args).await
}

async fn run(args: &Args) -> anyhow::Result<()> {
    if let Command::Url { path } = &args.command {
        println!("{}", args.url_generator().url(path));
        return Ok(());
    }

    let adapter = args.adapter()?;
    match &args.command {
        Command::Ls { path, recursive, json } => {
            let mut entries = adapter.list_contents(path, *recursive);
            while let Some(entry) = entries.try_next().await? {
                if *json {
                    println!("{}", serde_json::to_string(&entry)?);
                } else {
                    println!("{}", format_entry(&entry));
                }
            }
        }
        Command::Cat { path } => {
            let contents = adapter.read(path).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&contents).await?;
            stdout.flush().await?;
        }
        Command::Get { path, destination } => {
            let contents = adapter.read(path).await?;
            tokio::fs::write(destination, &contents)
                .await
                .with_context(|| format!("failed to write {}", destination.display()))?;
            tracing::info!("Downloaded {} bytes to {}", contents.len(), destination.display());
        }
        Command::Put { source, path, content_type } => {
            let contents = tokio::fs::read(source)
                .await
                .with_context(|| format!("failed to read {}", source.display()))?;
            let mut options = WriteOptions::new();
            if let Some(content_type) = content_type {
                options = options.with_content_type(content_type.as_str());
            }
            adapter.write(path, Bytes::from(contents), &options).await?;
        }
        Command::Rm { path } => adapter.delete(path).await?,
        Command::Rmdir { path } => adapter.delete_directory(path).await?,
        Command::Mkdir { path } => adapter.create_directory(path).await?,
        Command::Cp { from, to } => adapter.copy(from, to).await?,
        Command::Mv { from, to } => adapter.move_file(from, to).await?,
        Command::Stat { path } => {
            let size = adapter.file_size(path).await?;
            let modified = adapter.last_modified(path).await?;
            let mime_type = adapter.mime_type(path).await?;
            let checksum = adapter.checksum(path).await?;
            let stat = serde_json::json!({
                "path": path,
                "fileSize": size.file_size,
                "lastModified": modified.last_modified,
                "mimeType": mime_type.mime_type,
                "checksum": checksum,
            });
            println!("{}", serde_json::to_string_pretty(&stat)?);
        }
        Command::Presign { path, expires_in } => {
            let expires_at = Utc::now() + Duration::seconds(*expires_in);
            println!("{}", adapter.temporary_url(path, expires_at)?);
        }
        Command::Policy { key_prefix, expires_in, max_size } => {
            let expires = (Utc::now() + Duration::seconds(*expires_in)).timestamp();
            let conditions: Vec<serde_json::Value> = max_size
                .map(|max| serde_json::json!(["content-length-range", 0, max]))
                .into_iter()
                .collect();
            let form = adapter.client().post_policy(
                adapter.bucket(),
                &adapter.prefixer().prefix_path(key_prefix),
                expires,
                &conditions,
            )?;
            println!("{}", serde_json::to_string_pretty(&form)?);
        }
        Command::Url { .. } => {}
    }
    Ok(())
}

fn format_entry(entry: &StorageAttributes) -> String {
    match entry {
        StorageAttributes::Directory(dir) => format!("{:>12}  {}/", "-", dir.path),
        StorageAttributes::File(file) => format!(
            "{:>12}  {}",
            file.file_size.map(|size| size.to_string()).unwrap_or_default(),
            file.path
        ),
    }
}
