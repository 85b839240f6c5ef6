/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time;

use bucket_fs::store::s3::S3Connector;
use bucket_fs::{Config, FileMetadata, FileSystem, UserMetadata};
use clap::{Parser, Subcommand};
use tracing::{debug_span, Instrument};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "bfs")]
#[command(about = "Filesystem-style operations on objects under a folder of an S3 bucket.")]
pub struct Args {
    /// Bucket to operate on
    #[arg(long, required = true)]
    bucket: String,

    /// Folder every path is relative to
    #[arg(long, required = true)]
    parent: String,

    /// Custom endpoint for S3 compatible stores
    #[arg(long)]
    endpoint_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List every object under a prefix
    Ls {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Print the metadata of an object
    Stat { path: String },
    /// Write the content of an object to stdout
    Cat { path: String },
    /// Upload a local file
    Put {
        source: PathBuf,
        path: String,
        /// User metadata as `key=value`, may be repeated
        #[arg(long = "meta", value_parser = parse_pair)]
        metadata: Vec<(String, String)>,
    },
    /// Copy an object, refusing to overwrite the destination
    Cp { from: String, to: String },
    /// Move an object
    Mv { from: String, to: String },
    /// Delete an object
    Rm { path: String },
}

fn parse_pair(s: &str) -> Result<(String, String), BoxError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `key=value`, got `{s}`"))?;
    Ok((key.to_owned(), value.to_owned()))
}

fn print_metadata(meta: &FileMetadata) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(meta)?);
    Ok(())
}

async fn run(fs: &FileSystem, command: Command) -> Result<(), BoxError> {
    match command {
        Command::Ls { prefix } => {
            let mut files = fs.list(&prefix).await?.into_values().collect::<Vec<_>>();
            files.sort_by(|a, b| a.object_key().cmp(b.object_key()));
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Command::Stat { path } => print_metadata(&fs.stat(&path).await?)?,
        Command::Cat { path } => {
            let (data, _) = fs.read(&path).await?;
            std::io::stdout().write_all(&data)?;
        }
        Command::Put {
            source,
            path,
            metadata,
        } => {
            let data = tokio::fs::read(&source).await?;
            let metadata: UserMetadata = metadata.into_iter().collect();
            let start = time::Instant::now();
            let meta = fs.write(data, &path, metadata).await?;
            tracing::info!("uploaded {} bytes in {:?}", meta.size(), start.elapsed());
            print_metadata(&meta)?;
        }
        Command::Cp { from, to } => fs.copy(&from, &to).await?,
        Command::Mv { from, to } => fs.rename(&from, &to).await?,
        Command::Rm { path } => fs.delete(&path).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // credentials are discovered here and handed to the connector explicitly
    let mut sdk_config = aws_config::from_env();
    if let Some(endpoint_url) = &args.endpoint_url {
        sdk_config = sdk_config.endpoint_url(endpoint_url);
    }
    let sdk_config = sdk_config.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(args.endpoint_url.is_some())
        .build();
    let connector = S3Connector::from_conf(s3_config);

    let config = Config::builder()
        .bucket_name(&args.bucket)
        .parent_folder(&args.parent)
        .build();
    let fs = FileSystem::connect(config, &connector).await?;

    let result = run(&fs, args.command)
        .instrument(debug_span!("bfs"))
        .await;
    fs.teardown().await?;

    if let Err(ref err) = result {
        tracing::error!("command failed: {err}");
    }
    result
}
