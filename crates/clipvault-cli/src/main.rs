//! clipvault: operator CLI for video ingestion.
//!
//! Configuration comes from the environment (and `.env`); see `Config::from_env`.
//! Command output is JSON on stdout, logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use clipvault_cli::{init_tracing, print_json, transcode_timeout};
use clipvault_core::{Config, CreateUploadUrlRequest, ProviderKind};
use clipvault_processing::{FFmpegTranscoder, PackagingPipeline, PipelineSettings};
use clipvault_services::create_video_provider;
use clipvault_storage::{check_connection, create_store_client};

#[derive(Parser)]
#[command(name = "clipvault", about = "Video ingestion and HLS packaging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List ready source videos, newest first
    List {
        /// Listing prefix (defaults to SOURCE_PREFIX)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Issue a presigned upload URL for a new source file
    UploadUrl {
        /// Original filename, e.g. clip.mp4
        filename: String,
        /// Content type the uploader will send
        #[arg(long, default_value = "video/mp4")]
        content_type: String,
    },
    /// Package a source object into an HLS bundle plus poster
    Package {
        /// Object key of the source video
        source_key: String,
    },
    /// Resolve playback URLs for a video ID
    Urls {
        /// Video ID as returned by `list`
        video_id: String,
    },
    /// Probe the object store with the configured credentials
    Health,
}

async fn package(config: &Config, source_key: &str) -> anyhow::Result<()> {
    if config.provider != ProviderKind::ObjectStorage {
        anyhow::bail!(
            "packaging runs against object storage only (VIDEO_PROVIDER is {})",
            config.provider
        );
    }

    let client = create_store_client(&config.storage)?;
    let transcoder = FFmpegTranscoder::new(config.packaging.ffmpeg_path.clone())
        .with_ffprobe(config.packaging.ffprobe_path.clone())
        .with_timeout(transcode_timeout(&config.packaging));
    let pipeline = PackagingPipeline::new(
        client,
        Arc::new(transcoder),
        PipelineSettings::from(&config.packaging),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling packaging");
            on_interrupt.cancel();
        }
    });

    let result = pipeline
        .package(source_key, &cancel)
        .await
        .with_context(|| format!("Failed to package {}", source_key))?;
    print_json(&result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::List { prefix } => {
            let provider = create_video_provider(&config);
            let videos = provider.list_source_videos(prefix.as_deref()).await?;
            print_json(&videos)?;
        }
        Commands::UploadUrl {
            filename,
            content_type,
        } => {
            let provider = create_video_provider(&config);
            let result = provider
                .create_source_upload_url(&CreateUploadUrlRequest {
                    filename,
                    content_type,
                })
                .await?;
            print_json(&result)?;
        }
        Commands::Package { source_key } => {
            package(&config, &source_key).await?;
        }
        Commands::Urls { video_id } => {
            let provider = create_video_provider(&config);
            print_json(&serde_json::json!({
                "video_id": video_id,
                "hls_url": provider.get_hls_url(&video_id)?,
                "poster_url": provider.get_poster_url(&video_id)?,
            }))?;
        }
        Commands::Health => {
            let health = check_connection(&config.storage).await;
            print_json(&health.to_json())?;
            if !health.is_healthy() {
                anyhow::bail!("{}", health.message());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_url_defaults_content_type() {
        let cli = Cli::try_parse_from(["clipvault", "upload-url", "clip.mp4"]).unwrap();
        match cli.command {
            Commands::UploadUrl {
                filename,
                content_type,
            } => {
                assert_eq!(filename, "clip.mp4");
                assert_eq!(content_type, "video/mp4");
            }
            _ => panic!("expected upload-url"),
        }
    }

    #[test]
    fn list_accepts_prefix() {
        let cli = Cli::try_parse_from(["clipvault", "list", "--prefix", "videos/raw"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List { prefix: Some(ref p) } if p == "videos/raw"
        ));
    }

    #[test]
    fn help_needs_no_configuration() {
        // Argument parsing touches no environment-backed settings.
        for args in [["clipvault", "--help"], ["clipvault", "help"]] {
            let err = Cli::try_parse_from(args).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn package_requires_source_key() {
        assert!(Cli::try_parse_from(["clipvault", "package"]).is_err());
    }

    #[tokio::test]
    async fn package_refuses_managed_stream() {
        let config = Config::from_lookup(|name| {
            (name == "VIDEO_PROVIDER").then(|| "stream".to_string())
        })
        .unwrap();
        let err = package(&config, "videos/raw/clip123.mp4").await.unwrap_err();
        assert!(err.to_string().contains("object storage only"));
    }
}
