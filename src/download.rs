use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::remote::{ClipAsset, RetryPolicy};

pub const VIDEO_FILE: &str = "video.mp4";
pub const METADATA_FILE: &str = "metadata.json";

/// Sidecar written beside every downloaded clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub description: Option<String>,
    pub video_url: String,
}

impl ClipMetadata {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid metadata in {}", path.display()))
    }
}

/// Fetches the video of a clip asset into a directory
#[async_trait]
pub trait ClipFetcher: Send + Sync {
    /// Returns the path of the downloaded video file.
    async fn fetch(&self, asset: &ClipAsset, dir: &Path) -> Result<PathBuf>;
}

pub struct ClipDownloader {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl ClipDownloader {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build download client")?;
        Ok(Self { http, retry })
    }

    /// Download `asset` to `dir/video.mp4` and write `dir/metadata.json`.
    pub async fn download(&self, asset: &ClipAsset, dir: &Path) -> Result<PathBuf> {
        let url = asset
            .video_url
            .as_deref()
            .ok_or_else(|| anyhow!("Clip has no video URL"))?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let video_path = dir.join(VIDEO_FILE);
        let video = video_path.as_path();
        let bytes = self
            .retry
            .run("clip download", || async move { self.stream_to_file(url, video).await })
            .await?;

        let metadata = ClipMetadata {
            description: asset.description.clone(),
            video_url: url.to_string(),
        };
        tokio::fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)
            .await
            .with_context(|| format!("Failed to write metadata in {}", dir.display()))?;

        info!("⬇️  Downloaded {} ({} bytes)", video_path.display(), bytes);
        Ok(video_path)
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> Result<u64> {
        debug!("Downloading {}", url);
        let response = self.http.get(url).send().await?.error_for_status()?;

        let partial = path.with_extension("part");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, path)
            .await
            .with_context(|| format!("Failed to move download into {}", path.display()))?;
        Ok(written)
    }
}

#[async_trait]
impl ClipFetcher for ClipDownloader {
    async fn fetch(&self, asset: &ClipAsset, dir: &Path) -> Result<PathBuf> {
        self.download(asset, dir).await
    }
}
