use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::AppError;

/// Fields required before a video row may be created. A lookup that cannot
/// produce both is an error, never a partial record.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: String,
}

/// External metadata lookup for a video link. The production implementation
/// talks to the YouTube Data API; tests substitute a canned source.
#[rocket::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, link: &str) -> Result<VideoMetadata, AppError>;
}

pub struct YouTubeMetadataSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

const YOUTUBE_VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: String,
}

impl YouTubeMetadataSource {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: YOUTUBE_VIDEOS_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[rocket::async_trait]
impl MetadataSource for YouTubeMetadataSource {
    #[instrument(skip(self))]
    async fn fetch(&self, link: &str) -> Result<VideoMetadata, AppError> {
        info!("Fetching video metadata");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("part", "snippet"), ("id", link), ("key", &self.api_key)])
            .send()
            .await?
            .error_for_status()?;

        let listing: VideoListResponse = response.json().await?;

        let item = listing.items.into_iter().next().ok_or_else(|| {
            AppError::ExternalService(format!("No metadata found for video {}", link))
        })?;

        let title = item.snippet.title;
        let thumbnail_url = item
            .snippet
            .thumbnails
            .default
            .map(|t| t.url)
            .unwrap_or_default();

        if title.is_empty() {
            return Err(AppError::ExternalService(format!(
                "Metadata for video {} is missing a title",
                link
            )));
        }
        if thumbnail_url.is_empty() {
            return Err(AppError::ExternalService(format!(
                "Metadata for video {} is missing a thumbnail",
                link
            )));
        }

        Ok(VideoMetadata {
            title,
            thumbnail_url,
        })
    }
}
