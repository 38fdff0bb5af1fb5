//! Video metadata lookup for links submitted to a room.

use std::error::Error;

use futures::future::BoxFuture;
use thiserror::Error;

/// Metadata resolved for a submitted link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    /// Whether the video can be played (public and embeddable).
    pub available: bool,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid video link `{0}`")]
    InvalidLink(String),
    #[error("video `{0}` does not exist")]
    NotFound(String),
    #[error("metadata provider unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

/// Resolves an external link to its video id, title and availability.
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, link: String) -> BoxFuture<'static, Result<VideoMetadata, ResolveError>>;
}

/// Extract the video id from `youtu.be/<id>` and `...?v=<id>&...` links.
pub fn extract_video_id(link: &str) -> Result<String, ResolveError> {
    let link = link.trim();
    let raw = if let Some((_, rest)) = link.split_once("youtu.be/") {
        rest.split(['?', '&', '#', '/']).next()
    } else if let Some((_, rest)) = link.split_once("v=") {
        rest.split(['&', '#']).next()
    } else {
        None
    };

    match raw {
        Some(id)
            if !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            Ok(id.to_string())
        }
        _ => Err(ResolveError::InvalidLink(link.to_string())),
    }
}

/// Resolver that never leaves the process: the id doubles as the title.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkOnlyResolver;

impl MetadataResolver for LinkOnlyResolver {
    fn resolve(&self, link: String) -> BoxFuture<'static, Result<VideoMetadata, ResolveError>> {
        Box::pin(async move {
            let video_id = extract_video_id(&link)?;
            Ok(VideoMetadata {
                title: video_id.clone(),
                video_id,
                available: true,
            })
        })
    }
}

#[cfg(feature = "youtube-resolver")]
pub use youtube::YouTubeResolver;

#[cfg(feature = "youtube-resolver")]
mod youtube {
    use std::{env, sync::Arc};

    use futures::future::BoxFuture;
    use reqwest::{Client, StatusCode};
    use serde::Deserialize;
    use tracing::debug;

    use super::{MetadataResolver, ResolveError, VideoMetadata, extract_video_id};

    const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
    const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

    /// Resolver backed by the YouTube Data API.
    #[derive(Clone)]
    pub struct YouTubeResolver {
        client: Client,
        base_url: Arc<str>,
        api_key: Arc<str>,
    }

    #[derive(Deserialize)]
    struct VideoListResponse {
        #[serde(default)]
        items: Vec<VideoItem>,
    }

    #[derive(Deserialize)]
    struct VideoItem {
        snippet: Snippet,
        status: Option<VideoStatus>,
    }

    #[derive(Deserialize)]
    struct Snippet {
        title: String,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VideoStatus {
        #[serde(default = "default_true")]
        embeddable: bool,
        #[serde(default)]
        privacy_status: Option<String>,
    }

    fn default_true() -> bool {
        true
    }

    fn unavailable(message: &str, source: reqwest::Error) -> ResolveError {
        ResolveError::Unavailable {
            message: message.to_string(),
            source: Some(Box::new(source)),
        }
    }

    impl YouTubeResolver {
        /// Build a resolver talking to `base_url` with the given API key.
        pub fn new(base_url: &str, api_key: &str) -> Result<Self, ResolveError> {
            let client = Client::builder()
                .build()
                .map_err(|source| unavailable("failed to build HTTP client", source))?;
            Ok(Self {
                client,
                base_url: Arc::from(base_url.trim_end_matches('/')),
                api_key: Arc::from(api_key),
            })
        }

        /// Build a resolver from `YOUTUBE_API_KEY`; `None` when the variable is unset or empty.
        pub fn from_env() -> Option<Result<Self, ResolveError>> {
            env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .map(|key| Self::new(API_BASE_URL, key.trim()))
        }

        async fn fetch(&self, video_id: String) -> Result<VideoMetadata, ResolveError> {
            let url = format!("{}/videos", self.base_url);
            let response = self
                .client
                .get(url)
                .query(&[
                    ("part", "snippet,status"),
                    ("id", video_id.as_str()),
                    ("key", self.api_key.as_ref()),
                ])
                .send()
                .await
                .map_err(|source| unavailable("failed to reach the YouTube API", source))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(ResolveError::NotFound(video_id));
            }
            if !status.is_success() {
                return Err(ResolveError::Unavailable {
                    message: format!("YouTube API answered with status {status}"),
                    source: None,
                });
            }

            let body = response
                .json::<VideoListResponse>()
                .await
                .map_err(|source| unavailable("failed to decode YouTube API response", source))?;
            let Some(item) = body.items.into_iter().next() else {
                return Err(ResolveError::NotFound(video_id));
            };

            let available = item.status.is_none_or(|status| {
                status.embeddable && status.privacy_status.as_deref() != Some("private")
            });
            debug!(video_id = %video_id, available, "resolved video metadata");
            Ok(VideoMetadata {
                video_id,
                title: item.snippet.title,
                available,
            })
        }
    }

    impl MetadataResolver for YouTubeResolver {
        fn resolve(&self, link: String) -> BoxFuture<'static, Result<VideoMetadata, ResolveError>> {
            let resolver = self.clone();
            Box::pin(async move {
                let video_id = extract_video_id(&link)?;
                resolver.fetch(video_id).await
            })
        }
    }
}
