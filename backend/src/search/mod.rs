pub mod youtube;

use async_trait::async_trait;
use serde::Serialize;
use shared::VideoTopic;

pub const MAX_RESULTS: usize = 3;

/// Watch URL of an externally hosted video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VideoLink(String);

impl VideoLink {
    pub fn youtube(video_id: &str) -> Self {
        Self(format!("https://www.youtube.com/watch?v={}", video_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Searches for videos about `topic`. Implementations absorb every failure
/// and return an empty list instead.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, topic: &str, kind: VideoTopic) -> Vec<VideoLink>;
}
