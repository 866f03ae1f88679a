use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use shared::VideoTopic;
use url::Url;

use super::{MAX_RESULTS, VideoLink, VideoSearch};

const VIDEO_KIND: &str = "youtube#video";

#[derive(Debug, thiserror::Error)]
pub enum YouTubeError {
    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    #[serde(default)]
    kind: String,
    video_id: Option<String>,
}

/// Client for the YouTube Data API `search.list` endpoint.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl YouTubeClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, YouTubeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn search_url(&self, query: &str, api_key: &str) -> Result<Url, YouTubeError> {
        let max_results = MAX_RESULTS.to_string();
        let url = Url::parse_with_params(
            &self.api_url,
            &[
                ("q", query),
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ],
        )?;
        Ok(url)
    }

    async fn fetch(&self, query: &str, api_key: &str) -> Result<Vec<VideoLink>, YouTubeError> {
        let url = self.search_url(query, api_key)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(YouTubeError::Status(status));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .filter(|item| item.id.kind == VIDEO_KIND)
            .filter_map(|item| item.id.video_id)
            .map(|id| VideoLink::youtube(&id))
            .take(MAX_RESULTS)
            .collect())
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, topic: &str, kind: VideoTopic) -> Vec<VideoLink> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No YouTube API key configured, skipping {} search", kind);
            return Vec::new();
        };

        let query = format!("{} {}", topic, kind);
        match self.fetch(&query, api_key).await {
            Ok(links) => {
                debug!("YouTube search '{}' returned {} videos", query, links.len());
                links
            }
            Err(e) => {
                warn!("YouTube search '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PATH: &str = "/youtube/v3/search";

    fn client_for(server: &MockServer, key: Option<&str>) -> YouTubeClient {
        YouTubeClient::new(
            format!("{}{}", server.uri(), SEARCH_PATH),
            key.map(str::to_string),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn item(kind: &str, id_field: &str, id: &str) -> serde_json::Value {
        json!({ "kind": "youtube#searchResult", "id": { "kind": kind, id_field: id } })
    }

    #[actix_web::test]
    async fn extracts_watch_urls_for_videos_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("q", "cat tutorial"))
            .and(query_param("maxResults", "3"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    item("youtube#video", "videoId", "abc123"),
                    item("youtube#channel", "channelId", "UCxyz"),
                    item("youtube#video", "videoId", "def456"),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let links = client_for(&server, Some("test-key"))
            .search("cat", VideoTopic::Tutorial)
            .await;

        let urls: Vec<&str> = links.iter().map(VideoLink::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=abc123",
                "https://www.youtube.com/watch?v=def456",
            ]
        );
    }

    #[actix_web::test]
    async fn caps_results_at_three() {
        let server = MockServer::start().await;
        let items: Vec<_> = (0..5)
            .map(|i| item("youtube#video", "videoId", &format!("v{}", i)))
            .collect();
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
            .mount(&server)
            .await;

        let links = client_for(&server, Some("k"))
            .search("pizza", VideoTopic::Recipe)
            .await;
        assert_eq!(links.len(), MAX_RESULTS);
    }

    #[actix_web::test]
    async fn forbidden_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "quotaExceeded" }
            })))
            .mount(&server)
            .await;

        let links = client_for(&server, Some("k"))
            .search("cat", VideoTopic::Recipe)
            .await;
        assert!(links.is_empty());
    }

    #[actix_web::test]
    async fn malformed_body_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let links = client_for(&server, Some("k"))
            .search("cat", VideoTopic::Tutorial)
            .await;
        assert!(links.is_empty());
    }

    #[actix_web::test]
    async fn missing_key_skips_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(!client.has_api_key());
        assert!(client.search("cat", VideoTopic::Tutorial).await.is_empty());
    }
}
