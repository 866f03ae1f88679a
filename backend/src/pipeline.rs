use std::sync::Arc;

use actix_web::web;
use log::info;
use shared::{NO_TUTORIAL_VIDEO, UploadResponse, VideoTopic};

use crate::detector::{ObjectDetector, first_detection};
use crate::error::PipelineError;
use crate::search::{VideoLink, VideoSearch};
use crate::storage::local_store::LocalStore;

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub class_name: String,
    pub image_url: String,
    /// Watch URL, or [`NO_TUTORIAL_VIDEO`] when the search came back empty.
    pub tutorial_video: String,
    pub recipe_videos: Vec<VideoLink>,
}

impl From<UploadResult> for UploadResponse {
    fn from(result: UploadResult) -> Self {
        UploadResponse {
            class_name: result.class_name,
            image_url: result.image_url,
            youtube_tutorial_video: result.tutorial_video,
            recipe_video_links: result
                .recipe_videos
                .into_iter()
                .map(VideoLink::into_string)
                .collect(),
        }
    }
}

/// Store, detect, then look up tutorial and recipe videos for the detected
/// class.
#[derive(Clone)]
pub struct UploadPipeline {
    store: Arc<LocalStore>,
    detector: Arc<dyn ObjectDetector>,
    videos: Arc<dyn VideoSearch>,
}

impl UploadPipeline {
    pub fn new(
        store: Arc<LocalStore>,
        detector: Arc<dyn ObjectDetector>,
        videos: Arc<dyn VideoSearch>,
    ) -> Self {
        Self {
            store,
            detector,
            videos,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// The stored file is kept even when a later step fails.
    pub async fn handle(&self, upload: Option<UploadedImage>) -> Result<UploadResult, PipelineError> {
        let upload = upload.ok_or(PipelineError::NoFileUploaded)?;
        let stored = self.store.save(&upload.filename, &upload.data).await?;

        let detector = self.detector.clone();
        let data = upload.data;
        let detection = web::block(move || first_detection(detector.as_ref(), &data))
            .await?
            .ok_or(PipelineError::NoObjectsDetected)?;
        info!(
            "Detected '{}' ({:.2}) in {}",
            detection.label, detection.confidence, stored.filename
        );

        let class_name = detection.label;
        let (tutorials, mut recipes) = futures::join!(
            self.videos.search(&class_name, VideoTopic::Tutorial),
            self.videos.search(&class_name, VideoTopic::Recipe),
        );
        recipes.truncate(crate::search::MAX_RESULTS);

        let tutorial_video = tutorials
            .into_iter()
            .next()
            .map(VideoLink::into_string)
            .unwrap_or_else(|| NO_TUTORIAL_VIDEO.to_string());

        Ok(UploadResult {
            class_name,
            image_url: stored.url(),
            tutorial_video,
            recipe_videos: recipes,
        })
    }
}
