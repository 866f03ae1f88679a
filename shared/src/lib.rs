use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Body of a successful `POST /upload`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadResponse {
    pub class_name: String,
    pub image_url: String,
    pub youtube_tutorial_video: String,
    pub recipe_video_links: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Suffix appended to the detected class when searching for videos.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoTopic {
    Tutorial,
    Recipe,
}

pub const NO_TUTORIAL_VIDEO: &str = "No tutorial video found";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn video_topic_renders_as_query_suffix() {
        assert_eq!(VideoTopic::Tutorial.to_string(), "tutorial");
        assert_eq!(VideoTopic::Recipe.as_ref(), "recipe");
        assert_eq!(VideoTopic::from_str("recipe").unwrap(), VideoTopic::Recipe);
    }

    #[test]
    fn upload_response_uses_wire_field_names() {
        let body = UploadResponse {
            class_name: "cat".into(),
            image_url: "/uploads/cat.jpg".into(),
            youtube_tutorial_video: NO_TUTORIAL_VIDEO.into(),
            recipe_video_links: vec![],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["class_name"], "cat");
        assert_eq!(json["youtube_tutorial_video"], "No tutorial video found");
        assert!(json["recipe_video_links"].as_array().unwrap().is_empty());
    }
}
