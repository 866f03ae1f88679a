pub mod config;
pub mod postprocess;
pub mod preprocess;
#[cfg(feature = "torch")]
pub mod torch;

use image::DynamicImage;
use log::{debug, warn};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("Model error: {0}")]
    Model(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = BoundingBox {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        }
        .area();
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
}

/// A pre-trained detection model. Loaded once at startup and shared read-only
/// by every request.
pub trait ObjectDetector: Send + Sync {
    /// Detections ordered by descending confidence.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Runs `detector` on raw image bytes and keeps only the top detection.
///
/// Never fails: undecodable images and model errors are logged and reported
/// as "nothing detected".
pub fn first_detection(detector: &dyn ObjectDetector, image_data: &[u8]) -> Option<Detection> {
    let image = match image::load_from_memory(image_data) {
        Ok(image) => image,
        Err(e) => {
            warn!("Uploaded file is not a decodable image: {}", e);
            return None;
        }
    };

    match detector.detect(&image) {
        Ok(detections) => {
            debug!("Detector returned {} objects", detections.len());
            detections.into_iter().next()
        }
        Err(e) => {
            warn!("Detection failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Returns a fixed detection list regardless of the input image.
    pub struct FixedDetector(pub Vec<Detection>);

    impl FixedDetector {
        pub fn labels(labels: &[&str]) -> Self {
            Self(
                labels
                    .iter()
                    .enumerate()
                    .map(|(i, label)| Detection {
                        label: label.to_string(),
                        class_id: i,
                        confidence: 0.9 - i as f32 * 0.1,
                        bbox: None,
                    })
                    .collect(),
            )
        }
    }

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    pub struct FailingDetector;

    impl ObjectDetector for FailingDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
            Err(DetectorError::Model("boom".to_string()))
        }
    }

    /// A tiny valid PNG.
    pub fn png_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn first_detection_takes_top_result() {
        let detector = FixedDetector::labels(&["cat", "dog"]);
        let detection = first_detection(&detector, &png_bytes()).unwrap();
        assert_eq!(detection.label, "cat");
    }

    #[test]
    fn no_boxes_means_no_detection() {
        let detector = FixedDetector(vec![]);
        assert!(first_detection(&detector, &png_bytes()).is_none());
    }

    #[test]
    fn undecodable_bytes_mean_no_detection() {
        let detector = FixedDetector::labels(&["cat"]);
        assert!(first_detection(&detector, b"definitely not an image").is_none());
    }

    #[test]
    fn model_errors_mean_no_detection() {
        assert!(first_detection(&FailingDetector, &png_bytes()).is_none());
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 };
        let b = BoundingBox { x1: 20.0, y1: 20.0, x2: 30.0, y2: 30.0 };
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }
}
