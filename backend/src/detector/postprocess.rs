use std::cmp::Ordering;

use super::preprocess::Letterbox;
use super::{BoundingBox, Detection, DetectorError};

pub struct DecodeParams<'a> {
    pub names: &'a [String],
    pub conf_threshold: f32,
    pub iou_threshold: f32,
}

/// Decodes a YOLOv8 detection head laid out as `[4 + num_classes, num_anchors]`
/// (row-major): the first four rows are `cx, cy, w, h` in model-input pixels,
/// the rest are per-class scores.
///
/// Returns detections in source-image coordinates, after non-maximum
/// suppression, highest confidence first.
pub fn decode_yolo(
    output: &[f32],
    rows: usize,
    anchors: usize,
    letterbox: &Letterbox,
    params: &DecodeParams<'_>,
) -> Result<Vec<Detection>, DetectorError> {
    if rows <= 4 {
        return Err(DetectorError::UnexpectedOutput(format!(
            "expected more than 4 rows, got {}",
            rows
        )));
    }
    if output.len() != rows * anchors {
        return Err(DetectorError::UnexpectedOutput(format!(
            "expected {} values for [{}, {}], got {}",
            rows * anchors,
            rows,
            anchors,
            output.len()
        )));
    }

    let num_classes = rows - 4;
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class in 0..num_classes {
            let score = output[(4 + class) * anchors + i];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        if best_score < params.conf_threshold {
            continue;
        }
        let Some(label) = params.names.get(best_class).filter(|n| !n.is_empty()) else {
            continue;
        };

        let cx = output[i];
        let cy = output[anchors + i];
        let w = output[2 * anchors + i];
        let h = output[3 * anchors + i];

        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        candidates.push(Detection {
            label: label.clone(),
            class_id: best_class,
            confidence: best_score,
            bbox: Some(BoundingBox { x1, y1, x2, y2 }),
        });
    }

    Ok(non_max_suppression(candidates, params.iou_threshold))
}

/// Class-agnostic NMS. Output is sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| match (&kept.bbox, &candidate.bbox) {
            (Some(a), Some(b)) => a.iou(b) > iou_threshold,
            _ => false,
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}
