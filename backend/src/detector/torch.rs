use std::sync::Mutex;

use image::DynamicImage;
use log::info;
use tch::{CModule, Device, Kind, Tensor};

use super::config::DetectorConfig;
use super::postprocess::{DecodeParams, decode_yolo};
use super::preprocess::letterbox;
use super::{Detection, DetectorError, ObjectDetector};

impl From<tch::TchError> for DetectorError {
    fn from(err: tch::TchError) -> Self {
        DetectorError::Model(err.to_string())
    }
}

/// YOLOv8 exported to TorchScript (`yolo export format=torchscript`).
pub struct TorchDetector {
    model: Mutex<CModule>,
    device: Device,
    config: DetectorConfig,
}

impl TorchDetector {
    pub fn load(config: DetectorConfig) -> Result<Self, DetectorError> {
        let device = Device::cuda_if_available();
        let mut model = CModule::load_on_device(&config.model_path, device)?;
        model.set_eval();
        info!(
            "Loaded detection model {} on {:?} ({} classes)",
            config.model_path.display(),
            device,
            config.names.len()
        );
        Ok(Self {
            model: Mutex::new(model),
            device,
            config,
        })
    }
}

impl ObjectDetector for TorchDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let boxed = letterbox(image, self.config.input_size);
        let shape: Vec<i64> = boxed.tensor.shape().iter().map(|&d| d as i64).collect();
        let data = boxed
            .tensor
            .as_slice()
            .ok_or_else(|| DetectorError::Model("input tensor is not contiguous".to_string()))?;
        let input = Tensor::from_slice(data).view(shape.as_slice()).to_device(self.device);

        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| DetectorError::Model("model lock poisoned".to_string()))?;
            tch::no_grad(|| model.forward_ts(&[input]))?
        };

        // [1, 4 + classes, anchors]
        let size = output.size();
        let (rows, anchors) = match size.as_slice() {
            [1, rows, anchors] => (*rows as usize, *anchors as usize),
            other => {
                return Err(DetectorError::UnexpectedOutput(format!(
                    "unsupported output shape {:?}",
                    other
                )));
            }
        };

        let output_flat = output
            .to_device(Device::Cpu)
            .to_kind(Kind::Float)
            .contiguous()
            .view([-1]);
        let num_elements = rows * anchors;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);

        let params = DecodeParams {
            names: &self.config.names,
            conf_threshold: self.config.conf_threshold,
            iou_threshold: self.config.iou_threshold,
        };
        decode_yolo(&output_vec, rows, anchors, &boxed, &params)
    }
}
