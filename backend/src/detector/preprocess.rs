use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

const PAD_VALUE: u8 = 114;

/// Model input plus the transform needed to map boxes back onto the source
/// image.
#[derive(Debug)]
pub struct Letterbox {
    pub tensor: Array4<f32>,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    /// Maps a point from model-input space to source-image pixels, clamped to
    /// the image bounds.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = ((x - self.pad_x) / self.scale).clamp(0.0, self.source_width as f32);
        let sy = ((y - self.pad_y) / self.scale).clamp(0.0, self.source_height as f32);
        (sx, sy)
    }
}

/// Resizes `image` into a `size`x`size` square keeping its aspect ratio, pads
/// the remainder with gray and lays the pixels out as a `[1, 3, size, size]`
/// RGB tensor scaled to `[0, 1]`.
pub fn letterbox(image: &DynamicImage, size: u32) -> Letterbox {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = image
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8();

    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }

    Letterbox {
        tensor,
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        source_width: width,
        source_height: height,
    }
}
