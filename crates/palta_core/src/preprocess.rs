use crate::error::ImageError;
use image::{DynamicImage, RgbImage, imageops::FilterType};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, height, width, 3]`, the layout of Keras exports.
    #[default]
    Nhwc,
    /// `[1, 3, height, width]`.
    Nchw,
}

/// Decode raw upload bytes into an image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Resize to `size`×`size` and scale channels to [0,1].
pub fn to_input_tensor(img: &DynamicImage, size: u32, layout: TensorLayout) -> Array4<f32> {
    let resized = resize_to_square(img, size);
    let side = size as usize;
    let mut array = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, side, side, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, side, side)),
    };
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (y, x) = (y as usize, x as usize);
        for (c, &value) in pixel.0.iter().enumerate() {
            let v = scale_channel(value);
            match layout {
                TensorLayout::Nhwc => array[[0, y, x, c]] = v,
                TensorLayout::Nchw => array[[0, c, y, x]] = v,
            }
        }
    }
    array
}

/// Decode and normalize in one step.
pub fn prepare_input(
    bytes: &[u8],
    size: u32,
    layout: TensorLayout,
) -> Result<Array4<f32>, ImageError> {
    let img = decode_image(bytes)?;
    Ok(to_input_tensor(&img, size, layout))
}

fn resize_to_square(img: &DynamicImage, size: u32) -> RgbImage {
    img.resize_exact(size, size, FilterType::Nearest).to_rgb8()
}

fn scale_channel(value: u8) -> f32 {
    value as f32 / 255.0
}
