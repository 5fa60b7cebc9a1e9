//! RGB to bi-planar YCbCr 4:2:0 conversion for replayed frames.

use image::RgbImage;
use roomscan_data::{ColorImage, FrameError};

/// Convert an RGB image into the bi-planar YCbCr 4:2:0 layout the texture
/// pipeline consumes. Chroma is averaged over each 2x2 block (BT.601).
pub fn color_image_from_rgb(rgb: &RgbImage) -> Result<ColorImage, FrameError> {
    let (width, height) = rgb.dimensions();
    if width % 2 != 0 || height % 2 != 0 {
        return Err(FrameError::OddDimensions { width, height });
    }

    let mut luma = Vec::with_capacity((width * height) as usize);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        luma.push(y.round().clamp(0.0, 255.0) as u8);
    }

    let mut chroma = Vec::with_capacity((width / 2 * (height / 2) * 2) as usize);
    for by in 0..height / 2 {
        for bx in 0..width / 2 {
            let (mut r_sum, mut g_sum, mut b_sum) = (0.0f32, 0.0f32, 0.0f32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let [r, g, b] = rgb.get_pixel(bx * 2 + dx, by * 2 + dy).0;
                r_sum += r as f32;
                g_sum += g as f32;
                b_sum += b as f32;
            }
            let (r, g, b) = (r_sum / 4.0, g_sum / 4.0, b_sum / 4.0);
            let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
            let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
            chroma.push(cb.round().clamp(0.0, 255.0) as u8);
            chroma.push(cr.round().clamp(0.0, 255.0) as u8);
        }
    }

    ColorImage::new(width, height, luma, chroma)
}
