use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use ndarray::Array4;

use crate::error::Result;

/// Side length of the square network input.
pub const INPUT_SIZE: u32 = 128;

/// Network input: `[batch, channel, height, width]` = `[1, 1, 128, 128]`, values in [0, 1].
pub type Tensor = Array4<f32>;

/// Decode raw image bytes and normalize them into the network input tensor.
pub fn normalize(bytes: &[u8]) -> Result<Tensor> {
    let img = image::load_from_memory(bytes)?;
    Ok(normalize_image(&img))
}

/// Grayscale, stretch to 128x128 and scale to [0, 1].
///
/// Conversion to luminance happens before resampling and the aspect ratio is
/// not kept: stored gallery embeddings were produced this way. Resampling is
/// bicubic with a = -0.5 (Catmull-Rom), the kernel PIL applies to "L" images.
pub fn normalize_image(img: &DynamicImage) -> Tensor {
    let gray = luminance(img);
    let resized =
        image::imageops::resize(&gray, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let size = INPUT_SIZE as usize;
    Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
        resized.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
    })
}

/// ITU-R 601-2 luma in 16-bit fixed point; alpha is discarded.
pub fn luminance(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Zero-filled tensor of the input shape.
pub fn blank() -> Tensor {
    let size = INPUT_SIZE as usize;
    Array4::zeros((1, 1, size, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_constant_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 90, Luma([255])));
        let t = normalize_image(&img);
        assert_eq!(t.shape(), &[1, 1, 128, 128]);
        assert!(t.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_luminance_matches_601() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        assert_eq!(luminance(&img).get_pixel(0, 0)[0], 76);

        let gray = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([93, 93, 93])));
        assert_eq!(luminance(&gray).get_pixel(0, 0)[0], 93);
    }

    #[test]
    fn test_resize_is_bicubic() {
        // bicubic rings on both sides of a hard edge, bilinear would not
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(256, 256, |x, _| {
            Luma([if x < 128 { 100 } else { 200 }])
        }));
        let t = normalize_image(&img);
        let row: Vec<u8> = (60..68)
            .map(|x| (t[[0, 0, 40, x]] * 255.0).round() as u8)
            .collect();
        assert_eq!(row, vec![100, 100, 99, 107, 193, 201, 200, 200]);
    }

    #[test]
    fn test_garbage_bytes() {
        let err = normalize(b"definitely not an image").unwrap_err();
        assert!(err.is_decode());
    }
}
