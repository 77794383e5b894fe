#![allow(dead_code)]

use ndarray::{ArrayD, IxDyn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sketchrs_vision::{network::PARAMETERS, StateDict};

/// Full parameter set with small uniform random values.
pub fn random_state_dict(seed: u64) -> StateDict {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dict = StateDict::new();
    for (name, shape) in PARAMETERS {
        // keep activations well inside f32 range for the 65536-wide dense layers
        let scale = if name.starts_with("fc") { 0.01 } else { 0.2 };
        let len: usize = shape.iter().product();
        let data: Vec<f32> = (0..len).map(|_| rng.gen_range(-scale..scale)).collect();
        dict.insert(name, ArrayD::from_shape_vec(IxDyn(shape), data).unwrap());
    }
    dict
}

pub fn png_bytes(img: &image::DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Deterministic colour gradient, different per seed.
pub fn gradient_image(width: u32, height: u32, seed: u8) -> image::DynamicImage {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8 ^ seed,
            (y * 255 / height.max(1)) as u8,
            seed.wrapping_mul(37),
        ])
    });
    image::DynamicImage::ImageRgb8(img)
}
