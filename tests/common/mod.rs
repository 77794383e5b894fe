#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array1, Array4, Axis};
use sketchrs::{Embedding, EmbeddingModel, Pipeline};
use sketchrs_vision::{normalize::Tensor, VisionError};

/// Cheap stand-in for the network: one value per image row (row means).
#[derive(Default)]
pub struct RowMeanModel {
    pub calls: AtomicUsize,
}

impl EmbeddingModel for RowMeanModel {
    fn encode(&self, input: &Tensor) -> Result<Embedding, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let plane = input.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned();
        let means: Array1<f32> = plane
            .mean_axis(Axis(1))
            .ok_or_else(|| VisionError::Inference("empty input".into()))?;
        Ok(Embedding { vector: means })
    }

    fn forward(&self, input: &Tensor) -> Result<(Embedding, Array4<f32>), VisionError> {
        Ok((self.encode(input)?, input.clone()))
    }
}

pub fn pipeline() -> Pipeline {
    Pipeline::new(Box::new(RowMeanModel::default()))
}

pub fn png(img: image::DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Uniform gray image.
pub fn gray_png(level: u8) -> Vec<u8> {
    png(image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
        50,
        40,
        image::Luma([level]),
    )))
}
