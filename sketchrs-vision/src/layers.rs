//! Forward-only building blocks operating on `[channel, height, width]` maps.
//!
//! Weight layouts follow PyTorch: `Conv2d` is `[out, in, kh, kw]`,
//! `ConvTranspose2d` is `[in, out, kh, kw]` and `Linear` is `[out, in]`.

use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, Axis};

use crate::error::Result;

/// Stride-1 square-kernel convolution with zero padding, via im2col + GEMM.
pub fn conv2d(
    input: &Array3<f32>,
    weight: &Array4<f32>,
    bias: &Array1<f32>,
    padding: usize,
) -> Result<Array3<f32>> {
    let (c_in, h, w) = input.dim();
    let (c_out, w_in, k, _) = weight.dim();
    debug_assert_eq!(c_in, w_in);

    let h_out = h + 2 * padding + 1 - k;
    let w_out = w + 2 * padding + 1 - k;

    let mut cols = Array2::<f32>::zeros((c_in * k * k, h_out * w_out));
    for c in 0..c_in {
        for ky in 0..k {
            for kx in 0..k {
                let row = (c * k + ky) * k + kx;
                for oy in 0..h_out {
                    let iy = (oy + ky) as isize - padding as isize;
                    if iy < 0 || iy >= h as isize {
                        continue;
                    }
                    for ox in 0..w_out {
                        let ix = (ox + kx) as isize - padding as isize;
                        if ix < 0 || ix >= w as isize {
                            continue;
                        }
                        cols[[row, oy * w_out + ox]] = input[[c, iy as usize, ix as usize]];
                    }
                }
            }
        }
    }

    let kernel = weight.to_shape((c_out, c_in * k * k))?;
    let out = kernel.dot(&cols) + &bias.view().insert_axis(Axis(1));
    Ok(out.into_shape_with_order((c_out, h_out, w_out))?)
}

/// Transposed convolution (a.k.a. fractionally strided convolution).
///
/// Output side is `(n - 1) * stride - 2 * padding + k + output_padding`.
pub fn conv_transpose2d(
    input: &Array3<f32>,
    weight: &Array4<f32>,
    bias: &Array1<f32>,
    stride: usize,
    padding: usize,
    output_padding: usize,
) -> Result<Array3<f32>> {
    let (c_in, h, w) = input.dim();
    let (w_in, c_out, k, _) = weight.dim();
    debug_assert_eq!(c_in, w_in);

    let h_out = (h - 1) * stride + k + output_padding - 2 * padding;
    let w_out = (w - 1) * stride + k + output_padding - 2 * padding;

    let kernel = weight.to_shape((c_in, c_out * k * k))?;
    let x = input.to_shape((c_in, h * w))?;
    // [c_out * k * k, h * w]: every input pixel's contribution to each kernel tap
    let cols = kernel.t().dot(&x);

    let mut out = Array3::<f32>::zeros((c_out, h_out, w_out));
    for oc in 0..c_out {
        for ky in 0..k {
            for kx in 0..k {
                let row = (oc * k + ky) * k + kx;
                for iy in 0..h {
                    let oy = (iy * stride + ky) as isize - padding as isize;
                    if oy < 0 || oy >= h_out as isize {
                        continue;
                    }
                    for ix in 0..w {
                        let ox = (ix * stride + kx) as isize - padding as isize;
                        if ox < 0 || ox >= w_out as isize {
                            continue;
                        }
                        out[[oc, oy as usize, ox as usize]] += cols[[row, iy * w + ix]];
                    }
                }
            }
        }
    }

    for (mut plane, &b) in out.outer_iter_mut().zip(bias.iter()) {
        plane.mapv_inplace(|v| v + b);
    }
    Ok(out)
}

/// Non-overlapping max pooling with a square window; trailing rows/cols are dropped.
pub fn max_pool2d(input: &Array3<f32>, size: usize) -> Array3<f32> {
    let (c, h, w) = input.dim();
    Array3::from_shape_fn((c, h / size, w / size), |(ch, y, x)| {
        let mut best = f32::NEG_INFINITY;
        for dy in 0..size {
            for dx in 0..size {
                best = best.max(input[[ch, y * size + dy, x * size + dx]]);
            }
        }
        best
    })
}

pub fn linear(input: ArrayView1<f32>, weight: &Array2<f32>, bias: &Array1<f32>) -> Array1<f32> {
    weight.dot(&input) + bias
}

pub fn relu_inplace(x: &mut Array3<f32>) {
    x.mapv_inplace(|v| v.max(0.0));
}

pub fn sigmoid_inplace(x: &mut Array3<f32>) {
    x.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
}
