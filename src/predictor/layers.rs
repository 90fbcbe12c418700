//! Inference-only building blocks of the weight predictor network.
//!
//! Feature maps are `(channels, height, width)` arrays of a single sample. Weight layouts follow
//! the usual convention of deep learning frameworks so that trained parameters can be copied in
//! without transposition: convolution weights are `(out, in, 3, 3)`, linear weights `(out, in)`.

use crate::error::{shape, Result};
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView1, ArrayView3, Axis, Zip};
use rand::Rng;

/// 3×3 convolution with zero padding of one pixel and unit stride.
#[derive(Clone, Debug)]
pub struct Conv2d {
    pub weight: Array4<f64>,
    pub bias: Array1<f64>,
}

impl Conv2d {
    /// Uniform fan-in initialization, `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` for weights and bias.
    pub fn init<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize) -> Self {
        let bound = 1.0 / ((in_channels * 9) as f64).sqrt();
        Conv2d {
            weight: Array4::from_shape_simple_fn((out_channels, in_channels, 3, 3), || {
                rng.random_range(-bound..bound)
            }),
            bias: Array1::from_shape_simple_fn(out_channels, || rng.random_range(-bound..bound)),
        }
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn forward(&self, input: ArrayView3<f64>) -> Result<Array3<f64>> {
        let (channels, rows, cols) = input.dim();
        let (out_c, in_c, kh, kw) = self.weight.dim();
        if channels != in_c || (kh, kw) != (3, 3) || self.bias.len() != out_c {
            return Err(shape(format!(
                "conv weight {:?} / bias {} incompatible with input of {} channels",
                self.weight.dim(),
                self.bias.len(),
                channels
            )));
        }
        let mut padded = Array3::<f64>::zeros((channels, rows + 2, cols + 2));
        padded.slice_mut(s![.., 1..rows + 1, 1..cols + 1]).assign(&input);

        let mut out = Array3::<f64>::zeros((out_c, rows, cols));
        for (o, mut plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            plane.fill(self.bias[o]);
            for c in 0..in_c {
                for di in 0..3 {
                    for dj in 0..3 {
                        let w = self.weight[(o, c, di, dj)];
                        if w == 0.0 {
                            continue;
                        }
                        let window = padded.slice(s![c, di..di + rows, dj..dj + cols]);
                        plane.scaled_add(w, &window);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Batch normalization in inference form, using running statistics.
#[derive(Clone, Debug)]
pub struct BatchNorm2d {
    pub gamma: Array1<f64>,
    pub beta: Array1<f64>,
    pub running_mean: Array1<f64>,
    pub running_var: Array1<f64>,
    pub eps: f64,
}

impl BatchNorm2d {
    /// Freshly initialized statistics: unit scale, zero shift, zero mean, unit variance.
    pub fn identity(channels: usize) -> Self {
        BatchNorm2d {
            gamma: Array1::ones(channels),
            beta: Array1::zeros(channels),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            eps: 1e-5,
        }
    }

    pub fn forward_inplace(&self, x: &mut Array3<f64>) -> Result<()> {
        let channels = x.dim().0;
        if [
            self.gamma.len(),
            self.beta.len(),
            self.running_mean.len(),
            self.running_var.len(),
        ]
        .iter()
        .any(|&n| n != channels)
        {
            return Err(shape(format!(
                "batch norm parameters do not match {} channels",
                channels
            )));
        }
        for (c, mut plane) in x.axis_iter_mut(Axis(0)).enumerate() {
            let scale = self.gamma[c] / (self.running_var[c] + self.eps).sqrt();
            let shift = self.beta[c] - self.running_mean[c] * scale;
            plane.mapv_inplace(|v| v * scale + shift);
        }
        Ok(())
    }
}

/// Fully connected layer.
#[derive(Clone, Debug)]
pub struct Linear {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Linear {
    pub fn init<R: Rng>(rng: &mut R, in_features: usize, out_features: usize) -> Self {
        let bound = 1.0 / (in_features as f64).sqrt();
        Linear {
            weight: Array2::from_shape_simple_fn((out_features, in_features), || {
                rng.random_range(-bound..bound)
            }),
            bias: Array1::from_shape_simple_fn(out_features, || rng.random_range(-bound..bound)),
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_features(&self) -> usize {
        self.weight.dim().0
    }

    pub fn forward(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        if x.len() != self.in_features() || self.bias.len() != self.out_features() {
            return Err(shape(format!(
                "linear layer {:?} cannot take {} features",
                self.weight.dim(),
                x.len()
            )));
        }
        Ok(self.weight.dot(&x) + &self.bias)
    }
}

pub fn relu_inplace<D: ndarray::Dimension>(x: &mut ndarray::Array<f64, D>) {
    x.mapv_inplace(|v| v.max(0.0));
}

/// `ln(1 + e^x)`, evaluated without overflow.
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// 2×2 max pooling with stride 2; a trailing odd row or column is dropped.
pub fn max_pool2(x: ArrayView3<f64>) -> Array3<f64> {
    let (channels, rows, cols) = x.dim();
    let mut out = Array3::<f64>::from_elem((channels, rows / 2, cols / 2), f64::NEG_INFINITY);
    Zip::indexed(&mut out).for_each(|(c, i, j), v| {
        for di in 0..2 {
            for dj in 0..2 {
                *v = v.max(x[(c, 2 * i + di, 2 * j + dj)]);
            }
        }
    });
    out
}

/// `Conv → BatchNorm → ReLU`.
#[derive(Clone, Debug)]
pub struct ConvBnRelu {
    pub conv: Conv2d,
    pub norm: BatchNorm2d,
}

impl ConvBnRelu {
    pub fn init<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize) -> Self {
        ConvBnRelu {
            conv: Conv2d::init(rng, in_channels, out_channels),
            norm: BatchNorm2d::identity(out_channels),
        }
    }

    pub fn forward(&self, x: ArrayView3<f64>) -> Result<Array3<f64>> {
        let mut y = self.conv.forward(x)?;
        self.norm.forward_inplace(&mut y)?;
        relu_inplace(&mut y);
        Ok(y)
    }
}

/// Downscaling block: 2×2 max pooling followed by two `ConvBnRelu` stages.
#[derive(Clone, Debug)]
pub struct Down {
    pub first: ConvBnRelu,
    pub second: ConvBnRelu,
}

impl Down {
    pub fn init<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize) -> Self {
        Down {
            first: ConvBnRelu::init(rng, in_channels, out_channels),
            second: ConvBnRelu::init(rng, out_channels, out_channels),
        }
    }

    pub fn out_channels(&self) -> usize {
        self.second.conv.out_channels()
    }

    pub fn forward(&self, x: ArrayView3<f64>) -> Result<Array3<f64>> {
        let pooled = max_pool2(x);
        let y = self.first.forward(pooled.view())?;
        self.second.forward(y.view())
    }
}
