use crate::denoisers::denoiser::*;
use crate::denoisers::gaussian::reflect;
use denoiser_macros::register_denoiser;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Zip};

/// B3-spline smoothing taps of the à-trous transform.
const B3_SPLINE: [f64; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Standard deviation of unit white Gaussian noise in the B3 à-trous detail layers.
const B3_NOISE_RESPONSE: [f64; 6] = [0.8908, 0.2007, 0.0856, 0.0413, 0.0205, 0.0103];

/// Scale of the median absolute deviation for Gaussian noise.
const MAD_TO_SIGMA: f64 = 0.6745;

/// Soft-thresholds the detail layers of an undecimated B3-spline wavelet transform.
///
/// The noise level is estimated from the finest layer with the median absolute deviation and
/// propagated to the coarser layers with the transform's white-noise response. Every layer is
/// shrunk with the universal threshold `sigma_s * sqrt(2 ln n)` scaled by `strength`.
///
/// # Fields
/// - `levels`: Number of detail layers.
/// - `strength`: Multiplier on the universal threshold, `0.0` reconstructs the input exactly.
#[register_denoiser]
#[derive(Clone, Debug)]
pub struct WaveletDenoiser {
    pub levels: usize,
    pub strength: f64,
}

impl Denoiser for WaveletDenoiser {
    fn new() -> Self {
        WaveletDenoiser {
            levels: 4,
            strength: 1.0,
        }
    }

    fn config(&self) -> DenoiserConfig {
        DenoiserConfig {
            name: "wavelet".to_string(),
            description: "À-trous B3-spline soft thresholding with a MAD noise estimate."
                .to_string(),
        }
    }

    fn denoise(&self, batch: ArrayView3<f64>) -> Array3<f64> {
        map_images(batch, |image| self.denoise_image(image))
    }
}

impl WaveletDenoiser {
    fn denoise_image(&self, image: ArrayView2<f64>) -> Array2<f64> {
        if image.is_empty() {
            return image.to_owned();
        }
        let levels = self.levels.min(max_levels(image.dim()));
        let (mut details, residual) = decompose(image, levels);

        let sigma = details
            .first()
            .map(|finest| median_abs(finest) / MAD_TO_SIGMA / B3_NOISE_RESPONSE[0])
            .unwrap_or(0.0);
        let universal = (2.0 * (image.len() as f64).ln()).sqrt();

        let mut out = residual;
        for (level, detail) in details.iter_mut().enumerate() {
            let threshold = self.strength * sigma * noise_response(level) * universal;
            detail.mapv_inplace(|c| soft_threshold(c, threshold));
            out += &*detail;
        }
        out
    }
}

/// Number of levels until the hole spacing reaches the larger image extent.
fn max_levels((rows, cols): (usize, usize)) -> usize {
    (usize::BITS - rows.max(cols).leading_zeros()) as usize
}

/// Splits `image` into `levels` detail layers and the final smooth residual.
///
/// The image equals the residual plus the sum of all details.
fn decompose(image: ArrayView2<f64>, levels: usize) -> (Vec<Array2<f64>>, Array2<f64>) {
    let mut current = image.to_owned();
    let mut details = Vec::with_capacity(levels);
    for level in 0..levels {
        let next = atrous_smooth(current.view(), 1 << level);
        let mut detail = current;
        Zip::from(&mut detail).and(&next).for_each(|d, &n| *d -= n);
        details.push(detail);
        current = next;
    }
    (details, current)
}

/// Separable B3-spline convolution with holes of `stride` pixels.
fn atrous_smooth(image: ArrayView2<f64>, stride: usize) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let offset = |t: usize| (t as isize - 2) * stride as isize;
    let horizontal = Array2::from_shape_fn((rows, cols), |(i, j)| {
        B3_SPLINE
            .iter()
            .enumerate()
            .map(|(t, &k)| k * image[(i, reflect(j as isize + offset(t), cols))])
            .sum::<f64>()
    });
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        B3_SPLINE
            .iter()
            .enumerate()
            .map(|(t, &k)| k * horizontal[(reflect(i as isize + offset(t), rows), j)])
            .sum::<f64>()
    })
}

fn noise_response(level: usize) -> f64 {
    match B3_NOISE_RESPONSE.get(level) {
        Some(&r) => r,
        None => {
            let last = B3_NOISE_RESPONSE.len() - 1;
            B3_NOISE_RESPONSE[last] / f64::powi(2.0, (level - last) as i32)
        }
    }
}

fn soft_threshold(coefficient: f64, threshold: f64) -> f64 {
    if coefficient > threshold {
        coefficient - threshold
    } else if coefficient < -threshold {
        coefficient + threshold
    } else {
        0.0
    }
}

fn median_abs(data: &Array2<f64>) -> f64 {
    let mut abs: Vec<f64> = data.iter().map(|c| c.abs()).collect();
    if abs.is_empty() {
        return 0.0;
    }
    abs.sort_by(|a, b| a.total_cmp(b));
    let mid = abs.len() / 2;
    if abs.len() % 2 == 0 {
        (abs[mid - 1] + abs[mid]) / 2.0
    } else {
        abs[mid]
    }
}
