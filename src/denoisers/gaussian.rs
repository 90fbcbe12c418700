use crate::denoisers::denoiser::*;
use denoiser_macros::register_denoiser;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// Separable Gaussian smoothing with half-sample symmetric borders.
///
/// # Fields
/// - `sigma`: Standard deviation in pixels. Values `<= 0` disable smoothing.
#[register_denoiser]
#[derive(Clone, Debug)]
pub struct GaussianDenoiser {
    pub sigma: f64,
}

impl GaussianDenoiser {
    pub fn with_sigma(sigma: f64) -> Self {
        GaussianDenoiser { sigma }
    }
}

impl Denoiser for GaussianDenoiser {
    fn new() -> Self {
        GaussianDenoiser { sigma: 1.0 }
    }

    fn config(&self) -> DenoiserConfig {
        DenoiserConfig {
            name: "gaussian".to_string(),
            description: "Separable Gaussian blur with reflected borders.".to_string(),
        }
    }

    fn denoise(&self, batch: ArrayView3<f64>) -> Array3<f64> {
        if self.sigma.is_nan() || self.sigma <= 0.0 {
            return batch.to_owned();
        }
        let (_, rows, cols) = batch.dim();
        let taps = gaussian_taps(self.sigma, rows.max(cols));
        map_images(batch, |image| smooth(image, &taps))
    }
}

/// Normalized 1D Gaussian with radius `ceil(3 sigma)`, at most `max_radius`.
fn gaussian_taps(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().min(max_radius as f64) as isize;
    let mut taps: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.iter_mut().for_each(|t| *t /= sum);
    taps
}

/// Maps any integer position onto `0..n` by half-sample symmetric reflection.
pub(crate) fn reflect(pos: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = pos.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

fn smooth(image: ArrayView2<f64>, taps: &[f64]) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let radius = (taps.len() / 2) as isize;
    let horizontal = Array2::from_shape_fn((rows, cols), |(i, j)| {
        taps.iter()
            .enumerate()
            .map(|(t, &k)| k * image[(i, reflect(j as isize + t as isize - radius, cols))])
            .sum::<f64>()
    });
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        taps.iter()
            .enumerate()
            .map(|(t, &k)| k * horizontal[(reflect(i as isize + t as isize - radius, rows), j)])
            .sum::<f64>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_taps_are_normalized() {
        let taps = gaussian_taps(1.5, 100);
        assert_eq!(taps.len(), 11);
        assert_abs_diff_eq!(taps.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(9, 4), 1);
    }

    #[test]
    fn test_constant_image_is_preserved() {
        let batch = Array3::from_elem((2, 5, 7), 3.25);
        let out = GaussianDenoiser::with_sigma(2.0).denoise(batch.view());
        assert_abs_diff_eq!(out, batch, epsilon = 1e-12);
    }

    #[test]
    fn test_impulse_is_spread_and_mass_preserved() {
        let mut batch = Array3::zeros((1, 15, 15));
        batch[(0, 7, 7)] = 1.0;
        let out = GaussianDenoiser::with_sigma(1.0).denoise(batch.view());
        assert!(out[(0, 7, 7)] < 1.0);
        assert!(out[(0, 7, 8)] > 0.0);
        assert_abs_diff_eq!(out[(0, 7, 8)], out[(0, 8, 7)], epsilon = 1e-15);
        assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_radius_is_capped_by_image_extent() {
        assert_eq!(gaussian_taps(1e300, 6).len(), 13);
        let batch = Array3::from_shape_fn((1, 4, 6), |(_, i, j)| (i + j) as f64);
        for sigma in [1e300, f64::INFINITY] {
            let out = GaussianDenoiser::with_sigma(sigma).denoise(batch.view());
            assert_eq!(out.dim(), batch.dim());
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let batch = Array3::from_shape_fn((1, 4, 4), |(_, i, j)| (i * j) as f64);
        assert_eq!(GaussianDenoiser::with_sigma(0.0).denoise(batch.view()), batch);
    }
}
