//! Batched inputs of one restoration call and their validation.

use crate::error::{invalid, shape, Result};
use ndarray::{Array1, Array3, ArrayView2, ArrayView3, Axis};

/// One batch of deconvolution problems.
///
/// # Fields
/// - `observed`: Blurred, noisy images, `(batch, height, width)`.
/// - `kernels`: PSFs, `(batch, kh, kw)` with `kh <= height` and `kw <= width`.
/// - `alpha`: Inverse-noise / brightness proxy per image, finite and strictly positive.
#[derive(Clone, Debug)]
pub struct ObservationBatch<'a> {
    pub observed: ArrayView3<'a, f64>,
    pub kernels: ArrayView3<'a, f64>,
    pub alpha: &'a Array1<f64>,
}

impl<'a> ObservationBatch<'a> {
    /// Checks that the three inputs describe the same number of well-formed problems.
    ///
    /// # Errors
    /// - `AdmmError::Shape` for mismatched batch sizes, empty images or oversized kernels.
    /// - `AdmmError::InvalidInput` for NaN or infinite pixels in `observed` or `kernels`, and for a
    ///   non-finite or non-positive alpha.
    pub fn new(
        observed: ArrayView3<'a, f64>,
        kernels: ArrayView3<'a, f64>,
        alpha: &'a Array1<f64>,
    ) -> Result<Self> {
        let (batch, height, width) = observed.dim();
        let (k_batch, kh, kw) = kernels.dim();
        if batch == 0 {
            return Err(shape("empty batch"));
        }
        if height == 0 || width == 0 {
            return Err(shape(format!("empty image of {:?}", (height, width))));
        }
        if k_batch != batch || alpha.len() != batch {
            return Err(shape(format!(
                "batch sizes disagree: {} images, {} kernels, {} alpha values",
                batch,
                k_batch,
                alpha.len()
            )));
        }
        if kh > height || kw > width {
            return Err(shape(format!(
                "kernel of {:?} is larger than image of {:?}",
                (kh, kw),
                (height, width)
            )));
        }
        if let Some(b) = first_non_finite(observed) {
            return Err(invalid(format!("observed image {} contains NaN or infinity", b)));
        }
        if let Some(b) = first_non_finite(kernels) {
            return Err(invalid(format!("kernel {} contains NaN or infinity", b)));
        }
        if let Some((i, a)) = alpha
            .iter()
            .enumerate()
            .find(|(_, a)| !a.is_finite() || **a <= 0.0)
        {
            return Err(invalid(format!("alpha[{}] = {} must be finite and > 0", i, a)));
        }
        for (i, kernel) in kernels.axis_iter(Axis(0)).enumerate() {
            if kernel.sum() == 0.0 {
                log::warn!("kernel {} sums to zero; the warm start will be all zeros", i);
            }
        }
        Ok(ObservationBatch {
            observed,
            kernels,
            alpha,
        })
    }

    pub fn len(&self) -> usize {
        self.observed.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spatial extent shared by every image of the batch.
    pub fn image_shape(&self) -> (usize, usize) {
        let (_, height, width) = self.observed.dim();
        (height, width)
    }

    /// Observed images clamped to be non-negative.
    pub fn clamped_observed(&self) -> Array3<f64> {
        self.observed.mapv(|v| v.max(0.0))
    }
}

/// Index of the first sample holding a NaN or infinite value.
fn first_non_finite(a: ArrayView3<f64>) -> Option<usize> {
    a.axis_iter(Axis(0))
        .position(|sample| sample.iter().any(|v| !v.is_finite()))
}

/// Brightness proxy used to build alpha when none is supplied: the mean of the observation.
pub fn estimate_alpha(observed: ArrayView2<f64>) -> f64 {
    observed.mean().unwrap_or(0.0)
}

/// [`estimate_alpha`] for every image of a batch.
pub fn estimate_alpha_batch(observed: ArrayView3<f64>) -> Array1<f64> {
    observed
        .axis_iter(Axis(0))
        .map(estimate_alpha)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdmmError;
    use ndarray::array;

    #[test]
    fn test_accepts_consistent_batch() {
        let observed = Array3::<f64>::ones((2, 8, 8));
        let kernels = Array3::<f64>::ones((2, 3, 3));
        let alpha = array![1.0, 2.0];
        let batch = ObservationBatch::new(observed.view(), kernels.view(), &alpha).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.image_shape(), (8, 8));
    }

    #[test]
    fn test_rejects_batch_size_mismatch() {
        let observed = Array3::<f64>::ones((2, 8, 8));
        let kernels = Array3::<f64>::ones((3, 3, 3));
        let alpha = array![1.0, 2.0];
        assert!(ObservationBatch::new(observed.view(), kernels.view(), &alpha).is_err());

        let kernels = Array3::<f64>::ones((2, 3, 3));
        let alpha = array![1.0];
        assert!(ObservationBatch::new(observed.view(), kernels.view(), &alpha).is_err());
    }

    #[test]
    fn test_rejects_oversized_kernel() {
        let observed = Array3::<f64>::ones((1, 8, 8));
        let kernels = Array3::<f64>::ones((1, 9, 3));
        let alpha = array![1.0];
        assert!(ObservationBatch::new(observed.view(), kernels.view(), &alpha).is_err());
    }

    #[test]
    fn test_rejects_non_positive_alpha() {
        let observed = Array3::<f64>::ones((2, 4, 4));
        let kernels = Array3::<f64>::ones((2, 2, 2));
        for alpha in [array![1.0, 0.0], array![-1.0, 1.0], array![f64::NAN, 1.0]] {
            assert!(ObservationBatch::new(observed.view(), kernels.view(), &alpha).is_err());
        }
    }

    #[test]
    fn test_rejects_non_finite_inputs() {
        let kernels = Array3::<f64>::ones((2, 2, 2));
        let alpha = array![1.0, 1.0];
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut observed = Array3::<f64>::ones((2, 4, 4));
            observed[(1, 2, 3)] = bad;
            assert!(matches!(
                ObservationBatch::new(observed.view(), kernels.view(), &alpha),
                Err(AdmmError::InvalidInput(_))
            ));

            let observed = Array3::<f64>::ones((2, 4, 4));
            let mut kernels = kernels.clone();
            kernels[(0, 1, 1)] = bad;
            assert!(matches!(
                ObservationBatch::new(observed.view(), kernels.view(), &alpha),
                Err(AdmmError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_clamps_negative_observations() {
        let observed = array![[[-1.0, 2.0], [0.5, -0.1]]];
        let kernels = Array3::<f64>::ones((1, 1, 1));
        let alpha = array![1.0];
        let batch = ObservationBatch::new(observed.view(), kernels.view(), &alpha).unwrap();
        assert_eq!(batch.clamped_observed(), array![[[0.0, 2.0], [0.5, 0.0]]]);
    }

    #[test]
    fn test_estimate_alpha_is_mean() {
        let observed = array![[[1.0, 2.0], [3.0, 6.0]], [[0.0, 0.0], [0.0, 4.0]]];
        assert_eq!(estimate_alpha_batch(observed.view()), array![3.0, 1.0]);
    }
}
