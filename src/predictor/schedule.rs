use crate::error::{invalid, AdmmError, Result};
use ndarray::{Array1, Array2, ArrayView2};

/// One penalty weight per iteration, shared by every sample of a batch.
///
/// Unlike [`crate::predictor::SubNet`] this schedule does not look at the kernel or alpha.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedSchedule {
    rho: Array1<f64>,
}

impl FixedSchedule {
    /// # Errors
    /// `AdmmError::NonPositiveWeight` if any weight is not strictly positive and finite.
    pub fn new(rho: Array1<f64>) -> Result<Self> {
        if let Some((iteration, &value)) = rho
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(AdmmError::NonPositiveWeight {
                sample: 0,
                iteration,
                value,
            });
        }
        Ok(FixedSchedule { rho })
    }

    /// The all-ones schedule a fresh model starts from.
    pub fn ones(n_iters: usize) -> Self {
        FixedSchedule {
            rho: Array1::ones(n_iters),
        }
    }

    pub fn n_iters(&self) -> usize {
        self.rho.len()
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.rho
    }

    /// Repeats the shared schedule for every sample, giving the `(batch, n_iters)` layout the
    /// controller consumes.
    pub fn broadcast(&self, batch: usize) -> Result<Array2<f64>> {
        self.rho
            .broadcast((batch, self.rho.len()))
            .map(|view| view.to_owned())
            .ok_or_else(|| invalid("cannot broadcast schedule"))
    }
}

/// Checks that every weight of a `(batch, n_iters)` schedule is finite and strictly positive.
///
/// Weights are never clamped; a violation points at a defective predictor.
pub fn validate_schedule(weights: ArrayView2<f64>) -> Result<()> {
    for ((sample, iteration), &value) in weights.indexed_iter() {
        if !(value.is_finite() && value > 0.0) {
            return Err(AdmmError::NonPositiveWeight {
                sample,
                iteration,
                value,
            });
        }
    }
    Ok(())
}
