//! Penalty-weight schedules for the unrolled iterations.

pub mod layers;
mod schedule;
mod subnet;

use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView3};

pub use schedule::{validate_schedule, FixedSchedule};
pub use subnet::{SubNet, SubNetParams, DEFAULT_FEATURE_SIZE, WEIGHT_FLOOR};

/// Maps a batch of kernels and their alpha values to one penalty weight per sample and
/// iteration.
pub trait WeightPredictor: Send + Sync + std::fmt::Debug {
    /// Number of weights produced per sample.
    fn n_iters(&self) -> usize;

    /// Returns a `(batch, n_iters)` array of strictly positive weights.
    fn predict_weights(
        &self,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
    ) -> Result<Array2<f64>>;
}
