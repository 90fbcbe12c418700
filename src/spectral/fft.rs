//! 2D FFT built from 1D `rustfft` plans applied along rows and then columns.

use crate::error::{shape, Result};
use ndarray::{Array2, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

/// A 2D discrete Fourier transform of a fixed size.
///
/// Implementations must be interchangeable: the forward transform is unnormalized and the
/// inverse transform is scaled by `1 / (rows * cols)`, so that `inverse(forward(x)) == x`.
pub trait SpectralBackend: Send + Sync {
    /// The `(rows, cols)` extent this backend was planned for.
    fn shape(&self) -> (usize, usize);

    /// In-place forward 2D FFT.
    fn forward(&self, data: &mut Array2<Complex64>) -> Result<()>;

    /// In-place inverse 2D FFT, normalized.
    fn inverse(&self, data: &mut Array2<Complex64>) -> Result<()>;
}

/// `rustfft` backed 2D transform holding the row and column plans for one working size.
///
/// # Fields
/// - `rows`, `cols`: The planned extent.
/// - `fft_rows`, `ifft_rows`: Plans of length `cols`, applied to every row.
/// - `fft_cols`, `ifft_cols`: Plans of length `rows`, applied to every column.
#[derive(Clone)]
pub struct RustFft2d {
    rows: usize,
    cols: usize,
    fft_rows: Arc<dyn Fft<f64>>,
    ifft_rows: Arc<dyn Fft<f64>>,
    fft_cols: Arc<dyn Fft<f64>>,
    ifft_cols: Arc<dyn Fft<f64>>,
}

impl RustFft2d {
    /// Plans forward and inverse transforms for a `(rows, cols)` buffer.
    pub fn new((rows, cols): (usize, usize)) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        RustFft2d {
            rows,
            cols,
            fft_rows: planner.plan_fft(cols, FftDirection::Forward),
            ifft_rows: planner.plan_fft(cols, FftDirection::Inverse),
            fft_cols: planner.plan_fft(rows, FftDirection::Forward),
            ifft_cols: planner.plan_fft(rows, FftDirection::Inverse),
        }
    }

    fn check(&self, data: &Array2<Complex64>) -> Result<()> {
        if data.dim() != (self.rows, self.cols) {
            return Err(shape(format!(
                "fft planned for {:?}, got buffer of {:?}",
                (self.rows, self.cols),
                data.dim()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RustFft2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFft2d")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

/// Applies `plan` to every lane of `data` along `axis`, gathering each lane into a contiguous
/// buffer first so that non-contiguous columns work the same way as rows.
fn process_lanes(data: &mut Array2<Complex64>, axis: Axis, plan: &Arc<dyn Fft<f64>>) {
    let mut buffer = vec![Complex64::new(0.0, 0.0); plan.len()];
    let mut scratch = vec![Complex64::new(0.0, 0.0); plan.get_inplace_scratch_len()];
    for mut lane in data.lanes_mut(axis) {
        for (b, v) in buffer.iter_mut().zip(lane.iter()) {
            *b = *v;
        }
        plan.process_with_scratch(&mut buffer, &mut scratch);
        for (v, b) in lane.iter_mut().zip(buffer.iter()) {
            *v = *b;
        }
    }
}

impl SpectralBackend for RustFft2d {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn forward(&self, data: &mut Array2<Complex64>) -> Result<()> {
        self.check(data)?;
        process_lanes(data, Axis(1), &self.fft_rows);
        process_lanes(data, Axis(0), &self.fft_cols);
        Ok(())
    }

    fn inverse(&self, data: &mut Array2<Complex64>) -> Result<()> {
        self.check(data)?;
        process_lanes(data, Axis(1), &self.ifft_rows);
        process_lanes(data, Axis(0), &self.ifft_cols);
        let n_total = (self.rows * self.cols) as f64;
        data.mapv_inplace(|v| v / n_total);
        Ok(())
    }
}
