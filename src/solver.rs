//! Closed-form data-fidelity step of the Gaussian-likelihood ADMM.
//!
//! With the blur diagonalized by the FFT, the x-update
//!
//! ```text
//! argmin_x ||H x - y||^2 + rho ||x - (z - u / rho)||^2
//! ```
//!
//! is a per-frequency division:
//!
//! ```text
//! x = crop_half(fftshift(ifft2((conj(H) Y + fft2(ifftshift(pad_double(rho z - u)))) / (rho + |H|^2))))
//! ```
//!
//! `rho > 0` keeps every denominator strictly positive, so no regularization of the division
//! is needed.

use crate::error::{shape, Result};
use crate::spectral::{
    crop_half, from_spectrum, image_spectrum, working_shape, Otf, RustFft2d, SpectralBackend,
};
use ndarray::{Array2, ArrayView2, Zip};
use num_complex::Complex64;

/// Per-image spectral state of one deconvolution problem: the observation spectrum `Y`, the
/// OTF of the kernel and the FFT backend planned for the working size.
#[derive(Debug)]
pub struct GaussianSolver<B: SpectralBackend = RustFft2d> {
    backend: B,
    y: Array2<Complex64>,
    otf: Otf,
    image_shape: (usize, usize),
}

impl GaussianSolver<RustFft2d> {
    /// Prepares `Y`, `H`, `Ht` and `HtH` for an observed image and its PSF.
    ///
    /// # Errors
    /// `AdmmError::Shape` if the kernel does not fit into the working size.
    pub fn new(observed: ArrayView2<f64>, kernel: ArrayView2<f64>) -> Result<Self> {
        let backend = RustFft2d::new(working_shape(observed.dim()));
        let y = image_spectrum(observed, &backend)?;
        let otf = Otf::from_kernel(kernel, &backend)?;
        GaussianSolver::from_spectra(y, otf, backend)
    }
}

impl<B: SpectralBackend> GaussianSolver<B> {
    /// Builds a solver from spectra that were already computed with `backend`.
    pub fn from_spectra(y: Array2<Complex64>, otf: Otf, backend: B) -> Result<Self> {
        let working = backend.shape();
        if y.dim() != working || otf.dim() != working {
            return Err(shape(format!(
                "spectra of {:?} and {:?} do not match working size {:?}",
                y.dim(),
                otf.dim(),
                working
            )));
        }
        if working.0 % 2 != 0 || working.1 % 2 != 0 {
            return Err(shape(format!("working size {:?} is not even", working)));
        }
        Ok(GaussianSolver {
            backend,
            y,
            otf,
            image_shape: (working.0 / 2, working.1 / 2),
        })
    }

    /// Shape of the cropped image this solver produces.
    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    pub fn otf(&self) -> &Otf {
        &self.otf
    }

    /// Wiener warm start: `crop_half(fftshift(ifft2(Y Ht / (HtH + 1 / alpha))))`.
    pub fn init_l2(&self, alpha: f64) -> Result<Array2<f64>> {
        let reg = 1.0 / alpha;
        let spectrum = Zip::from(&self.y)
            .and(&self.otf.ht)
            .and(&self.otf.hth)
            .map_collect(|y, ht, hth| *y * *ht / (*hth + reg));
        crop_half(from_spectrum(spectrum, &self.backend)?.view())
    }

    /// Exact minimizer of the x-subproblem for the current auxiliary `z`, dual `u` and `rho`.
    ///
    /// # Errors
    /// `AdmmError::Shape` if `z` or `u` do not have the image shape.
    pub fn solve(&self, z: ArrayView2<f64>, u: ArrayView2<f64>, rho: f64) -> Result<Array2<f64>> {
        if z.dim() != self.image_shape || u.dim() != self.image_shape {
            return Err(shape(format!(
                "z {:?} and u {:?} must match image shape {:?}",
                z.dim(),
                u.dim(),
                self.image_shape
            )));
        }
        let target = Zip::from(&z).and(&u).map_collect(|z, u| rho * z - u);
        let prior = image_spectrum(target.view(), &self.backend)?;
        let spectrum = Zip::from(&self.y)
            .and(&self.otf.ht)
            .and(&self.otf.hth)
            .and(&prior)
            .map_collect(|y, ht, hth, p| (*ht * *y + *p) / (rho + *hth));
        crop_half(from_spectrum(spectrum, &self.backend)?.view())
    }
}
