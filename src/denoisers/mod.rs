//! Prior step of the ADMM iteration.
//!
//! The controller only ever calls [`denoiser::Denoiser::denoise`] on a batch. Learned networks
//! are supplied by the host application behind that trait; the classical denoisers in this
//! module register themselves in the [`denoiser::DenoiserRegistry`] so that a configuration
//! can name them.

/// Core denoiser interface and the global registry.
pub mod denoiser;

/// Separable Gaussian smoothing.
mod gaussian;

/// Pass-through denoiser, reduces the iteration to the quadratic solve alone.
mod identity;

/// Soft-thresholding of B3-spline à-trous wavelet details.
mod wavelet;

pub use denoiser::{Denoiser, DenoiserConfig, DenoiserRegistry};
pub use gaussian::GaussianDenoiser;
pub use identity::IdentityDenoiser;
pub use wavelet::WaveletDenoiser;
