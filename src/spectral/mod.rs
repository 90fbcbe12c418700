//! Frequency-domain machinery shared by the solver, the weight predictor and the controller.
//!
//! All spectra in this crate follow one convention: a real-space buffer is padded to the
//! working size, shifted with `ifftshift` so that its center sits at index `(0, 0)`, and then
//! transformed. On the way out the inverse transform is followed by `fftshift` and the real
//! part is kept. The working size is always twice the image size along both axes, which keeps
//! the circular convolution performed by the FFT from wrapping around into the image.
//!
//! # Modules
//!
//! * **fft**: The `SpectralBackend` trait and its `rustfft` implementation.
//! * **padding**: Centered padding, half-cropping and the origin shifts.
//! * **otf**: Optical transfer functions and spectrum conversions.

/// 2D FFT backends.
pub mod fft;

/// Optical transfer functions, spectrum conversions and the forward blur model.
pub mod otf;

/// Padding, cropping and circular shifts on 2D arrays.
pub mod padding;

pub use fft::{RustFft2d, SpectralBackend};
pub use otf::{blur, from_spectrum, image_spectrum, to_spectrum, Otf};
pub use padding::{crop_half, fftshift, ifftshift, pad_double, pad_to, working_shape};
