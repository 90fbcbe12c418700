//! Optical transfer functions and the conversions between padded images and their spectra.

use crate::error::Result;
use crate::spectral::fft::{RustFft2d, SpectralBackend};
use crate::spectral::padding::{crop_half, fftshift, ifftshift, pad_double, pad_to, working_shape};
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

/// Frequency-domain representation of a PSF at the working size.
///
/// # Fields
/// - `h`: The transfer function `fft2(ifftshift(pad(kernel)))`.
/// - `ht`: Its complex conjugate, the adjoint of the blur.
/// - `hth`: The squared magnitude `|h|^2`.
#[derive(Clone, Debug)]
pub struct Otf {
    pub h: Array2<Complex64>,
    pub ht: Array2<Complex64>,
    pub hth: Array2<f64>,
}

impl Otf {
    /// Builds the OTF of `kernel` at the extent the backend was planned for.
    ///
    /// # Errors
    /// `AdmmError::Shape` if the kernel is larger than the backend's extent.
    pub fn from_kernel(kernel: ArrayView2<f64>, backend: &dyn SpectralBackend) -> Result<Otf> {
        let padded = pad_to(kernel, backend.shape())?;
        let h = to_spectrum(&padded, backend)?;
        let ht = h.mapv(|v| v.conj());
        let hth = h.mapv(|v| v.norm_sqr());
        Ok(Otf { h, ht, hth })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.h.dim()
    }
}

/// Shift-then-transform: `fft2(ifftshift(padded))`.
pub fn to_spectrum(
    padded: &Array2<f64>,
    backend: &dyn SpectralBackend,
) -> Result<Array2<Complex64>> {
    let mut spectrum = ifftshift(padded).mapv(|v| Complex64::new(v, 0.0));
    backend.forward(&mut spectrum)?;
    Ok(spectrum)
}

/// Inverse-transform-then-shift: `fftshift(ifft2(spectrum))`, keeping only the real part.
///
/// The imaginary part left by a real-valued problem is rounding residue and is dropped.
pub fn from_spectrum(
    mut spectrum: Array2<Complex64>,
    backend: &dyn SpectralBackend,
) -> Result<Array2<f64>> {
    backend.inverse(&mut spectrum)?;
    Ok(fftshift(&spectrum.mapv(|v| v.re)))
}

/// Spectrum of an image padded to its working size.
pub fn image_spectrum(
    image: ArrayView2<f64>,
    backend: &dyn SpectralBackend,
) -> Result<Array2<Complex64>> {
    to_spectrum(&pad_double(image), backend)
}

/// Forward model: convolves `image` with `kernel` without circular wraparound.
///
/// Computes `crop_half(fftshift(ifft2(H * fft2(ifftshift(pad_double(image))))))`, i.e. the
/// linear convolution cropped to the image support. Used to simulate observations.
///
/// # Arguments
/// - `image`: The sharp image.
/// - `kernel`: The PSF; it must not be larger than twice the image along either axis.
///
/// # Returns
/// The blurred image, same shape as `image`.
pub fn blur(image: ArrayView2<f64>, kernel: ArrayView2<f64>) -> Result<Array2<f64>> {
    let backend = RustFft2d::new(working_shape(image.dim()));
    let otf = Otf::from_kernel(kernel, &backend)?;
    let spectrum = image_spectrum(image, &backend)? * &otf.h;
    crop_half(from_spectrum(spectrum, &backend)?.view())
}
