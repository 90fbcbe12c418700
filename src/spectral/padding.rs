//! Centered zero-padding, half-cropping and the `fftshift`/`ifftshift` rolls.
//!
//! Padding is center-aligned: the content's center `floor(k / 2)` lands on the buffer's center
//! `floor(n / 2)`, which is exactly the index `ifftshift` moves to `(0, 0)`. When the amount of
//! padding is odd it is split `floor`/`ceil` accordingly.

use crate::error::{invalid, shape, Result};
use ndarray::{s, Array2, ArrayView2};
use num_traits::Zero;

/// Working size used for wraparound-safe convolution of an image of `(rows, cols)`.
pub fn working_shape((rows, cols): (usize, usize)) -> (usize, usize) {
    (2 * rows, 2 * cols)
}

/// Offset that aligns the center of `inner` samples with the center of `outer` samples.
fn center_offset(outer: usize, inner: usize) -> usize {
    outer / 2 - inner / 2
}

/// Circularly shifts `a` so that `out[(i + shift_r) mod rows, (j + shift_c) mod cols] = a[i, j]`.
fn roll<T: Clone>(a: &Array2<T>, shift_r: isize, shift_c: isize) -> Array2<T> {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 {
        return a.clone();
    }
    let sr = shift_r.rem_euclid(rows as isize) as usize;
    let sc = shift_c.rem_euclid(cols as isize) as usize;
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        a[((i + rows - sr) % rows, (j + cols - sc) % cols)].clone()
    })
}

/// Moves index `(0, 0)` to the center, `floor(n / 2)` along each axis.
pub fn fftshift<T: Clone>(a: &Array2<T>) -> Array2<T> {
    let (rows, cols) = a.dim();
    roll(a, (rows / 2) as isize, (cols / 2) as isize)
}

/// Inverse of [`fftshift`]: moves the center `floor(n / 2)` to index `(0, 0)`.
pub fn ifftshift<T: Clone>(a: &Array2<T>) -> Array2<T> {
    let (rows, cols) = a.dim();
    roll(a, -((rows / 2) as isize), -((cols / 2) as isize))
}

/// Zero-pads `a` symmetrically to `(rows, cols)`.
///
/// # Arguments
/// - `a`: The array to pad, e.g. a PSF.
/// - `target`: The output extent; must be at least as large as `a` along both axes.
///
/// # Returns
/// The padded array, with the content's center at `floor(target / 2)` along each axis.
///
/// # Errors
/// `AdmmError::Shape` if `a` does not fit into `target`.
pub fn pad_to<T: Clone + Zero>(a: ArrayView2<T>, target: (usize, usize)) -> Result<Array2<T>> {
    let (rows, cols) = a.dim();
    if rows > target.0 || cols > target.1 {
        return Err(shape(format!(
            "cannot pad array of {:?} to smaller extent {:?}",
            (rows, cols),
            target
        )));
    }
    let top = center_offset(target.0, rows);
    let left = center_offset(target.1, cols);
    let mut out = Array2::<T>::zeros(target);
    out.slice_mut(s![top..top + rows, left..left + cols]).assign(&a);
    Ok(out)
}

/// Zero-pads an image to twice its extent along both axes, content centered.
pub fn pad_double<T: Clone + Zero>(a: ArrayView2<T>) -> Array2<T> {
    let (rows, cols) = a.dim();
    let (pr, pc) = working_shape((rows, cols));
    let top = center_offset(pr, rows);
    let left = center_offset(pc, cols);
    let mut out = Array2::<T>::zeros((pr, pc));
    out.slice_mut(s![top..top + rows, left..left + cols]).assign(&a);
    out
}

/// Extracts the centered half-size region of a working-size buffer; the inverse of
/// [`pad_double`].
///
/// # Errors
/// `AdmmError::InvalidInput` if either extent is odd, since no image pads to an odd size.
pub fn crop_half<T: Clone>(a: ArrayView2<T>) -> Result<Array2<T>> {
    let (rows, cols) = a.dim();
    if rows % 2 != 0 || cols % 2 != 0 {
        return Err(invalid(format!(
            "crop_half expects even extents, got {:?}",
            (rows, cols)
        )));
    }
    let (hr, hc) = (rows / 2, cols / 2);
    let top = center_offset(rows, hr);
    let left = center_offset(cols, hc);
    Ok(a.slice(s![top..top + hr, left..left + hc]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_crop_half_undoes_pad_double() {
        for &(rows, cols) in &[(1, 1), (3, 5), (4, 4), (7, 2), (16, 16)] {
            let x = Array2::from_shape_fn((rows, cols), |(i, j)| (i * 31 + j * 7) as f64 * 0.37 - 2.0);
            let padded = pad_double(x.view());
            assert_eq!(padded.dim(), (2 * rows, 2 * cols));
            assert_eq!(crop_half(padded.view()).unwrap(), x);
        }
    }

    #[test]
    fn test_pad_double_places_content_in_center() {
        let x = array![[1.0, 2.0, 3.0]];
        let padded = pad_double(x.view());
        // center (0, 1) of the image lands on center (1, 3) of the buffer
        assert_eq!(
            padded,
            array![[0.0, 0.0, 0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 2.0, 3.0, 0.0]]
        );
    }

    #[test]
    fn test_pad_to_centers_content() {
        let k = array![[5.0]];
        let padded = pad_to(k.view(), (4, 5)).unwrap();
        assert_eq!(padded[(2, 2)], 5.0);
        assert_eq!(padded.sum(), 5.0);

        let k = array![[1.0, 1.0], [1.0, 1.0]];
        let padded = pad_to(k.view(), (5, 5)).unwrap();
        assert_eq!(padded.slice(s![1..3, 1..3]), k);
        assert_eq!(padded.sum(), 4.0);
    }

    #[test]
    fn test_pad_to_rejects_larger_input() {
        let k = Array2::<f64>::ones((5, 3));
        assert!(pad_to(k.view(), (4, 8)).is_err());
    }

    #[test]
    fn test_crop_half_rejects_odd_extent() {
        let x = Array2::<f64>::zeros((5, 4));
        assert!(crop_half(x.view()).is_err());
    }

    #[test]
    fn test_ifftshift_moves_center_to_origin() {
        // even and odd extents
        for &(rows, cols) in &[(4, 4), (5, 3), (6, 7)] {
            let mut a = Array2::<f64>::zeros((rows, cols));
            a[(rows / 2, cols / 2)] = 1.0;
            let shifted = ifftshift(&a);
            assert_eq!(shifted[(0, 0)], 1.0);
            assert_eq!(fftshift(&shifted), a);
        }
    }

    #[test]
    fn test_fftshift_matches_numpy_for_odd_length() {
        // numpy.fft.fftshift([0, 1, 2, 3, 4]) == [3, 4, 0, 1, 2]
        let a = array![[0.0, 1.0, 2.0, 3.0, 4.0]];
        assert_eq!(fftshift(&a), array![[3.0, 4.0, 0.0, 1.0, 2.0]]);
        assert_eq!(ifftshift(&a), array![[2.0, 3.0, 4.0, 0.0, 1.0]]);
    }
}
