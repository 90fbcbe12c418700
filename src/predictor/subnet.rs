use crate::error::{shape, Result};
use crate::predictor::layers::{relu_inplace, softplus, Down, Linear};
use crate::predictor::WeightPredictor;
use crate::spectral::{Otf, RustFft2d};
use ndarray::{stack, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Canonical spectrum size the predictor works at, independent of the image size.
pub const DEFAULT_FEATURE_SIZE: usize = 128;

/// Floor added to every predicted weight.
pub const WEIGHT_FLOOR: f64 = 1e-6;

/// Channel progression of the four downscaling blocks.
const CHANNELS: [usize; 5] = [1, 4, 8, 16, 16];

const HIDDEN: usize = 64;

/// Learned parameters of a [`SubNet`].
///
/// # Fields
/// - `down`: The four downscaling blocks, channels `1 → 4 → 8 → 16 → 16`.
/// - `hidden1`, `hidden2`, `output`: The MLP head. `hidden1` takes the flattened features plus
///   alpha, `output` has one unit per iteration.
#[derive(Clone, Debug)]
pub struct SubNetParams {
    pub down: Vec<Down>,
    pub hidden1: Linear,
    pub hidden2: Linear,
    pub output: Linear,
}

impl SubNetParams {
    /// Deterministically initialized parameters for `n_iters` outputs at `feature_size`.
    pub fn seeded(n_iters: usize, feature_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let down = CHANNELS
            .windows(2)
            .map(|c| Down::init(&mut rng, c[0], c[1]))
            .collect();
        SubNetParams {
            down,
            hidden1: Linear::init(&mut rng, flattened_len(feature_size) + 1, HIDDEN),
            hidden2: Linear::init(&mut rng, HIDDEN, HIDDEN),
            output: Linear::init(&mut rng, HIDDEN, n_iters),
        }
    }
}

fn flattened_len(feature_size: usize) -> usize {
    let side = feature_size >> (CHANNELS.len() - 1);
    CHANNELS[CHANNELS.len() - 1] * side * side
}

/// Predicts one penalty weight per iteration from the kernel's power spectrum and alpha.
///
/// The kernel is zero-padded to `feature_size × feature_size`, its spectrum magnitude squared
/// `|H|²` is passed through four pooling/convolution blocks, and the flattened features, with
/// alpha appended, go through a three-layer MLP. A softplus plus [`WEIGHT_FLOOR`] keeps every
/// weight strictly positive.
#[derive(Clone, Debug)]
pub struct SubNet {
    params: SubNetParams,
    feature_size: usize,
}

impl SubNet {
    /// Wraps trained parameters.
    ///
    /// # Errors
    /// `AdmmError::Shape` if `feature_size` is not a positive multiple of 16, or the layer
    /// dimensions do not chain.
    pub fn new(params: SubNetParams, feature_size: usize) -> Result<Self> {
        let blocks = CHANNELS.len() - 1;
        if feature_size == 0 || feature_size % (1 << blocks) != 0 {
            return Err(shape(format!(
                "feature size {} is not a positive multiple of {}",
                feature_size,
                1 << blocks
            )));
        }
        if params.down.len() != blocks {
            return Err(shape(format!(
                "expected {} down blocks, got {}",
                blocks,
                params.down.len()
            )));
        }
        let mut channels = 1;
        for block in &params.down {
            if block.first.conv.in_channels() != channels {
                return Err(shape(format!(
                    "down block expects {} channels, previous block yields {}",
                    block.first.conv.in_channels(),
                    channels
                )));
            }
            channels = block.out_channels();
        }
        let side = feature_size >> blocks;
        let expected = channels * side * side + 1;
        if params.hidden1.in_features() != expected
            || params.hidden2.in_features() != params.hidden1.out_features()
            || params.output.in_features() != params.hidden2.out_features()
        {
            return Err(shape(format!(
                "MLP dimensions {:?} -> {:?} -> {:?} do not chain from {} features",
                params.hidden1.weight.dim(),
                params.hidden2.weight.dim(),
                params.output.weight.dim(),
                expected
            )));
        }
        Ok(SubNet {
            params,
            feature_size,
        })
    }

    /// A predictor with freshly initialized parameters; deterministic for a given `seed`.
    pub fn seeded(n_iters: usize, feature_size: usize, seed: u64) -> Result<Self> {
        SubNet::new(
            SubNetParams::seeded(n_iters, feature_size, seed),
            feature_size,
        )
    }

    pub fn n_iters(&self) -> usize {
        self.params.output.out_features()
    }

    pub fn feature_size(&self) -> usize {
        self.feature_size
    }

    fn predict_one(
        &self,
        kernel: ArrayView2<f64>,
        alpha: f64,
        backend: &RustFft2d,
    ) -> Result<Array1<f64>> {
        let otf = Otf::from_kernel(kernel, backend)?;
        let mut features: Array3<f64> = otf.hth.insert_axis(Axis(0));
        for block in &self.params.down {
            features = block.forward(features.view())?;
        }

        let mut flat: Vec<f64> = features.iter().copied().collect();
        flat.push(alpha);
        let flat = Array1::from(flat);

        let mut h = self.params.hidden1.forward(flat.view())?;
        relu_inplace(&mut h);
        let mut h = self.params.hidden2.forward(h.view())?;
        relu_inplace(&mut h);
        let out = self.params.output.forward(h.view())?;
        Ok(out.mapv(|v| softplus(v) + WEIGHT_FLOOR))
    }
}

impl WeightPredictor for SubNet {
    fn n_iters(&self) -> usize {
        SubNet::n_iters(self)
    }

    fn predict_weights(
        &self,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        let (batch, kh, kw) = kernels.dim();
        if alpha.len() != batch {
            return Err(shape(format!(
                "{} kernels but {} alpha values",
                batch,
                alpha.len()
            )));
        }
        if kh > self.feature_size || kw > self.feature_size {
            return Err(shape(format!(
                "kernel of {:?} exceeds the predictor's feature size {}",
                (kh, kw),
                self.feature_size
            )));
        }
        let backend = RustFft2d::new((self.feature_size, self.feature_size));
        let rows = kernels
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(alpha.to_vec())
            .map(|(kernel, a)| self.predict_one(kernel, a, &backend))
            .collect::<Result<Vec<Array1<f64>>>>()?;
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        stack(Axis(0), &views).map_err(|e| shape(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::validate_schedule;

    fn kernels(batch: usize, size: usize) -> Array3<f64> {
        Array3::from_shape_fn((batch, size, size), |(b, i, j)| {
            1.0 / (1.0 + (b + i + j) as f64)
        })
    }

    #[test]
    fn test_output_shape_and_floor() {
        let net = SubNet::seeded(8, 32, 3).unwrap();
        let w = net
            .predict_weights(kernels(3, 5).view(), &Array1::from(vec![0.1, 1.0, 50.0]))
            .unwrap();
        assert_eq!(w.dim(), (3, 8));
        assert!(w.iter().all(|&v| v >= WEIGHT_FLOOR && v.is_finite()));
        validate_schedule(w.view()).unwrap();
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let a = SubNet::seeded(4, 16, 11).unwrap();
        let b = SubNet::seeded(4, 16, 11).unwrap();
        let k = kernels(2, 3);
        let alpha = Array1::from(vec![0.5, 2.0]);
        assert_eq!(
            a.predict_weights(k.view(), &alpha).unwrap(),
            b.predict_weights(k.view(), &alpha).unwrap()
        );
    }

    #[test]
    fn test_canonical_size_matches_flattened_features() {
        assert_eq!(flattened_len(DEFAULT_FEATURE_SIZE), 1024);
        let net = SubNet::seeded(8, DEFAULT_FEATURE_SIZE, 0).unwrap();
        assert_eq!(net.params.hidden1.in_features(), 1025);
    }

    #[test]
    fn test_oversized_kernel_is_rejected() {
        let net = SubNet::seeded(2, 16, 0).unwrap();
        let err = net.predict_weights(kernels(1, 17).view(), &Array1::ones(1));
        assert!(err.is_err());
    }

    #[test]
    fn test_alpha_length_mismatch_is_rejected() {
        let net = SubNet::seeded(2, 16, 0).unwrap();
        assert!(net.predict_weights(kernels(2, 3).view(), &Array1::ones(1)).is_err());
    }

    #[test]
    fn test_invalid_feature_size() {
        assert!(SubNet::seeded(2, 24, 0).is_err());
        assert!(SubNet::seeded(2, 0, 0).is_err());
    }

    #[test]
    fn test_mismatched_head_is_rejected() {
        let mut params = SubNetParams::seeded(2, 32, 0);
        params.hidden1 = SubNetParams::seeded(2, 16, 0).hidden1;
        assert!(SubNet::new(params, 32).is_err());
    }
}
