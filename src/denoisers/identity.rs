use crate::denoisers::denoiser::*;
use denoiser_macros::register_denoiser;
use ndarray::{Array3, ArrayView3};

/// Returns its input unchanged.
///
/// With this denoiser the dual variable stays at zero and every iteration is a proximal-point
/// step of the data term, which makes it a convenient baseline.
#[register_denoiser]
#[derive(Clone, Debug, Default)]
pub struct IdentityDenoiser;

impl Denoiser for IdentityDenoiser {
    fn new() -> Self {
        IdentityDenoiser
    }

    fn config(&self) -> DenoiserConfig {
        DenoiserConfig {
            name: "identity".to_string(),
            description: "Pass-through, no prior.".to_string(),
        }
    }

    fn denoise(&self, batch: ArrayView3<f64>) -> Array3<f64> {
        batch.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_returns_input() {
        let batch = Array3::from_shape_fn((2, 3, 4), |(b, i, j)| (b * 12 + i * 4 + j) as f64);
        assert_eq!(IdentityDenoiser.denoise(batch.view()), batch);
    }

    #[test]
    fn test_identity_from_registry() {
        let denoiser = DenoiserRegistry::create("identity").unwrap();
        assert_eq!(denoiser.config().name, "identity");
    }
}
