//! Run configuration of the restoration, loadable from TOML.
//!
//! ```toml
//! n_iters = 8
//! denoiser = "wavelet"
//! clamp_observation = true
//!
//! [weights]
//! mode = "predicted"
//! feature_size = 128
//! seed = 0
//! ```

use crate::error::{AdmmError, Result};
use crate::predictor::DEFAULT_FEATURE_SIZE;
use serde::{Deserialize, Serialize};

/// Selects the source of the per-iteration penalty weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WeightConfig {
    /// Per-sample weights from a `SubNet` with seeded parameters.
    Predicted {
        #[serde(default = "default_feature_size")]
        feature_size: usize,
        #[serde(default)]
        seed: u64,
    },
    /// A shared schedule; `None` means all ones.
    Fixed {
        #[serde(default)]
        rho: Option<Vec<f64>>,
    },
}

fn default_feature_size() -> usize {
    DEFAULT_FEATURE_SIZE
}

/// # Fields
/// - `n_iters`: Number of unrolled iterations.
/// - `denoiser`: Name of a registered denoiser.
/// - `clamp_observation`: Clamp negative observed values to zero before the solve.
/// - `weights`: Penalty weight source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmmConfig {
    pub n_iters: usize,
    pub denoiser: String,
    pub clamp_observation: bool,
    pub weights: WeightConfig,
}

impl Default for AdmmConfig {
    fn default() -> Self {
        AdmmConfig {
            n_iters: 8,
            denoiser: "identity".to_string(),
            clamp_observation: true,
            weights: WeightConfig::Fixed { rho: None },
        }
    }
}

impl AdmmConfig {
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let config: AdmmConfig =
            toml::from_str(data).map_err(|e| AdmmError::Config(e.to_string()))?;
        if let WeightConfig::Fixed { rho: Some(rho) } = &config.weights {
            if rho.len() != config.n_iters {
                return Err(AdmmError::Config(format!(
                    "{} fixed weights given for {} iterations",
                    rho.len(),
                    config.n_iters
                )));
            }
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| AdmmError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(AdmmConfig::from_toml_str("").unwrap(), AdmmConfig::default());
    }

    #[test]
    fn test_predicted_weights() {
        let config = AdmmConfig::from_toml_str(
            r#"
            n_iters = 4
            denoiser = "wavelet"

            [weights]
            mode = "predicted"
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.n_iters, 4);
        assert_eq!(config.denoiser, "wavelet");
        assert_eq!(
            config.weights,
            WeightConfig::Predicted {
                feature_size: 128,
                seed: 9
            }
        );
        assert!(config.clamp_observation);
    }

    #[test]
    fn test_fixed_weights_must_match_iterations() {
        let toml = r#"
            n_iters = 3
            [weights]
            mode = "fixed"
            rho = [1.0, 2.0]
        "#;
        assert!(matches!(
            AdmmConfig::from_toml_str(toml),
            Err(AdmmError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(AdmmConfig::from_toml_str("n_iters = \"many\"").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AdmmConfig {
            n_iters: 2,
            denoiser: "gaussian".to_string(),
            weights: WeightConfig::Fixed {
                rho: Some(vec![0.5, 4.0]),
            },
            clamp_observation: false,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(AdmmConfig::from_toml_str(&text).unwrap(), config);
    }
}
