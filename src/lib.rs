//! Image deconvolution by an unrolled ADMM with a closed-form Gaussian data step, a pluggable
//! denoiser and per-iteration penalty weights that are either predicted from the blur kernel or
//! shared across the batch.
//!
//! ```no_run
//! use ndarray::{Array1, Array3};
//! use unrolled_admm::{AdmmConfig, UnrolledAdmm};
//!
//! let admm = UnrolledAdmm::from_config(&AdmmConfig::default())?;
//! let observed = Array3::<f64>::zeros((1, 64, 64));
//! let kernels = Array3::<f64>::from_elem((1, 5, 5), 1.0 / 25.0);
//! let restored = admm.restore(observed.view(), kernels.view(), &Array1::ones(1))?;
//! # Ok::<(), unrolled_admm::AdmmError>(())
//! ```

pub mod admm;
pub mod config;
pub mod data_container;
pub mod denoisers;
pub mod error;
pub mod predictor;
pub mod solver;
pub mod spectral;

pub use admm::{AdmmState, IterationRecord, PreparedBatch, UnrolledAdmm, WeightSource};
pub use config::{AdmmConfig, WeightConfig};
pub use data_container::{estimate_alpha, estimate_alpha_batch, ObservationBatch};
pub use denoisers::{Denoiser, DenoiserConfig, DenoiserRegistry};
pub use error::{AdmmError, Result};
pub use predictor::{FixedSchedule, SubNet, SubNetParams, WeightPredictor};
pub use solver::GaussianSolver;
pub use spectral::blur;
