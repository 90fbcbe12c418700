//! The unrolled ADMM controller.
//!
//! Every restoration runs a fixed number of iterations of
//!
//! ```text
//! x_i = argmin_x ||H x - y||^2 + rho_i ||x - (z_{i-1} - u_{i-1} / rho_i)||^2
//! z_i = D(x_i)
//! u_i = u_{i-1} + x_i - z_i
//! ```
//!
//! starting from the Wiener estimate `z_0 = init_l2(alpha)` and `u_0 = 0`, and returns `z_N`.

use crate::config::{AdmmConfig, WeightConfig};
use crate::data_container::ObservationBatch;
use crate::denoisers::{Denoiser, DenoiserRegistry};
use crate::error::{shape, AdmmError, Result};
use crate::predictor::{validate_schedule, FixedSchedule, SubNet, WeightPredictor};
use crate::solver::GaussianSolver;
use ndarray::{stack, Array1, Array2, Array3, ArrayView1, ArrayView3, Axis, Zip};
use rayon::prelude::*;

/// Where the per-iteration penalty weights come from.
#[derive(Debug)]
pub enum WeightSource {
    /// Conditioned on each sample's kernel and alpha.
    Predicted(Box<dyn WeightPredictor>),
    /// One schedule for the whole batch.
    Fixed(FixedSchedule),
}

impl WeightSource {
    pub fn n_iters(&self) -> usize {
        match self {
            WeightSource::Predicted(predictor) => predictor.n_iters(),
            WeightSource::Fixed(schedule) => schedule.n_iters(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WeightSource::Predicted(_) => "predicted",
            WeightSource::Fixed(_) => "fixed",
        }
    }

    /// `(batch, n_iters)` weights for the batch, validated to be strictly positive.
    fn schedule(&self, batch: &ObservationBatch) -> Result<Array2<f64>> {
        let weights = match self {
            WeightSource::Predicted(predictor) => {
                predictor.predict_weights(batch.kernels, batch.alpha)?
            }
            WeightSource::Fixed(schedule) => schedule.broadcast(batch.len())?,
        };
        let expected = (batch.len(), self.n_iters());
        if weights.dim() != expected {
            return Err(shape(format!(
                "weight schedule of {:?}, expected {:?}",
                weights.dim(),
                expected
            )));
        }
        validate_schedule(weights.view())?;
        Ok(weights)
    }
}

/// Iterates of one batch: primal `x`, auxiliary `z` and scaled dual `u`, each
/// `(batch, height, width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmmState {
    pub x: Array3<f64>,
    pub z: Array3<f64>,
    pub u: Array3<f64>,
}

/// Spectral setup and penalty weights of a validated batch.
///
/// Built once per restoration; the iterations only read from it.
#[derive(Debug)]
pub struct PreparedBatch {
    solvers: Vec<GaussianSolver>,
    alpha: Array1<f64>,
    schedule: Array2<f64>,
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// Per-sample weights, `(batch, n_iters)`.
    pub fn schedule(&self) -> &Array2<f64> {
        &self.schedule
    }

    pub fn solvers(&self) -> &[GaussianSolver] {
        &self.solvers
    }

    /// Initial state: `x = z = init_l2(alpha)` and `u = 0`.
    pub fn warm_start(&self) -> Result<AdmmState> {
        let images = self
            .solvers
            .par_iter()
            .zip(self.alpha.to_vec())
            .map(|(solver, alpha)| solver.init_l2(alpha))
            .collect::<Result<Vec<_>>>()?;
        let z = stack_images(&images)?;
        ensure_finite(&z, "warm start", 0)?;
        Ok(AdmmState {
            x: z.clone(),
            u: Array3::zeros(z.raw_dim()),
            z,
        })
    }
}

/// Per-iteration diagnostics of [`UnrolledAdmm::restore_with_trace`].
///
/// # Fields
/// - `iteration`: Zero-based iteration index.
/// - `rho`: Penalty weight used for each sample.
/// - `z`: The denoised iterate after this iteration.
/// - `step_norm`: Per-sample `||x_i - z_{i-1}||`.
/// - `consensus_residual`: Per-sample `||x_i - z_i||`.
#[derive(Clone, Debug)]
pub struct IterationRecord {
    pub iteration: usize,
    pub rho: Array1<f64>,
    pub z: Array3<f64>,
    pub step_norm: Array1<f64>,
    pub consensus_residual: Array1<f64>,
}

/// Deconvolution by a fixed number of ADMM iterations with a pluggable denoiser.
#[derive(Debug)]
pub struct UnrolledAdmm {
    n_iters: usize,
    denoiser: Box<dyn Denoiser>,
    weights: WeightSource,
    clamp_observation: bool,
}

impl UnrolledAdmm {
    /// # Errors
    /// `AdmmError::InvalidInput` if the weight source does not provide `n_iters` weights.
    pub fn new(n_iters: usize, denoiser: Box<dyn Denoiser>, weights: WeightSource) -> Result<Self> {
        if weights.n_iters() != n_iters {
            return Err(AdmmError::InvalidInput(format!(
                "{} weight source yields {} weights for {} iterations",
                weights.label(),
                weights.n_iters(),
                n_iters
            )));
        }
        Ok(UnrolledAdmm {
            n_iters,
            denoiser,
            weights,
            clamp_observation: true,
        })
    }

    /// Fixed all-ones schedule, the untrained starting point of the shared-weight mode.
    pub fn with_unit_weights(n_iters: usize, denoiser: Box<dyn Denoiser>) -> Self {
        UnrolledAdmm {
            n_iters,
            denoiser,
            weights: WeightSource::Fixed(FixedSchedule::ones(n_iters)),
            clamp_observation: true,
        }
    }

    /// Builds a controller with a registered denoiser and the configured weight source.
    pub fn from_config(config: &AdmmConfig) -> Result<Self> {
        let denoiser = DenoiserRegistry::create(&config.denoiser)?;
        let weights = match &config.weights {
            WeightConfig::Predicted { feature_size, seed } => WeightSource::Predicted(Box::new(
                SubNet::seeded(config.n_iters, *feature_size, *seed)?,
            )),
            WeightConfig::Fixed { rho: None } => {
                WeightSource::Fixed(FixedSchedule::ones(config.n_iters))
            }
            WeightConfig::Fixed { rho: Some(rho) } => {
                WeightSource::Fixed(FixedSchedule::new(Array1::from(rho.clone()))?)
            }
        };
        Ok(UnrolledAdmm::new(config.n_iters, denoiser, weights)?
            .with_clamped_observation(config.clamp_observation))
    }

    /// Whether negative observed values are clamped to zero before the spectra are computed.
    pub fn with_clamped_observation(mut self, clamp: bool) -> Self {
        self.clamp_observation = clamp;
        self
    }

    pub fn n_iters(&self) -> usize {
        self.n_iters
    }

    pub fn denoiser(&self) -> &dyn Denoiser {
        self.denoiser.as_ref()
    }

    pub fn weight_source(&self) -> &WeightSource {
        &self.weights
    }

    /// Restores a batch of blurred observations.
    ///
    /// # Arguments
    /// - `observed`: `(batch, height, width)` observations.
    /// - `kernels`: `(batch, kh, kw)` PSFs, no larger than the images.
    /// - `alpha`: Per-sample inverse noise level, finite and `> 0`.
    ///
    /// # Returns
    /// The final denoised iterate `z_N`, same shape as `observed`.
    pub fn restore(
        &self,
        observed: ArrayView3<f64>,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
    ) -> Result<Array3<f64>> {
        self.run(observed, kernels, alpha, None)
    }

    /// Like [`UnrolledAdmm::restore`], also returning one record per iteration.
    pub fn restore_with_trace(
        &self,
        observed: ArrayView3<f64>,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
    ) -> Result<(Array3<f64>, Vec<IterationRecord>)> {
        let mut trace = Vec::with_capacity(self.n_iters);
        let z = self.run(observed, kernels, alpha, Some(&mut trace))?;
        Ok((z, trace))
    }

    /// Validates the batch and computes every spectrum and the weight schedule.
    pub fn prepare(
        &self,
        observed: ArrayView3<f64>,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
    ) -> Result<PreparedBatch> {
        let batch = ObservationBatch::new(observed.view(), kernels.view(), alpha)?;
        let observed = if self.clamp_observation {
            batch.clamped_observed()
        } else {
            batch.observed.to_owned()
        };
        let solvers = observed
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(batch.kernels.axis_iter(Axis(0)))
            .map(|(y, k)| GaussianSolver::new(y, k))
            .collect::<Result<Vec<_>>>()?;
        let schedule = self.weights.schedule(&batch)?;
        Ok(PreparedBatch {
            solvers,
            alpha: alpha.clone(),
            schedule,
        })
    }

    /// One ADMM iteration with per-sample weights `rho`.
    ///
    /// # Errors
    /// - `AdmmError::Shape` if the state does not match the batch or the denoiser changes the
    ///   shape.
    /// - `AdmmError::NonFinite` if the x-update or the denoiser produces NaN or infinity.
    pub fn step(
        &self,
        prepared: &PreparedBatch,
        state: AdmmState,
        rho: ArrayView1<f64>,
        iteration: usize,
    ) -> Result<AdmmState> {
        let AdmmState { z, mut u, .. } = state;
        if z.len_of(Axis(0)) != prepared.len() || rho.len() != prepared.len() {
            return Err(shape(format!(
                "state of {} samples and {} weights for a batch of {}",
                z.len_of(Axis(0)),
                rho.len(),
                prepared.len()
            )));
        }
        let images = prepared
            .solvers
            .par_iter()
            .enumerate()
            .map(|(b, solver)| {
                solver.solve(
                    z.index_axis(Axis(0), b),
                    u.index_axis(Axis(0), b),
                    rho[b],
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let x = stack_images(&images)?;
        ensure_finite(&x, "x-update", iteration)?;

        let z = self.denoiser.denoise(x.view());
        if z.dim() != x.dim() {
            return Err(shape(format!(
                "denoiser '{}' returned {:?} for input {:?}",
                self.denoiser.config().name,
                z.dim(),
                x.dim()
            )));
        }
        ensure_finite(&z, "denoiser", iteration)?;

        Zip::from(&mut u)
            .and(&x)
            .and(&z)
            .for_each(|u, &x, &z| *u += x - z);
        Ok(AdmmState { x, z, u })
    }

    fn run(
        &self,
        observed: ArrayView3<f64>,
        kernels: ArrayView3<f64>,
        alpha: &Array1<f64>,
        mut trace: Option<&mut Vec<IterationRecord>>,
    ) -> Result<Array3<f64>> {
        let prepared = self.prepare(observed, kernels, alpha)?;
        log::info!(
            "restoring {} image(s) of {:?} with {} iteration(s), {} weights, denoiser '{}'",
            prepared.len(),
            prepared.solvers.first().map(|s| s.image_shape()).unwrap_or((0, 0)),
            self.n_iters,
            self.weights.label(),
            self.denoiser.config().name
        );

        let mut state = prepared.warm_start()?;
        for iteration in 0..self.n_iters {
            let rho = prepared.schedule.column(iteration);
            let previous_z = trace.as_ref().map(|_| state.z.clone());
            state = self.step(&prepared, state, rho, iteration)?;

            if log::log_enabled!(log::Level::Debug) || trace.is_some() {
                let consensus = per_sample_distance(&state.x, &state.z);
                log::debug!(
                    "iteration {}: mean rho {:.4e}, max consensus residual {:.4e}",
                    iteration,
                    rho.mean().unwrap_or(0.0),
                    consensus.fold(0.0_f64, |m, &v| m.max(v))
                );
                if let (Some(records), Some(previous_z)) = (trace.as_deref_mut(), previous_z) {
                    records.push(IterationRecord {
                        iteration,
                        rho: rho.to_owned(),
                        z: state.z.clone(),
                        step_norm: per_sample_distance(&state.x, &previous_z),
                        consensus_residual: consensus,
                    });
                }
            }
        }
        Ok(state.z)
    }
}

fn stack_images(images: &[Array2<f64>]) -> Result<Array3<f64>> {
    let views: Vec<_> = images.iter().map(|image| image.view()).collect();
    stack(Axis(0), &views).map_err(|e| shape(e.to_string()))
}

fn ensure_finite(a: &Array3<f64>, stage: &'static str, iteration: usize) -> Result<()> {
    if a.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(AdmmError::NonFinite { stage, iteration })
    }
}

/// Frobenius norm of `a - b` for every sample.
fn per_sample_distance(a: &Array3<f64>, b: &Array3<f64>) -> Array1<f64> {
    a.axis_iter(Axis(0))
        .zip(b.axis_iter(Axis(0)))
        .map(|(a, b)| {
            Zip::from(&a)
                .and(&b)
                .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
                .sqrt()
        })
        .collect()
}
