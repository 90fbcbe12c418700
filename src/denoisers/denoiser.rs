//! This module provides the `Denoiser` trait and a global, thread-safe registry of named
//! denoisers that can be selected from an `AdmmConfig`.

use crate::error::{invalid, Result};
use ndarray::{stack, Array2, Array3, ArrayView2, ArrayView3, Axis};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;

/// An image-to-image operator applied once per ADMM iteration.
///
/// Implementations must:
/// - preserve the `(batch, height, width)` shape,
/// - be deterministic for fixed parameters,
/// - not keep state between calls that the controller could observe.
///
/// The controller makes no other assumption, so a learned network, a classical filter or the
/// identity can be swapped freely.
///
/// To add a classical denoiser to the registry, derive `Clone` and `Debug` and annotate the
/// struct with `#[register_denoiser]`:
///
/// ```ignore
/// #[register_denoiser]
/// #[derive(Clone, Debug)]
/// pub struct MedianDenoiser {
///     pub radius: usize,
/// }
///
/// impl Denoiser for MedianDenoiser {
///     fn new() -> Self { MedianDenoiser { radius: 1 } }
///
///     fn config(&self) -> DenoiserConfig {
///         DenoiserConfig {
///             name: "median".to_string(),
///             description: "Sliding-window median.".to_string(),
///         }
///     }
///
///     fn denoise(&self, batch: ArrayView3<f64>) -> Array3<f64> {
///         map_images(batch, |image| median(image, self.radius))
///     }
/// }
/// ```
pub trait Denoiser: Send + Sync + Debug + CloneBoxedDenoiser {
    /// Creates the denoiser with its default parameters.
    fn new() -> Self
    where
        Self: Sized;

    /// Returns the name and description under which the denoiser is registered.
    fn config(&self) -> DenoiserConfig;

    /// Denoises every image of the batch.
    fn denoise(&self, batch: ArrayView3<f64>) -> Array3<f64>;
}

/// Metadata of a denoiser.
///
/// # Fields
/// - `name`: The registry key, also used in configuration files.
/// - `description`: What the denoiser does.
#[derive(Debug, Clone)]
pub struct DenoiserConfig {
    pub name: String,
    pub description: String,
}

/// A trait to allow cloning of boxed denoisers.
pub trait CloneBoxedDenoiser {
    fn clone_box(&self) -> Box<dyn Denoiser>;
}

impl<T> CloneBoxedDenoiser for T
where
    T: 'static + Denoiser + Clone,
{
    fn clone_box(&self) -> Box<dyn Denoiser> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Denoiser> {
    fn clone(&self) -> Box<dyn Denoiser> {
        self.as_ref().clone_box()
    }
}

/// Applies a per-image operator to every image of a batch in parallel and stacks the results.
///
/// `f` must return an image of the same shape as its input.
pub fn map_images<F>(batch: ArrayView3<f64>, f: F) -> Array3<f64>
where
    F: Fn(ArrayView2<f64>) -> Array2<f64> + Sync + Send,
{
    let images: Vec<Array2<f64>> = batch
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(&f)
        .collect();
    let views: Vec<ArrayView2<f64>> = images.iter().map(|image| image.view()).collect();
    match stack(Axis(0), &views) {
        Ok(stacked) => stacked,
        // only reachable with an empty batch
        Err(_) => Array3::zeros(batch.raw_dim()),
    }
}

/// Global registry of denoiser prototypes, keyed by `DenoiserConfig::name`.
pub static DENOISER_REGISTRY: Lazy<Mutex<DenoiserRegistry>> = Lazy::new(|| {
    Mutex::new(DenoiserRegistry {
        denoisers: HashMap::new(),
    })
});

/// A registry to manage and retrieve registered denoisers.
///
/// Denoisers annotated with `#[register_denoiser]` are inserted at program start. Lookups
/// return clones of the stored prototypes, so callers never share state through the registry.
#[derive(Debug)]
pub struct DenoiserRegistry {
    pub denoisers: HashMap<String, Box<dyn Denoiser>>,
}

impl DenoiserRegistry {
    /// Registers a default-configured instance of `D` under its configured name.
    pub fn register_denoiser<D: Denoiser + 'static>() {
        let denoiser = D::new();
        let name = denoiser.config().name;
        match DENOISER_REGISTRY.lock() {
            Ok(mut registry) => {
                registry.denoisers.insert(name, Box::new(denoiser));
            }
            Err(err) => log::error!("denoiser registry poisoned, cannot register {name}: {err}"),
        }
    }

    /// Retrieves a registered denoiser by name.
    pub fn get_denoiser(&self, name: &str) -> Option<&dyn Denoiser> {
        self.denoisers.get(name).map(|d| d.as_ref())
    }

    /// Clones the prototype registered under `name` out of the global registry.
    ///
    /// # Errors
    /// `AdmmError::InvalidInput` if no denoiser with that name is registered.
    pub fn create(name: &str) -> Result<Box<dyn Denoiser>> {
        let registry = DENOISER_REGISTRY
            .lock()
            .map_err(|_| invalid("denoiser registry poisoned"))?;
        registry
            .get_denoiser(name)
            .map(|d| d.clone_box())
            .ok_or_else(|| {
                let mut known: Vec<&str> = registry.denoisers.keys().map(|k| k.as_str()).collect();
                known.sort_unstable();
                invalid(format!("unknown denoiser '{}', registered: {:?}", name, known))
            })
    }

    /// Sorted names of all registered denoisers.
    pub fn names() -> Vec<String> {
        let mut names: Vec<String> = DENOISER_REGISTRY
            .lock()
            .map(|registry| registry.denoisers.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl<'a> IntoIterator for &'a DenoiserRegistry {
    type Item = &'a Box<dyn Denoiser>;
    type IntoIter = std::collections::hash_map::Values<'a, String, Box<dyn Denoiser>>;

    fn into_iter(self) -> Self::IntoIter {
        self.denoisers.values()
    }
}
