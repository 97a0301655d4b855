//! Alternating multiplicative-update factorization.
//!
//! Each iteration updates the front mask `H` and then the rear mask `W`:
//!
//! ```text
//! H[r, j] <- H[r, j] * sum_i W[i, r] * L(i, j) / sum_i W[i, r] * (W H)(i, j)
//! W[i, r] <- W[i, r] * sum_j H[r, j] * L(i, j) / sum_j H[r, j] * (W H)(i, j)
//! ```
//!
//! where `i`/`j` range over the rear/front pixels that share a ray (see
//! [`crate::angular`]) and `L(i, j)` is the light field sample of that ray.
//! Both phases read from snapshots: the front phase from the masks as they
//! were at the start of the iteration, the rear phase from the same rear
//! snapshot and the freshly updated front mask.
//!
//! After each phase every weight is clamped to at most 1 and NaN (a zero
//! denominator) is replaced by 1, re-saturating that weight.

pub mod config;
pub mod progress;

#[cfg(test)]
mod tests;

use crate::angular::AngularGeometry;
use crate::convergence::{PsnrMonitor, psnr_unchecked, ray_value};
use crate::error::Result;
use crate::light_field::{LightField, LightFieldDims};
use crate::matrix::Matrix;

use config::FactorizeConfig;
use progress::{FactorizeStage, ProgressCallback, report_progress};

/// Masks produced by [`factorize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Factorization {
    /// Rear masks `W`, `N x R`.
    pub rear: Matrix,
    /// Front masks `H`, `R x N`.
    pub front: Matrix,
    /// PSNR after each iteration, padded to the iteration budget when
    /// stopped early. Only present when `track_psnr` was requested.
    pub psnr: Option<Vec<f64>>,
    /// Number of iterations whose updates were applied.
    pub iterations_run: usize,
    dims: LightFieldDims,
}

impl Factorization {
    pub fn rank(&self) -> usize {
        self.rear.cols()
    }

    /// Rear mask layers as `V x U` images, one per factor.
    pub fn rear_layers(&self) -> Vec<Matrix> {
        (0..self.rank())
            .map(|r| {
                self.rear
                    .column_image(r, self.dims.spatial_rows, self.dims.spatial_cols)
            })
            .collect()
    }

    /// Front mask layers as `V x U` images, one per factor.
    pub fn front_layers(&self) -> Vec<Matrix> {
        (0..self.rank())
            .map(|r| {
                self.front
                    .row_image(r, self.dims.spatial_rows, self.dims.spatial_cols)
            })
            .collect()
    }
}

/// Factorize `light_field` into rear and front mask stacks.
///
/// `rear` (`N x R`) and `front` (`R x N`) are the initial masks; they are
/// copied and never modified. All inputs are validated before the first
/// iteration.
///
/// # Errors
///
/// Returns an error if:
/// - the mask ranks differ or are zero
/// - a mask does not match the light field's pixel count
/// - a mask entry is negative or not finite
/// - the iteration budget is zero or the PSNR threshold is NaN
pub fn factorize(
    light_field: &LightField,
    rear: &Matrix,
    front: &Matrix,
    config: &FactorizeConfig,
) -> Result<Factorization> {
    factorize_with_progress(light_field, rear, front, config, ProgressCallback::default())
}

/// Same as [`factorize`] but reports every iteration to `progress`.
pub fn factorize_with_progress(
    light_field: &LightField,
    rear: &Matrix,
    front: &Matrix,
    config: &FactorizeConfig,
    progress: ProgressCallback,
) -> Result<Factorization> {
    let dims = light_field.dims();
    let rank = config
        .validate()
        .and_then(|()| dims.check_masks(rear, front))
        .inspect_err(|e| tracing::debug!(error = %e, "Rejected factorization input"))?;

    tracing::info!(
        dims = ?dims.to_array(),
        rank,
        iterations = config.iterations,
        fix_front = config.fix_front,
        min_psnr = ?config.min_psnr,
        "Factorizing light field"
    );

    let total = config.iterations;
    let mut engine = UpdateEngine::new(light_field, rear, front);
    let mut monitor = config
        .evaluates_psnr()
        .then(|| PsnrMonitor::new(total, config.min_psnr));
    let mut iterations_run = 0;
    let mut stopped = false;

    for iteration in 0..total {
        if config.log_interval > 0 && iteration % config.log_interval == 0 {
            match monitor.as_ref().and_then(PsnrMonitor::last) {
                Some(psnr) => tracing::info!(
                    "Updating for iteration #{:03} (PSNR = {:4.1} dB)",
                    iteration + 1,
                    psnr
                ),
                None => tracing::info!("Updating for iteration #{:03}", iteration + 1),
            }
        }

        engine.iterate(config.fix_front);
        iterations_run = iteration + 1;

        let Some(monitor) = monitor.as_mut() else {
            report_progress(&progress, iterations_run, total, None, FactorizeStage::Updating);
            continue;
        };

        let psnr = psnr_unchecked(light_field, &engine.rear, &engine.front);
        if monitor.record(psnr) {
            tracing::info!(
                "Stopping at iteration #{:03} (PSNR = {:4.1} dB > {:4.1} dB)",
                iterations_run,
                psnr,
                config.min_psnr.unwrap_or(f64::INFINITY)
            );
            report_progress(&progress, iterations_run, total, Some(psnr), FactorizeStage::Stopped);
            stopped = true;
            break;
        }
        report_progress(&progress, iterations_run, total, Some(psnr), FactorizeStage::Updating);
    }

    if !stopped {
        let last = monitor.as_ref().and_then(PsnrMonitor::last);
        report_progress(&progress, iterations_run, total, last, FactorizeStage::Finished);
    }

    let psnr = if config.track_psnr {
        monitor.map(PsnrMonitor::into_trace)
    } else {
        None
    };

    Ok(Factorization {
        rear: engine.rear,
        front: engine.front,
        psnr,
        iterations_run,
        dims,
    })
}

/// One ray shared by the pixel being updated and a partner pixel.
#[derive(Debug, Clone, Copy)]
struct Ray {
    /// Partner pixel on the opposite mask.
    partner: usize,
    /// Light field sample of the ray.
    observed: f64,
    /// Current reconstruction of the ray from the snapshots.
    reconstructed: f64,
}

/// Live masks plus the snapshots the update rules read from.
struct UpdateEngine<'a> {
    light_field: &'a LightField,
    geometry: AngularGeometry,
    rank: usize,
    rear: Matrix,
    front: Matrix,
    rear_prev: Matrix,
    front_prev: Matrix,
    rays: Vec<Ray>,
}

impl<'a> UpdateEngine<'a> {
    fn new(light_field: &'a LightField, rear: &Matrix, front: &Matrix) -> Self {
        let geometry = AngularGeometry::new(light_field.dims());
        Self {
            light_field,
            geometry,
            rank: rear.cols(),
            rear: rear.clone(),
            front: front.clone(),
            rear_prev: rear.clone(),
            front_prev: front.clone(),
            rays: Vec::new(),
        }
    }

    fn iterate(&mut self, fix_front: bool) {
        self.rear_prev.copy_from(&self.rear);
        self.front_prev.copy_from(&self.front);

        if !fix_front {
            self.update_front();
            let degenerate = sanitize(&mut self.front);
            if degenerate > 0 {
                tracing::debug!(degenerate, "Front mask weights re-saturated");
            }
        }

        self.front_prev.copy_from(&self.front);

        self.update_rear();
        let degenerate = sanitize(&mut self.rear);
        if degenerate > 0 {
            tracing::debug!(degenerate, "Rear mask weights re-saturated");
        }
    }

    /// Fills `rays` with every ray through `pixel`. `pixel` lies on the
    /// front mask when `pixel_is_front`, on the rear mask otherwise.
    fn collect_rays(&mut self, pixel: usize, pixel_is_front: bool) {
        let grid = self.geometry.grid();
        self.rays.clear();

        for partner in self.geometry.neighborhood(pixel).iter() {
            let (rear_pixel, front_pixel) = if pixel_is_front {
                (partner, pixel)
            } else {
                (pixel, partner)
            };
            let (b, a) = self.geometry.ray_slice(rear_pixel, front_pixel);
            let (v, u) = grid.decompose(rear_pixel);

            self.rays.push(Ray {
                partner,
                observed: self.light_field.get(v, u, b, a),
                reconstructed: ray_value(&self.rear_prev, &self.front_prev, rear_pixel, front_pixel),
            });
        }
    }

    fn update_front(&mut self) {
        for j in 0..self.geometry.grid().len() {
            self.collect_rays(j, true);

            for r in 0..self.rank {
                let mut num = 0.0;
                let mut den = 0.0;
                for ray in &self.rays {
                    let weight = self.rear_prev.get(ray.partner, r);
                    num += weight * ray.observed;
                    den += weight * ray.reconstructed;
                }
                self.front.set(r, j, self.front_prev.get(r, j) * (num / den));
            }
        }
    }

    fn update_rear(&mut self) {
        for i in 0..self.geometry.grid().len() {
            self.collect_rays(i, false);

            for r in 0..self.rank {
                let mut num = 0.0;
                let mut den = 0.0;
                for ray in &self.rays {
                    let weight = self.front_prev.get(r, ray.partner);
                    num += weight * ray.observed;
                    den += weight * ray.reconstructed;
                }
                self.rear.set(i, r, self.rear_prev.get(i, r) * (num / den));
            }
        }
    }
}

/// Clamps every weight to at most 1 and replaces NaN with 1.
/// Returns the number of NaN entries replaced.
fn sanitize(mask: &mut Matrix) -> usize {
    let mut degenerate = 0;
    for value in mask.data_mut() {
        if value.is_nan() {
            *value = 1.0;
            degenerate += 1;
        } else if *value > 1.0 {
            *value = 1.0;
        }
    }
    degenerate
}
