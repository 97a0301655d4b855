//! Reconstruction quality and early stopping.
//!
//! Only rays whose front-mask partner lies inside the spatial plane take part
//! in the error: a ray that exits the plane does not exist for that pixel
//! pair, so it is skipped rather than compared against zero.


use crate::angular::AngularGeometry;
use crate::error::Result;
use crate::light_field::{LightField, LightFieldDims};
use crate::matrix::Matrix;

/// Radiance of the ray from rear pixel `i` through front pixel `j`:
/// `sum_r W[i, r] * H[r, j]`.
#[inline]
pub(crate) fn ray_value(rear: &Matrix, front: &Matrix, i: usize, j: usize) -> f64 {
    (0..rear.cols())
        .map(|r| rear.get(i, r) * front.get(r, j))
        .sum()
}

/// Reconstruction PSNR in dB: `10 * log10(max^2 / mse)`, where `max` is the
/// largest light field value among the included rays.
///
/// A perfect reconstruction yields `+inf`; an all-zero light field that is
/// reconstructed exactly yields NaN.
pub fn reconstruction_psnr(light_field: &LightField, rear: &Matrix, front: &Matrix) -> Result<f64> {
    light_field.dims().check_masks(rear, front)?;
    Ok(psnr_unchecked(light_field, rear, front))
}

pub(crate) fn psnr_unchecked(light_field: &LightField, rear: &Matrix, front: &Matrix) -> f64 {
    let dims = light_field.dims();
    let geometry = AngularGeometry::new(dims);
    let grid = geometry.grid();

    let mut squared_error = 0.0;
    let mut max_value: f64 = 0.0;
    let mut count = 0usize;

    for b in 0..dims.angular_rows {
        for a in 0..dims.angular_cols {
            for v in 0..dims.spatial_rows {
                for u in 0..dims.spatial_cols {
                    let i = grid.linear(v, u);
                    let Some(j) = geometry.ray_partner(i, b, a) else {
                        continue;
                    };
                    let observed = light_field.get(v, u, b, a);
                    let diff = observed - ray_value(rear, front, i, j);
                    squared_error += diff * diff;
                    max_value = max_value.max(observed);
                    count += 1;
                }
            }
        }
    }

    let mse = squared_error / count as f64;
    10.0 * (max_value * max_value / mse).log10()
}

/// Light field produced by displaying `rear` behind `front`.
///
/// Rays that leave the spatial plane are set to zero.
pub fn reconstruct(dims: LightFieldDims, rear: &Matrix, front: &Matrix) -> Result<LightField> {
    dims.check_masks(rear, front)?;

    let geometry = AngularGeometry::new(dims);
    let grid = geometry.grid();
    let mut result = LightField::zeros_unchecked(dims);

    for v in 0..dims.spatial_rows {
        for u in 0..dims.spatial_cols {
            let i = grid.linear(v, u);
            for b in 0..dims.angular_rows {
                for a in 0..dims.angular_cols {
                    if let Some(j) = geometry.ray_partner(i, b, a) {
                        result.set(v, u, b, a, ray_value(rear, front, i, j));
                    }
                }
            }
        }
    }

    Ok(result)
}

/// Sum of squared differences over the rays that take part in the PSNR.
pub fn reconstruction_error(
    light_field: &LightField,
    rear: &Matrix,
    front: &Matrix,
) -> Result<f64> {
    let dims = light_field.dims();
    let approx = reconstruct(dims, rear, front)?;
    let geometry = AngularGeometry::new(dims);
    let grid = geometry.grid();

    let mut total = 0.0;
    for v in 0..dims.spatial_rows {
        for u in 0..dims.spatial_cols {
            let i = grid.linear(v, u);
            for b in 0..dims.angular_rows {
                for a in 0..dims.angular_cols {
                    if geometry.ray_partner(i, b, a).is_some() {
                        let diff = light_field.get(v, u, b, a) - approx.get(v, u, b, a);
                        total += diff * diff;
                    }
                }
            }
        }
    }
    Ok(total)
}

/// Per-iteration PSNR record with a strict `psnr > threshold` stop rule.
#[derive(Debug, Clone)]
pub struct PsnrMonitor {
    threshold: Option<f64>,
    budget: usize,
    trace: Vec<f64>,
}

impl PsnrMonitor {
    pub fn new(budget: usize, threshold: Option<f64>) -> Self {
        Self {
            threshold,
            budget,
            trace: Vec::with_capacity(budget),
        }
    }

    /// Records the PSNR of the next iteration. Returns `true` when it exceeds
    /// the threshold and iteration must stop.
    pub fn record(&mut self, psnr: f64) -> bool {
        debug_assert!(self.trace.len() < self.budget);
        self.trace.push(psnr);
        self.threshold.is_some_and(|threshold| psnr > threshold)
    }

    pub fn last(&self) -> Option<f64> {
        self.trace.last().copied()
    }

    pub fn recorded(&self) -> usize {
        self.trace.len()
    }

    /// The trace, padded to the iteration budget with the last value.
    pub fn into_trace(mut self) -> Vec<f64> {
        if let Some(last) = self.last() {
            self.trace.resize(self.budget, last);
        }
        self.trace
    }
}
