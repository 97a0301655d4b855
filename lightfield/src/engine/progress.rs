//! Progress reporting for factorization.

use common::SharedFn;
use strum_macros::Display;

/// Progress information for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorizeProgress {
    /// Current iteration (1-based).
    pub iteration: usize,
    /// Iteration budget.
    pub total: usize,
    /// Reconstruction PSNR after this iteration, when evaluated.
    pub psnr: Option<f64>,
    pub stage: FactorizeStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FactorizeStage {
    /// An iteration of mask updates completed.
    Updating,
    /// The PSNR threshold was exceeded; no further iterations run.
    Stopped,
    /// The full iteration budget ran.
    Finished,
}

/// Callback type for progress reporting.
pub type ProgressCallback = SharedFn<dyn Fn(FactorizeProgress) + Send + Sync>;

/// Report progress using the callback if set.
pub fn report_progress(
    callback: &ProgressCallback,
    iteration: usize,
    total: usize,
    psnr: Option<f64>,
    stage: FactorizeStage,
) {
    if let Some(f) = callback.as_ref() {
        f(FactorizeProgress {
            iteration,
            total,
            psnr,
            stage,
        });
    }
}
