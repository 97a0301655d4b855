//! Factorization configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameters of one factorization call.
///
/// # Examples
///
/// ```ignore
/// use lightfield::{FactorizeConfig, factorize};
///
/// // 20 iterations, stop as soon as the reconstruction exceeds 35 dB
/// let config = FactorizeConfig::default()
///     .with_iterations(20)
///     .with_min_psnr(35.0)
///     .with_psnr_trace();
/// let result = factorize(&light_field, &rear, &front, &config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorizeConfig {
    /// Iteration budget. Must be positive.
    pub iterations: usize,
    /// Keep the front mask fixed and only update the rear mask.
    pub fix_front: bool,
    /// Stop once the reconstruction PSNR (dB) exceeds this value.
    /// `None` disables early stopping.
    pub min_psnr: Option<f64>,
    /// Return the per-iteration PSNR trace.
    pub track_psnr: bool,
    /// Emit a progress notice every `log_interval` iterations (0 = never).
    pub log_interval: usize,
}

impl Default for FactorizeConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            fix_front: false,
            min_psnr: None,
            track_psnr: false,
            log_interval: 10,
        }
    }
}

impl FactorizeConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_fixed_front(mut self) -> Self {
        self.fix_front = true;
        self
    }

    pub fn with_min_psnr(mut self, min_psnr: f64) -> Self {
        self.min_psnr = Some(min_psnr);
        self
    }

    pub fn with_psnr_trace(mut self) -> Self {
        self.track_psnr = true;
        self
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval;
        self
    }

    /// PSNR is computed when a trace is requested or a threshold is set.
    #[inline]
    pub fn evaluates_psnr(&self) -> bool {
        self.track_psnr || self.min_psnr.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::ZeroIterations);
        }
        if let Some(min_psnr) = self.min_psnr.filter(|v| v.is_nan()) {
            return Err(Error::InvalidThreshold(min_psnr));
        }
        Ok(())
    }
}
