//! Lightfield - factorization of 4D light fields for stacked attenuating displays.
//!
//! A light field sampled on two parallel planes is approximated by the
//! product of two mask stacks: a rear mask `W` (one row of weights per pixel)
//! and a front mask `H` (one column of weights per pixel). The ray leaving
//! rear pixel `i` through front pixel `j` is reproduced by
//! `sum_r W[i, r] * H[r, j]`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lightfield::{FactorizeConfig, LightField, Matrix, factorize};
//!
//! let light_field = LightField::from_fn([64, 64, 5, 5], |v, u, b, a| sample(v, u, b, a))?;
//! let n = light_field.pixel_count();
//! let rank = 3;
//!
//! let config = FactorizeConfig::default()
//!     .with_iterations(50)
//!     .with_min_psnr(35.0)
//!     .with_psnr_trace();
//! let result = factorize(
//!     &light_field,
//!     &Matrix::filled(n, rank, 0.5),
//!     &Matrix::filled(rank, n, 0.5),
//!     &config,
//! )?;
//!
//! for layer in result.rear_layers() {
//!     // hand each V x U layer to the display
//! }
//! ```

pub mod angular;
pub mod convergence;
pub mod engine;
mod error;
mod light_field;
mod matrix;

// ============================================================================
// Core types
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use light_field::{LightField, LightFieldDims};
pub use matrix::Matrix;

// ============================================================================
// Factorization
// ============================================================================

pub use engine::config::FactorizeConfig;
pub use engine::progress::{FactorizeProgress, FactorizeStage, ProgressCallback};
pub use engine::{Factorization, factorize, factorize_with_progress};

// ============================================================================
// Convergence
// ============================================================================

pub use convergence::{PsnrMonitor, reconstruct, reconstruction_error, reconstruction_psnr};
