//! Error types for light field factorization.
//!
//! Every check runs before the first iteration, so an `Err` means no work
//! was done. Zero denominators during an update are not errors: the update
//! re-saturates the affected weight to 1.0.

use strum_macros::Display;
use thiserror::Error;

/// Coarse classification of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A dimensionality or size mismatch between the inputs.
    InvalidShape,
    /// A value or scalar argument outside its admissible domain.
    InvalidType,
}

/// Errors that can occur while validating factorization inputs.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("{what} dimensions must be non-zero, got {dims:?}")]
    EmptyDimensions { what: &'static str, dims: Vec<usize> },

    #[error("{what} data length mismatch for dimensions {dims:?}: expected {expected}, got {actual}")]
    DataLength {
        what: &'static str,
        dims: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("{what} size overflows for dimensions {dims:?}")]
    SizeOverflow { what: &'static str, dims: Vec<usize> },

    #[error("Number of columns in W ({rear_cols}) must equal number of rows in H ({front_rows})")]
    RankMismatch { rear_cols: usize, front_rows: usize },

    #[error("Mask rank must be at least 1")]
    ZeroRank,

    #[error("Rear masks W must have dimensions {expected_rows}x{rank}, got {rows}x{cols}")]
    RearMaskShape {
        expected_rows: usize,
        rank: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Front masks H must have dimensions {rank}x{expected_cols}, got {rows}x{cols}")]
    FrontMaskShape {
        expected_cols: usize,
        rank: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{what} element {index} must be a finite non-negative value, got {value}")]
    InvalidSample {
        what: &'static str,
        index: usize,
        value: f64,
    },

    #[error("Number of iterations must be positive")]
    ZeroIterations,

    #[error("Minimum PSNR (stopping criterion) must be a number, got {0}")]
    InvalidThreshold(f64),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyDimensions { .. }
            | Error::DataLength { .. }
            | Error::SizeOverflow { .. }
            | Error::RankMismatch { .. }
            | Error::ZeroRank
            | Error::RearMaskShape { .. }
            | Error::FrontMaskShape { .. } => ErrorKind::InvalidShape,
            Error::InvalidSample { .. } | Error::ZeroIterations | Error::InvalidThreshold(_) => {
                ErrorKind::InvalidType
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Rejects the first element that is negative, NaN or infinite.
pub(crate) fn check_samples(what: &'static str, data: &[f64]) -> Result<()> {
    match data
        .iter()
        .position(|&value| !value.is_finite() || value < 0.0)
    {
        Some(index) => Err(Error::InvalidSample {
            what,
            index,
            value: data[index],
        }),
        None => Ok(()),
    }
}
