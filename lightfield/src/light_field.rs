//! Read-only 4D light field tensor.

use crate::error::{Error, Result, check_samples};
use crate::matrix::Matrix;

/// Extents of a two-plane light field `(v, u, b, a)`.
///
/// `v`/`u` are spatial row/column indices, `b`/`a` the vertical/horizontal
/// angular indices. The angular extents are expected to be odd so that the
/// central sample `(half_b, half_a)` is the on-axis ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightFieldDims {
    pub spatial_rows: usize,
    pub spatial_cols: usize,
    pub angular_rows: usize,
    pub angular_cols: usize,
}

impl LightFieldDims {
    pub const fn new(
        spatial_rows: usize,
        spatial_cols: usize,
        angular_rows: usize,
        angular_cols: usize,
    ) -> Self {
        Self {
            spatial_rows,
            spatial_cols,
            angular_rows,
            angular_cols,
        }
    }

    /// Number of pixels in one spatial plane (`N = V * U`).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.spatial_rows * self.spatial_cols
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.pixel_count() * self.angular_rows * self.angular_cols
    }

    /// `sample_count` without wrapping; `None` if the product overflows.
    pub fn checked_sample_count(&self) -> Option<usize> {
        self.spatial_rows
            .checked_mul(self.spatial_cols)?
            .checked_mul(self.angular_rows)?
            .checked_mul(self.angular_cols)
    }

    /// Checks that every extent is non-zero and that the sample count fits in
    /// `usize`. Returns the sample count.
    pub fn validate(&self) -> Result<usize> {
        if self.to_array().contains(&0) {
            return Err(Error::EmptyDimensions {
                what: "Light field",
                dims: self.to_array().to_vec(),
            });
        }
        self.checked_sample_count()
            .ok_or_else(|| Error::SizeOverflow {
                what: "Light field",
                dims: self.to_array().to_vec(),
            })
    }

    /// Maximum vertical parallax in pixels, `(B - 1) / 2`.
    #[inline]
    pub fn half_angular_rows(&self) -> usize {
        self.angular_rows.saturating_sub(1) / 2
    }

    /// Maximum horizontal parallax in pixels, `(A - 1) / 2`.
    #[inline]
    pub fn half_angular_cols(&self) -> usize {
        self.angular_cols.saturating_sub(1) / 2
    }

    pub fn to_array(self) -> [usize; 4] {
        [
            self.spatial_rows,
            self.spatial_cols,
            self.angular_rows,
            self.angular_cols,
        ]
    }

    /// Checks that `rear` is `N x R` and `front` is `R x N` with non-negative
    /// finite entries. Returns the rank `R`.
    pub fn check_masks(&self, rear: &Matrix, front: &Matrix) -> Result<usize> {
        self.validate()?;

        let rank = rear.cols();
        if rank != front.rows() {
            return Err(Error::RankMismatch {
                rear_cols: rank,
                front_rows: front.rows(),
            });
        }
        if rank == 0 {
            return Err(Error::ZeroRank);
        }

        let n = self.pixel_count();
        if rear.rows() != n {
            return Err(Error::RearMaskShape {
                expected_rows: n,
                rank,
                rows: rear.rows(),
                cols: rear.cols(),
            });
        }
        if front.cols() != n {
            return Err(Error::FrontMaskShape {
                expected_cols: n,
                rank,
                rows: front.rows(),
                cols: front.cols(),
            });
        }

        check_samples("Rear mask", rear.data())?;
        check_samples("Front mask", front.data())?;

        Ok(rank)
    }

    #[inline]
    fn offset(&self, v: usize, u: usize, b: usize, a: usize) -> usize {
        debug_assert!(
            v < self.spatial_rows
                && u < self.spatial_cols
                && b < self.angular_rows
                && a < self.angular_cols
        );
        ((v * self.spatial_cols + u) * self.angular_rows + b) * self.angular_cols + a
    }
}

impl From<[usize; 4]> for LightFieldDims {
    fn from([v, u, b, a]: [usize; 4]) -> Self {
        Self::new(v, u, b, a)
    }
}

/// Non-negative 4D light field, stored row-major with `a` varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct LightField {
    data: Vec<f64>,
    dims: LightFieldDims,
}

impl LightField {
    /// Wraps `data` after checking the extents, the length and that every
    /// sample is finite and non-negative.
    pub fn new(dims: impl Into<LightFieldDims>, data: Vec<f64>) -> Result<Self> {
        let dims = dims.into();
        let expected = dims.validate()?;
        if data.len() != expected {
            return Err(Error::DataLength {
                what: "Light field",
                dims: dims.to_array().to_vec(),
                expected,
                actual: data.len(),
            });
        }
        check_samples("Light field", &data)?;

        Ok(Self { data, dims })
    }

    /// Builds a light field by evaluating `f(v, u, b, a)` for every sample.
    pub fn from_fn(
        dims: impl Into<LightFieldDims>,
        mut f: impl FnMut(usize, usize, usize, usize) -> f64,
    ) -> Result<Self> {
        let dims = dims.into();
        let mut data = Vec::with_capacity(dims.validate()?);
        for v in 0..dims.spatial_rows {
            for u in 0..dims.spatial_cols {
                for b in 0..dims.angular_rows {
                    for a in 0..dims.angular_cols {
                        data.push(f(v, u, b, a));
                    }
                }
            }
        }
        Self::new(dims, data)
    }

    pub fn filled(dims: impl Into<LightFieldDims>, value: f64) -> Result<Self> {
        let dims = dims.into();
        let len = dims.validate()?;
        Self::new(dims, vec![value; len])
    }

    /// Zero-valued light field. Used as the target of a reconstruction.
    pub(crate) fn zeros_unchecked(dims: LightFieldDims) -> Self {
        Self {
            data: vec![0.0; dims.sample_count()],
            dims,
        }
    }

    #[inline]
    pub fn dims(&self) -> LightFieldDims {
        self.dims
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.dims.pixel_count()
    }

    #[inline]
    pub fn get(&self, v: usize, u: usize, b: usize, a: usize) -> f64 {
        self.data[self.dims.offset(v, u, b, a)]
    }

    #[inline]
    pub(crate) fn set(&mut self, v: usize, u: usize, b: usize, a: usize, value: f64) {
        let offset = self.dims.offset(v, u, b, a);
        self.data[offset] = value;
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}
