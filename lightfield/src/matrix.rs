//! Dense row-major matrix used for the rear and front mask stacks.

use std::ops::{Index, IndexMut};

use crate::error::{Error, Result};

/// Dense row-major `f64` matrix.
///
/// The rear mask `W` is stored as `N x R` (one row per spatial pixel) and the
/// front mask `H` as `R x N` (one column per spatial pixel).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| Error::SizeOverflow {
            what: "Matrix",
            dims: vec![rows, cols],
        })?;
        if data.len() != expected {
            return Err(Error::DataLength {
                what: "Matrix",
                dims: vec![rows, cols],
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: vec![value; element_count(rows, cols)],
            rows,
            cols,
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(element_count(rows, cols));
        for row in 0..rows {
            for col in 0..cols {
                data.push(f(row, col));
            }
        }
        Self { data, rows, cols }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col] = value;
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(self.shape(), other.shape(), "matrix shape mismatch");
        self.data.copy_from_slice(&other.data);
    }

    /// Reshapes column `col` into an `image_rows x image_cols` matrix.
    pub fn column_image(&self, col: usize, image_rows: usize, image_cols: usize) -> Matrix {
        assert_eq!(self.rows, image_rows * image_cols, "column length mismatch");
        Matrix::from_fn(image_rows, image_cols, |r, c| self.get(r * image_cols + c, col))
    }

    /// Reshapes row `row` into an `image_rows x image_cols` matrix.
    pub fn row_image(&self, row: usize, image_rows: usize, image_cols: usize) -> Matrix {
        assert_eq!(self.cols, image_rows * image_cols, "row length mismatch");
        let start = row * self.cols;
        Matrix {
            data: self.data[start..start + self.cols].to_vec(),
            rows: image_rows,
            cols: image_cols,
        }
    }
}

fn element_count(rows: usize, cols: usize) -> usize {
    rows.checked_mul(cols)
        .unwrap_or_else(|| panic!("matrix size {rows}x{cols} overflows usize"))
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.data[row * self.cols + col]
    }
}

impl From<Matrix> for Vec<f64> {
    fn from(matrix: Matrix) -> Self {
        matrix.data
    }
}
