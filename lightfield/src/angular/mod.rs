//! Mapping between spatial pixels and angular light field samples.
//!
//! Pixels are linearized row-major over the `V x U` spatial plane:
//! `i = row * U + col`. The same layout addresses the rows of the rear mask,
//! the columns of the front mask and the spatial axes of the light field.
//!
//! A ray is identified by the rear-mask pixel `(v, u)` it leaves and the
//! front-mask pixel `(t, s)` it passes through. It is recorded in the light
//! field at the rear pixel's spatial coordinates and the angular slice
//! `(b, a)` given by [`flipped_angle`] on each axis. For odd extents this is
//! `a = s - u + half_a` and `b = t - v + half_b`.


use crate::light_field::LightFieldDims;

/// Spatial plane of `rows x cols` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelGrid {
    rows: usize,
    cols: usize,
}

impl PixelGrid {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
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
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits a linear pixel index into `(row, col)`.
    #[inline]
    pub fn decompose(&self, pixel: usize) -> (usize, usize) {
        debug_assert!(pixel < self.len());
        (pixel / self.cols, pixel % self.cols)
    }

    #[inline]
    pub fn linear(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    /// Linear index of `(row, col)` if both coordinates fall inside the grid.
    #[inline]
    pub fn checked_linear(&self, row: isize, col: isize) -> Option<usize> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return None;
        }
        Some(self.linear(row as usize, col as usize))
    }
}

/// Clamped inclusive coordinate range `[start, finish]` along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub finish: usize,
}

impl Window {
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.finish - self.start + 1
    }

    #[inline]
    pub fn contains(&self, coord: usize) -> bool {
        (self.start..=self.finish).contains(&coord)
    }
}

/// Coordinates within `half` of `coord`, clamped to `[0, extent)`.
///
/// Never empty for `coord < extent`: the window always contains `coord`.
#[inline]
pub fn window(coord: usize, half: usize, extent: usize) -> Window {
    debug_assert!(coord < extent, "coordinate {coord} outside extent {extent}");
    Window {
        start: coord.saturating_sub(half),
        finish: coord.saturating_add(half).min(extent - 1),
    }
}

/// Number of partner pixels inside a 2D window.
#[inline]
pub fn pair_count(rows: &Window, cols: &Window) -> usize {
    rows.len() * cols.len()
}

/// The `n`-th partner pixel of a 2D window, enumerated row-major (column
/// fastest), as a linear index into a plane with `row_stride` columns.
#[inline]
pub fn nth_partner(n: usize, rows: &Window, cols: &Window, row_stride: usize) -> usize {
    debug_assert!(n < pair_count(rows, cols));
    let col = cols.start + n % cols.len();
    let row = rows.start + n / cols.len();
    row * row_stride + col
}

/// Angular index of the step from `src` to `dst` along one axis:
/// `((dst - src) + half) mod extent`, always in `[0, extent)`.
#[inline]
pub fn angle_index(src: usize, dst: usize, half: usize, extent: usize) -> usize {
    debug_assert!(extent > 0);
    let offset = dst as i64 - src as i64 + half as i64;
    offset.rem_euclid(extent as i64) as usize
}

/// [`angle_index`] taken from the opposite end of the angular range.
///
/// With `src` on the front plane and `dst` on the rear plane this is the
/// light field slice that records the ray between them.
#[inline]
pub fn flipped_angle(src: usize, dst: usize, half: usize, extent: usize) -> usize {
    extent - 1 - angle_index(src, dst, half, extent)
}

/// Pixels reachable from one pixel within the angular extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    pub rows: Window,
    pub cols: Window,
    row_stride: usize,
}

impl Neighborhood {
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        pair_count(&self.rows, &self.cols)
    }

    #[inline]
    pub fn nth(&self, n: usize) -> usize {
        nth_partner(n, &self.rows, &self.cols, self.row_stride)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |n| self.nth(n))
    }
}

/// Spatial grid plus angular extents of a light field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngularGeometry {
    grid: PixelGrid,
    half_rows: usize,
    half_cols: usize,
    angular_rows: usize,
    angular_cols: usize,
}

impl AngularGeometry {
    pub fn new(dims: LightFieldDims) -> Self {
        Self {
            grid: PixelGrid::new(dims.spatial_rows, dims.spatial_cols),
            half_rows: dims.half_angular_rows(),
            half_cols: dims.half_angular_cols(),
            angular_rows: dims.angular_rows,
            angular_cols: dims.angular_cols,
        }
    }

    #[inline]
    pub fn grid(&self) -> PixelGrid {
        self.grid
    }

    /// Pixels on the opposite mask that share a ray with `pixel`.
    #[inline]
    pub fn neighborhood(&self, pixel: usize) -> Neighborhood {
        let (row, col) = self.grid.decompose(pixel);
        Neighborhood {
            rows: window(row, self.half_rows, self.grid.rows),
            cols: window(col, self.half_cols, self.grid.cols),
            row_stride: self.grid.cols,
        }
    }

    /// Angular slice `(b, a)` of the ray from `rear` through `front`.
    #[inline]
    pub fn ray_slice(&self, rear: usize, front: usize) -> (usize, usize) {
        let (v, u) = self.grid.decompose(rear);
        let (t, s) = self.grid.decompose(front);
        let a = flipped_angle(s, u, self.half_cols, self.angular_cols);
        let b = flipped_angle(t, v, self.half_rows, self.angular_rows);
        (b, a)
    }

    /// Front pixel hit by the ray leaving `rear` at slice `(b, a)`, or `None`
    /// when the ray exits the spatial plane.
    #[inline]
    pub fn ray_partner(&self, rear: usize, b: usize, a: usize) -> Option<usize> {
        let (v, u) = self.grid.decompose(rear);
        let t = v as isize + b as isize - self.half_rows as isize;
        let s = u as isize + a as isize - self.half_cols as isize;
        self.grid.checked_linear(t, s)
    }
}
