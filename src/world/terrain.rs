//! Deformable height-field patches.
//!
//! A patch is a `u_size × v_size` grid of 3D points. The `u`/`v` indices are
//! grid coordinates only: every point carries its own x, y and z, so a patch
//! can be laid along a road, bent, or stretched over the whole arena.
//!
//! ```text
//!   3+---+---+
//!    |   |   |
//!   2+---+---+
//!    |   |   |
//! ^ 1+---+---+
//! |  |   |   |
//! v  +---+---+
//!    0   1   2
//!      u ---->
//! ```

use std::sync::OnceLock;

use bevy::prelude::*;
use rand::Rng;
use thiserror::Error;

use crate::procgen::geometry::in_range;

/// Slack allowed when deciding whether a point lies on the patch or in a grid cell.
const SURFACE_TOLERANCE: f32 = 1e-4;

const CENTER_WEIGHT: f32 = 0.5;
const TOUCHING_WEIGHT: f32 = 0.1;
const CORNER_WEIGHT: f32 = 0.025;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainError {
    #[error("terrain patches must be 2x2 or larger, got {u_size}x{v_size}")]
    TooSmall { u_size: usize, v_size: usize },
    #[error("point ({}, {}) not on terrain", .0.x, .0.y)]
    NotOnSurface(Vec2),
    #[error("unable to calculate u and v basis vectors")]
    DegenerateBasis,
}

impl TerrainError {
    /// True for the expected "lookup missed this surface" outcome.
    pub fn is_miss(&self) -> bool {
        matches!(self, TerrainError::NotOnSurface(_))
    }
}

/// Position of a point along the patch's two edge vectors, in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceCoord {
    pub u: f32,
    pub v: f32,
}

/// Edge vectors from grid corner `(0, 0)` toward `(u_size - 1, 0)` and `(0, v_size - 1)`.
#[derive(Clone, Copy, Debug)]
struct PatchBasis {
    origin: Vec2,
    vec_u: Vec2,
    vec_v: Vec2,
    det: f32,
}

#[derive(Clone, Debug)]
pub struct TerrainPatch {
    u_size: usize,
    v_size: usize,
    points: Vec<Vec3>,
    basis: OnceLock<Option<PatchBasis>>,
}

impl TerrainPatch {
    /// Create a patch with every point at the origin.
    pub fn new(u_size: usize, v_size: usize) -> Result<Self, TerrainError> {
        if u_size < 2 || v_size < 2 {
            return Err(TerrainError::TooSmall { u_size, v_size });
        }

        Ok(Self {
            u_size,
            v_size,
            points: vec![Vec3::ZERO; u_size * v_size],
            basis: OnceLock::new(),
        })
    }

    pub fn u_size(&self) -> usize {
        self.u_size
    }

    pub fn v_size(&self) -> usize {
        self.v_size
    }

    fn index(&self, u: usize, v: usize) -> usize {
        assert!(
            u < self.u_size && v < self.v_size,
            "grid index ({u}, {v}) outside {}x{} patch",
            self.u_size,
            self.v_size
        );
        u * self.v_size + v
    }

    /// Point at `(u, v)`. Panics outside the grid.
    pub fn point(&self, u: usize, v: usize) -> Vec3 {
        self.points[self.index(u, v)]
    }

    pub fn get(&self, u: usize, v: usize) -> Option<Vec3> {
        (u < self.u_size && v < self.v_size).then(|| self.points[u * self.v_size + v])
    }

    /// Overwrite one grid point. Panics outside the grid.
    pub fn set_point(&mut self, u: usize, v: usize, point: Vec3) {
        let idx = self.index(u, v);
        self.points[idx] = point;
        self.basis = OnceLock::new();
    }

    /// All points of row `v`, ordered by `u`.
    pub fn row(&self, v: usize) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.u_size).map(move |u| self.point(u, v))
    }

    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().copied()
    }

    /// Lay the grid out as an axis-aligned rectangle, leaving heights alone.
    pub fn layout_rectangular(&mut self, x0: f32, y0: f32, x1: f32, y1: f32) {
        let u_last = (self.u_size - 1) as f32;
        let v_last = (self.v_size - 1) as f32;

        for u in 0..self.u_size {
            let x = x0 + (x1 - x0) * (u as f32 / u_last);
            for v in 0..self.v_size {
                let y = y0 + (y1 - y0) * (v as f32 / v_last);
                let idx = u * self.v_size + v;
                self.points[idx].x = x;
                self.points[idx].y = y;
            }
        }
        self.basis = OnceLock::new();
    }

    /// Give every point an independent height in `[0, amplitude)`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, amplitude: f32, rng: &mut R) {
        for p in &mut self.points {
            p.z = amplitude * rng.gen::<f32>();
        }
    }

    /// One pass of a 3x3 weighted average over the heights.
    ///
    /// Neighbours wrap around along `u` and clamp at the `v` edges. All
    /// points are updated from the same snapshot.
    pub fn smooth(&mut self) {
        let heights: Vec<f32> = self.points.iter().map(|p| p.z).collect();
        let v_size = self.v_size;
        let z = |u: usize, v: usize| heights[u * v_size + v];

        for u in 0..self.u_size {
            let u_plus = (u + 1) % self.u_size;
            let u_minus = (u + self.u_size - 1) % self.u_size;
            for v in 0..self.v_size {
                let v_plus = (v + 1).min(self.v_size - 1);
                let v_minus = v.saturating_sub(1);

                let touching = z(u_plus, v) + z(u_minus, v) + z(u, v_plus) + z(u, v_minus);
                let corners = z(u_plus, v_plus)
                    + z(u_plus, v_minus)
                    + z(u_minus, v_plus)
                    + z(u_minus, v_minus);

                self.points[u * self.v_size + v].z =
                    CENTER_WEIGHT * z(u, v) + TOUCHING_WEIGHT * touching + CORNER_WEIGHT * corners;
            }
        }
    }

    /// Rescale heights so the lowest is 0 and the highest is `amplitude`.
    ///
    /// A perfectly flat patch is left untouched.
    pub fn amplify(&mut self, amplitude: f32) {
        let (z_min, z_max) = self.height_range();

        if z_max - z_min == 0.0 {
            return;
        }

        let mult = amplitude / (z_max - z_min);
        for p in &mut self.points {
            p.z = (p.z - z_min) * mult;
        }
    }

    /// (min, max) height over the whole patch.
    pub fn height_range(&self) -> (f32, f32) {
        self.points
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)))
    }

    fn basis(&self) -> Option<&PatchBasis> {
        self.basis
            .get_or_init(|| {
                let origin = self.point(0, 0).truncate();
                let vec_u = self.point(self.u_size - 1, 0).truncate() - origin;
                let vec_v = self.point(0, self.v_size - 1).truncate() - origin;
                let det = vec_u.perp_dot(vec_v);

                if vec_u.length_squared() <= f32::EPSILON
                    || vec_v.length_squared() <= f32::EPSILON
                    || det.abs() <= f32::EPSILON
                {
                    return None;
                }

                Some(PatchBasis {
                    origin,
                    vec_u,
                    vec_v,
                    det,
                })
            })
            .as_ref()
    }

    /// Express `point` (height ignored) along the patch's edge vectors.
    ///
    /// Fails with [`TerrainError::NotOnSurface`] when the point falls outside
    /// the parallelogram spanned by the two vectors.
    pub fn on_terrain(&self, point: Vec2) -> Result<SurfaceCoord, TerrainError> {
        let basis = self.basis().ok_or(TerrainError::DegenerateBasis)?;

        let d = point - basis.origin;
        let a = d.perp_dot(basis.vec_v) / basis.det;
        let b = basis.vec_u.perp_dot(d) / basis.det;

        let range = -SURFACE_TOLERANCE..=1.0 + SURFACE_TOLERANCE;
        if !range.contains(&a) || !range.contains(&b) {
            return Err(TerrainError::NotOnSurface(point));
        }

        Ok(SurfaceCoord {
            u: a.clamp(0.0, 1.0) * basis.vec_u.length(),
            v: b.clamp(0.0, 1.0) * basis.vec_v.length(),
        })
    }

    /// Whether `point` lies over this patch. A degenerate patch contains nothing.
    pub fn contains(&self, point: Vec2) -> bool {
        self.on_terrain(point).is_ok()
    }

    /// Height of the surface at `point`.
    ///
    /// The `u` column is found from the basis projection, then `v` rows are
    /// scanned for the cell whose corner-to-corner box holds the point. The box
    /// test assumes roughly even spacing along `v`; very uneven grids can pick
    /// the wrong cell. Inside the cell the height comes from the plane of
    /// whichever triangle (split along the cell's diagonal) holds the point.
    pub fn height_at(&self, point: Vec2) -> Result<f32, TerrainError> {
        let coord = self.on_terrain(point)?;
        let basis = self.basis().ok_or(TerrainError::DegenerateBasis)?;

        let u_last = self.u_size - 1;
        let u_frac = u_last as f32 * coord.u / basis.vec_u.length();
        let mut u1 = (u_frac.floor() as usize).min(u_last);
        let mut u2 = (u_frac.ceil() as usize).min(u_last);
        // Exactly on a column: use a real cell so the planes are not degenerate.
        if u1 == u2 {
            if u2 < u_last {
                u2 += 1;
            } else {
                u1 -= 1;
            }
        }

        for v in 0..self.v_size - 1 {
            let prev = self.point(u1, v);
            let far = self.point(u2, v + 1);

            if !in_box(point, prev, far) {
                continue;
            }

            let cell = [prev, self.point(u1, v + 1), far, self.point(u2, v)];
            if let Some(exact) = cell.iter().find(|p| p.x == point.x && p.y == point.y) {
                return Ok(exact.z);
            }

            // Cross the diagonal (bottom-right to upper-left) with the offset
            // to the point: non-negative means the lower-left triangle.
            let bottom_right = cell[3].truncate();
            let diagonal = cell[1].truncate() - bottom_right;
            let cross = diagonal.perp_dot(point - bottom_right);

            let plane = if cross >= 0.0 {
                [cell[0], cell[1], cell[3]]
            } else {
                [cell[1], cell[2], cell[3]]
            };
            return Ok(plane_height(plane, point));
        }

        Err(TerrainError::NotOnSurface(point))
    }

    /// Split across `u` into two patches that share the middle column.
    pub fn split(&self) -> Result<(TerrainPatch, TerrainPatch), TerrainError> {
        let first_size = self.u_size.div_ceil(2);
        let second_size = 1 + self.u_size - first_size;

        let mut first = TerrainPatch::new(first_size, self.v_size)?;
        let mut second = TerrainPatch::new(second_size, self.v_size)?;

        let seam = first_size * self.v_size - self.v_size;
        first
            .points
            .copy_from_slice(&self.points[..first_size * self.v_size]);
        second.points.copy_from_slice(&self.points[seam..]);

        Ok((first, second))
    }
}

fn in_box(point: Vec2, a: Vec3, b: Vec3) -> bool {
    let x_ok = in_range(point.x, a.x, b.x)
        || (point.x - a.x).abs() <= SURFACE_TOLERANCE
        || (point.x - b.x).abs() <= SURFACE_TOLERANCE;
    let y_ok = in_range(point.y, a.y, b.y)
        || (point.y - a.y).abs() <= SURFACE_TOLERANCE
        || (point.y - b.y).abs() <= SURFACE_TOLERANCE;
    x_ok && y_ok
}

/// Height at `point` on the plane through three points; 0 if the plane is vertical.
fn plane_height(plane: [Vec3; 3], point: Vec2) -> f32 {
    let normal = (plane[2] - plane[0]).cross(plane[1] - plane[0]);
    if normal.z == 0.0 {
        return 0.0;
    }

    let a = plane[1];
    a.z - ((point.x - a.x) * normal.x + (point.y - a.y) * normal.y) / normal.z
}
