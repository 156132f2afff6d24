//! Largest rectangle standing on one edge of a convex boundary.
//!
//! From a few points along each edge a ray is cast inward along the edge
//! normal to the nearest other edge. Any two rays of the same edge bound a
//! rectangle as wide as their spacing and as tall as the shorter ray.

use bevy::prelude::*;
use smallvec::SmallVec;

use super::geometry::{line_intersection, signed_area};
use super::inner_boundary::BoundaryChain;

/// Where along an edge rays are cast from, as fractions of its length.
const CAST_FRACTIONS: [f32; 4] = [0.01, 0.25, 0.75, 0.99];

/// Hits closer than this along the normal are behind or on the casting edge.
const FAR_SIDE_TOLERANCE: f32 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub struct FittedRectangle {
    /// `[pt00, pt01, pt10, pt11]`: the two base corners on the edge, then
    /// their counterparts raised along the normal.
    pub corners: [Vec3; 4],
    pub width: f32,
    pub height: f32,
    pub area: f32,
    /// Boundary edge the rectangle stands on.
    pub edge: usize,
    /// Boundary edge that stopped the shorter ray.
    pub limiting_edge: usize,
    /// Unit inward normal of the base edge.
    pub normal: Vec2,
}

#[derive(Clone, Copy, Debug)]
struct Cast {
    origin: Vec2,
    length: f32,
    edge: usize,
}

/// Nearest edge (other than `from`) hit by the ray from `origin` along `normal`.
fn cast(origin: Vec2, normal: Vec2, polygon: &[Vec2], from: usize) -> Option<Cast> {
    let n = polygon.len();
    let mut nearest: Option<Cast> = None;

    for k in (0..n).filter(|&k| k != from) {
        let Some(hit) = line_intersection(origin, origin + normal, polygon[k], polygon[(k + 1) % n])
        else {
            continue;
        };
        let d = hit - origin;
        if d.dot(normal) <= FAR_SIDE_TOLERANCE {
            continue;
        }

        let length = d.length();
        if nearest.map_or(true, |c| length < c.length) {
            nearest = Some(Cast {
                origin,
                length,
                edge: k,
            });
        }
    }

    nearest
}

/// Fit inside the corner polygon of a boundary chain.
pub fn fit_rectangle(chain: &BoundaryChain, min_area: f32) -> Option<FittedRectangle> {
    fit_rectangle_in(&chain.corners(), min_area)
}

/// Fit inside a convex polygon given by its corners, in either winding.
///
/// The rectangle takes the height of the first corner. Returns `None` when
/// no ray hits anything or the best rectangle is smaller than `min_area`.
pub fn fit_rectangle_in(corners: &[Vec3], min_area: f32) -> Option<FittedRectangle> {
    let n = corners.len();
    if n < 3 {
        return None;
    }

    let polygon: Vec<Vec2> = corners.iter().map(|c| c.truncate()).collect();
    let z = corners[0].z;
    let clockwise = signed_area(&polygon) < 0.0;

    let mut best: Option<FittedRectangle> = None;
    for i in 0..n {
        let pt1 = polygon[i];
        let edge = polygon[(i + 1) % n] - pt1;
        let length = edge.length();
        if length <= f32::EPSILON {
            continue;
        }

        let dir = edge / length;
        let normal = if clockwise { -dir.perp() } else { dir.perp() };

        let casts: SmallVec<[Cast; 4]> = CAST_FRACTIONS
            .iter()
            .filter_map(|f| cast(pt1 + dir * (f * length), normal, &polygon, i))
            .collect();

        for j in 0..casts.len() {
            for k in j + 1..casts.len() {
                let (s1, s2) = (casts[j], casts[k]);
                let width = s1.origin.distance(s2.origin);
                let shorter = if s1.length < s2.length { s1 } else { s2 };
                let area = width * shorter.length;

                if best.as_ref().map_or(true, |b| area > b.area) {
                    let pt00 = s2.origin.extend(z);
                    let pt01 = s1.origin.extend(z);
                    let rise = (normal * shorter.length).extend(0.0);
                    best = Some(FittedRectangle {
                        corners: [pt00, pt01, pt00 + rise, pt01 + rise],
                        width,
                        height: shorter.length,
                        area,
                        edge: i,
                        limiting_edge: shorter.edge,
                        normal,
                    });
                }
            }
        }
    }

    best.filter(|rect| rect.area >= min_area)
}
