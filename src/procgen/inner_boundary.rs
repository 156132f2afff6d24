//! Inner boundaries of street polygons.
//!
//! A polygon's buildable area stops where its roads do. For every edge the
//! road row just inside the kerb facing the polygon becomes a boundary line;
//! neighbouring lines are intersected to find the corners. Short edges whose
//! road is swallowed by the neighbouring roads contribute nothing.

use bevy::prelude::*;
use smallvec::SmallVec;
use thiserror::Error;

use super::geometry::{centroid, centroid3, in_range_tolerance, line_intersection, polygon_area};
use super::street_graph::{SegmentId, StreetGraph, StreetPolygon};
use crate::world::terrain::TerrainPatch;

/// Slack when deciding whether a road point lies between two corners.
const MIDPOINT_TOLERANCE: f32 = 0.5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundaryError {
    #[error("segment {0:?} has no road surface")]
    MissingRoad(SegmentId),
    #[error("road of segment {0:?} has fewer than 3 rows")]
    RoadTooNarrow(SegmentId),
    #[error("boundary lines {0} and {1} do not intersect")]
    NoIntersection(usize, usize),
    #[error("only {0} boundary lines survive")]
    Collapsed(usize),
    #[error("corner ({}, {}) is off every surface", .0.x, .0.y)]
    OffSurface(Vec2),
}

impl BoundaryError {
    /// True when the polygon simply has no usable inner boundary.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            BoundaryError::NoIntersection(..)
                | BoundaryError::Collapsed(_)
                | BoundaryError::OffSurface(_)
        )
    }
}

/// One side of an inner boundary: its start corner, the road points along
/// it, and its end corner (which is the next line's start corner).
#[derive(Clone, Debug)]
pub struct BoundaryLine {
    pub segment: SegmentId,
    pub level: u32,
    pub points: SmallVec<[Vec3; 8]>,
}

impl BoundaryLine {
    pub fn start(&self) -> Vec3 {
        self.points[0]
    }

    pub fn end(&self) -> Vec3 {
        self.points[self.points.len() - 1]
    }
}

/// Closed, counter-clockwise chain of boundary lines.
#[derive(Clone, Debug)]
pub struct BoundaryChain {
    pub lines: Vec<BoundaryLine>,
}

impl BoundaryChain {
    /// First point of every line.
    pub fn corners(&self) -> Vec<Vec3> {
        self.lines.iter().map(BoundaryLine::start).collect()
    }

    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.lines.iter().flat_map(|line| line.points.iter().copied())
    }

    /// Average of every point on the chain; corners count once per line they end.
    pub fn center(&self) -> Vec3 {
        centroid3(&self.points().collect::<Vec<_>>())
    }

    /// Every point once, in chain order; a line's end corner is the next line's start.
    pub fn ring(&self) -> Vec<Vec3> {
        self.lines
            .iter()
            .flat_map(|line| line.points[..line.points.len() - 1].iter().copied())
            .collect()
    }

    /// Area of the corner polygon.
    pub fn corner_area(&self) -> f32 {
        let corners: Vec<Vec2> = self.corners().iter().map(|c| c.truncate()).collect();
        polygon_area(&corners)
    }

    pub fn height_range(&self) -> (f32, f32) {
        self.points()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)))
    }
}

struct InnerLine<'a> {
    segment: SegmentId,
    level: u32,
    road: &'a TerrainPatch,
    row: usize,
    start: Vec2,
    end: Vec2,
}

impl<'a> InnerLine<'a> {
    /// Pick whichever kerb-side row of the road faces `center`.
    fn facing(
        segment: SegmentId,
        level: u32,
        road: &'a TerrainPatch,
        center: Vec2,
    ) -> Result<Self, BoundaryError> {
        if road.v_size() < 3 {
            return Err(BoundaryError::RoadTooNarrow(segment));
        }

        let last = road.u_size() - 1;
        let line = |row: usize| Self {
            segment,
            level,
            road,
            row,
            start: road.point(0, row).truncate(),
            end: road.point(last, row).truncate(),
        };
        let near = line(1);
        let far = line(road.v_size() - 2);

        let d1 = ((near.start + near.end) / 2.0).distance(center);
        let d2 = ((far.start + far.end) / 2.0).distance(center);
        Ok(if d1 <= d2 { near } else { far })
    }

    fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Height at a corner from the line's own road, falling back to the ground.
fn corner_height(
    road: &TerrainPatch,
    ground: &TerrainPatch,
    corner: Vec2,
) -> Result<f32, BoundaryError> {
    road.height_at(corner)
        .or_else(|_| ground.height_at(corner))
        .map_err(|_| BoundaryError::OffSurface(corner))
}

/// Trace the buildable boundary inside `polygon`'s roads.
///
/// Every segment of the polygon must already carry its road surface.
pub fn extract_inner_boundary(
    polygon: &StreetPolygon,
    graph: &StreetGraph,
    ground: &TerrainPatch,
) -> Result<BoundaryChain, BoundaryError> {
    let center = centroid(&polygon.points);

    let lines = polygon
        .segments
        .iter()
        .map(|&id| {
            let segment = graph.segment(id).ok_or(BoundaryError::MissingRoad(id))?;
            let road = segment.road.as_ref().ok_or(BoundaryError::MissingRoad(id))?;
            InnerLine::facing(id, segment.level, road, center)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let n = lines.len();
    if n < 3 {
        return Err(BoundaryError::Collapsed(n));
    }

    let mut longest = 0;
    let mut longest_len = 0.0;
    for (i, line) in lines.iter().enumerate() {
        if line.length() > longest_len {
            longest_len = line.length();
            longest = i;
        }
    }

    // Walk from the longest line; each kept line ends where it meets the next
    // line whose corner isn't buried under the road after it.
    let mut skip = vec![false; n];
    let mut needed = Vec::with_capacity(n);
    let mut corners = Vec::with_capacity(n);
    for k in 0..n {
        let i1 = (k + longest) % n;
        if skip[i1] {
            continue;
        }

        let l1 = &lines[i1];
        let mut i2 = i1;
        for _ in 0..n {
            i2 = (i2 + 1) % n;
            let i3 = (i2 + 1) % n;
            let l2 = &lines[i2];

            let corner = line_intersection(l1.start, l1.end, l2.start, l2.end)
                .ok_or(BoundaryError::NoIntersection(i1, i2))?;
            if lines[i3].road.contains(corner) {
                skip[i2] = true;
                continue;
            }

            needed.push(i1);
            corners.push(corner);
            break;
        }
        if needed.last() != Some(&i1) {
            return Err(BoundaryError::Collapsed(needed.len()));
        }
    }

    let m = needed.len();
    if m < 3 {
        return Err(BoundaryError::Collapsed(m));
    }

    let mut chain = Vec::with_capacity(m);
    for (i, &idx) in needed.iter().enumerate() {
        let line = &lines[idx];
        let start = corners[(i + m - 1) % m];
        let end = corners[i];
        let start = start.extend(corner_height(line.road, ground, start)?);
        let end = end.extend(corner_height(line.road, ground, end)?);

        let mut middle: SmallVec<[Vec3; 8]> = line
            .road
            .row(line.row)
            .filter(|p| {
                in_range_tolerance(p.x, start.x, end.x, MIDPOINT_TOLERANCE)
                    && in_range_tolerance(p.y, start.y, end.y, MIDPOINT_TOLERANCE)
                    && !(p.x == start.x && p.y == start.y)
                    && !(p.x == end.x && p.y == end.y)
            })
            .collect();

        if middle.len() > 1 {
            let d_first = middle[0].truncate().distance(start.truncate());
            let d_last = middle[middle.len() - 1].truncate().distance(start.truncate());
            if d_first >= d_last {
                middle.reverse();
            }
        }

        let mut points = SmallVec::with_capacity(middle.len() + 2);
        points.push(start);
        points.extend(middle);
        points.push(end);

        chain.push(BoundaryLine {
            segment: line.segment,
            level: line.level,
            points,
        });
    }

    // Shared corners take the lower of the two heights.
    for i in 0..m {
        let prev = (i + m - 1) % m;
        let last = chain[prev].points.len() - 1;
        let z = chain[i].points[0].z.min(chain[prev].points[last].z);
        chain[i].points[0].z = z;
        chain[prev].points[last].z = z;
    }

    Ok(BoundaryChain { lines: chain })
}
