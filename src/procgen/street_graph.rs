//! Street graph built by recursive subdivision of a convex arena outline.
//!
//! Every polygon larger than the configured area is cut in two by a new
//! street joining (jittered) midpoints of its longest edge and a second
//! edge. Segments live in a petgraph arena and are referenced by index, so a
//! cut street is shared by both halves and a split edge keeps pointing at
//! the full street it lies on.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use bevy::prelude::*;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use rand::Rng;
use thiserror::Error;

use super::geometry::{centroid, polygon_area};
use super::selector::{SelectError, Selector};
use super::LayoutSet;
use crate::world::terrain::TerrainPatch;
use crate::world::{GroundTerrain, LayoutRng, WorldConfig};

pub struct StreetGraphPlugin;

impl Plugin for StreetGraphPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StreetGraphConfig>()
            .init_resource::<StreetNetwork>()
            .add_systems(
                Update,
                generate_street_graph
                    .run_if(should_generate_street_graph)
                    .in_set(LayoutSet::Streets),
            );
    }
}

/// Configuration for street subdivision.
#[derive(Resource, Clone, Debug)]
pub struct StreetGraphConfig {
    /// Polygons at or below this area are not split further.
    pub max_area: f32,
    /// Width of the window around each edge midpoint the cut may land in.
    pub split_tolerance: f32,
    /// Recursion limit; reaching it means `max_area` cannot be met.
    pub max_depth: usize,
    /// Radius of the circle the outline corners are taken from (before scaling).
    pub shape_radius: f32,
    /// Number of evenly spaced candidate corners around that circle.
    pub ring_points: usize,
    /// Weighted choice of how many corners the outline gets.
    pub corner_weights: Vec<(usize, f32)>,
}

impl Default for StreetGraphConfig {
    fn default() -> Self {
        Self {
            max_area: 1_500_000.0,
            split_tolerance: 0.25,
            max_depth: 24,
            shape_radius: 1000.0,
            ring_points: 16,
            corner_weights: vec![(5, 0.3), (6, 0.5), (7, 0.2)],
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SubdivideError {
    #[error("polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("area threshold must be positive, got {0}")]
    InvalidThreshold(f32),
    #[error("no edge available to cut against in a {0}-sided polygon")]
    NoCandidateEdge(usize),
    #[error("cannot satisfy area threshold: polygon of area {area} still too large at depth {depth}")]
    DepthExceeded { depth: usize, area: f32 },
    #[error("failed to pick outline corners: {0}")]
    Select(#[from] SelectError),
}

/// Stable handle of a segment in the graph.
pub type SegmentId = EdgeIndex;

/// Handle of a polygon in the live set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolygonId(u32);

/// A street: two endpoints, the depth it was cut at, and its road surface once built.
#[derive(Clone, Debug)]
pub struct Segment {
    pub pt1: Vec2,
    pub pt2: Vec2,
    /// 0 for the outer boundary, otherwise the subdivision depth of the cut.
    pub level: u32,
    pub road: Option<TerrainPatch>,
}

impl Segment {
    pub fn length(&self) -> f32 {
        self.pt1.distance(self.pt2)
    }
}

/// A terminal area of the subdivision.
///
/// `segments[i]` is the street that edge `points[i] -> points[i + 1]` lies on.
#[derive(Clone, Debug)]
pub struct StreetPolygon {
    pub points: Vec<Vec2>,
    pub segments: Vec<SegmentId>,
    pub level: u32,
}

impl StreetPolygon {
    pub fn area(&self) -> f32 {
        polygon_area(&self.points)
    }

    fn edge_length(&self, i: usize) -> f32 {
        let n = self.points.len();
        self.points[i].distance(self.points[(i + 1) % n])
    }
}

/// All streets ever created plus the current set of undivided polygons.
#[derive(Clone, Debug, Default)]
pub struct StreetGraph {
    graph: UnGraph<Vec2, Segment>,
    polygons: BTreeMap<PolygonId, StreetPolygon>,
    next_polygon: u32,
}

impl StreetGraph {
    /// Subdivide a convex outline until every polygon is at most `config.max_area`.
    pub fn subdivide<R: Rng + ?Sized>(
        outline: &[Vec2],
        config: &StreetGraphConfig,
        rng: &mut R,
    ) -> Result<Self, SubdivideError> {
        if outline.len() < 3 {
            return Err(SubdivideError::TooFewPoints(outline.len()));
        }
        if config.max_area <= 0.0 || config.max_area.is_nan() {
            return Err(SubdivideError::InvalidThreshold(config.max_area));
        }

        let mut street_graph = StreetGraph::default();
        let nodes: Vec<NodeIndex> = outline
            .iter()
            .map(|&p| street_graph.graph.add_node(p))
            .collect();

        let n = outline.len();
        let segments = (0..n)
            .map(|i| {
                let next = (i + 1) % n;
                street_graph.connect(nodes[i], nodes[next], 0)
            })
            .collect();

        let root = street_graph.insert_polygon(StreetPolygon {
            points: outline.to_vec(),
            segments,
            level: 0,
        });

        street_graph.divide(root, 0, config, rng)?;
        Ok(street_graph)
    }

    fn connect(&mut self, a: NodeIndex, b: NodeIndex, level: u32) -> SegmentId {
        let segment = Segment {
            pt1: self.graph[a],
            pt2: self.graph[b],
            level,
            road: None,
        };
        self.graph.add_edge(a, b, segment)
    }

    fn insert_polygon(&mut self, polygon: StreetPolygon) -> PolygonId {
        let id = PolygonId(self.next_polygon);
        self.next_polygon += 1;
        self.polygons.insert(id, polygon);
        id
    }

    fn divide<R: Rng + ?Sized>(
        &mut self,
        id: PolygonId,
        depth: usize,
        config: &StreetGraphConfig,
        rng: &mut R,
    ) -> Result<(), SubdivideError> {
        let Some(polygon) = self.polygons.get(&id) else {
            return Ok(());
        };

        let area = polygon.area();
        if area <= config.max_area {
            return Ok(());
        }
        if depth >= config.max_depth {
            return Err(SubdivideError::DepthExceeded { depth, area });
        }

        let (first, second) = self.split(id, config.split_tolerance, rng)?;
        self.divide(first, depth + 1, config, rng)?;
        self.divide(second, depth + 1, config, rng)
    }

    /// Replace a polygon by the two halves of a cut through it.
    fn split<R: Rng + ?Sized>(
        &mut self,
        id: PolygonId,
        tolerance: f32,
        rng: &mut R,
    ) -> Result<(PolygonId, PolygonId), SubdivideError> {
        let polygon = &self.polygons[&id];
        let n = polygon.points.len();
        if n < 3 {
            return Err(SubdivideError::TooFewPoints(n));
        }

        let mut longest = 0;
        for i in 1..n {
            if polygon.edge_length(i) > polygon.edge_length(longest) {
                longest = i;
            }
        }

        // Prefer edges not touching the longest one; triangles can't afford that.
        let candidates: Vec<usize> = (0..n)
            .filter(|&i| i != longest)
            .filter(|&i| n < 4 || ((i + 1) % n != longest && (longest + 1) % n != i))
            .collect();

        let other = if polygon.level > 0 {
            let mut best: Option<usize> = None;
            for &i in &candidates {
                if best.map_or(true, |b| polygon.edge_length(i) > polygon.edge_length(b)) {
                    best = Some(i);
                }
            }
            best
        } else {
            rng.pick(&candidates).copied()
        }
        .ok_or(SubdivideError::NoCandidateEdge(n))?;

        let (a, b) = (longest.min(other), longest.max(other));
        let low = 0.5 - tolerance / 2.0;
        let high = 0.5 + tolerance / 2.0;
        let mut jittered = |i: usize| {
            let weight = rng.range_float(low, high);
            polygon.points[i].lerp(polygon.points[(i + 1) % n], weight)
        };
        let mid_a = jittered(a);
        let mid_b = jittered(b);

        let level = polygon.level + 1;
        let points = &polygon.points;
        let segments = &polygon.segments;

        let first = StreetPolygon {
            points: points[..=a]
                .iter()
                .copied()
                .chain([mid_a, mid_b])
                .chain(points[b + 1..].iter().copied())
                .collect(),
            segments: Vec::new(),
            level,
        };
        let second = StreetPolygon {
            points: std::iter::once(mid_a)
                .chain(points[a + 1..=b].iter().copied())
                .chain(std::iter::once(mid_b))
                .collect(),
            segments: Vec::new(),
            level,
        };
        let first_segments: Vec<SegmentId> = segments[..=a].to_vec();
        let second_segments: Vec<SegmentId> = segments[a..=b].to_vec();
        let tail: Vec<SegmentId> = segments[b..].to_vec();

        let node_a = self.graph.add_node(mid_a);
        let node_b = self.graph.add_node(mid_b);
        let cut = self.connect(node_a, node_b, level);

        let first = StreetPolygon {
            segments: first_segments
                .into_iter()
                .chain(std::iter::once(cut))
                .chain(tail)
                .collect(),
            ..first
        };
        let second = StreetPolygon {
            segments: second_segments
                .into_iter()
                .chain(std::iter::once(cut))
                .collect(),
            ..second
        };

        self.polygons.remove(&id);
        Ok((self.insert_polygon(first), self.insert_polygon(second)))
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.graph.edge_weight(id)
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &Segment)> {
        self.graph.edge_indices().map(|e| (e, &self.graph[e]))
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.graph.edge_indices().collect()
    }

    /// Hand a road surface to a segment, returning the one it replaces.
    pub fn attach_road(&mut self, id: SegmentId, road: TerrainPatch) -> Option<TerrainPatch> {
        self.graph
            .edge_weight_mut(id)
            .and_then(|segment| segment.road.replace(road))
    }

    pub fn road(&self, id: SegmentId) -> Option<&TerrainPatch> {
        self.segment(id).and_then(|s| s.road.as_ref())
    }

    pub fn polygon(&self, id: PolygonId) -> Option<&StreetPolygon> {
        self.polygons.get(&id)
    }

    pub fn polygons(&self) -> impl Iterator<Item = (PolygonId, &StreetPolygon)> {
        self.polygons.iter().map(|(&id, p)| (id, p))
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn segment_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Corners and cut endpoints.
    pub fn intersections(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.graph.node_weights().copied()
    }

    /// Centre of all segment endpoints and the farthest endpoint's distance from it.
    pub fn extent(&self) -> (Vec2, f32) {
        let endpoints: Vec<Vec2> = self
            .graph
            .edge_weights()
            .flat_map(|s| [s.pt1, s.pt2])
            .collect();
        let center = centroid(&endpoints);
        let max_dist = endpoints
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0, f32::max);
        (center, max_dist)
    }
}

/// Convex, counter-clockwise arena outline spanning `play_size` from `origin`.
///
/// A weighted number of corners is picked from a ring of evenly spaced
/// points; the picks are kept in angular order and stretched to fill the
/// playable rectangle.
pub fn arena_outline<R: Rng + ?Sized>(
    play_size: Vec2,
    origin: Vec2,
    config: &StreetGraphConfig,
    rng: &mut R,
) -> Result<Vec<Vec2>, SubdivideError> {
    let count = rng
        .pick_weighted(&config.corner_weights)
        .copied()
        .unwrap_or(0);
    if count < 3 {
        return Err(SubdivideError::TooFewPoints(count));
    }

    let ring: Vec<usize> = (0..config.ring_points).collect();
    let mut picked = rng.pick_n(&ring, count)?;
    picked.sort_unstable();

    let corners: Vec<Vec2> = picked
        .iter()
        .map(|&i| {
            let angle = TAU * i as f32 / config.ring_points as f32;
            Vec2::new(angle.cos(), angle.sin()) * config.shape_radius
        })
        .collect();

    let min = corners.iter().copied().fold(Vec2::splat(f32::MAX), Vec2::min);
    let max = corners.iter().copied().fold(Vec2::splat(f32::MIN), Vec2::max);
    let scale = play_size / (max - min);

    Ok(corners
        .into_iter()
        .map(|p| origin + scale * (p - min))
        .collect())
}

/// The generated street graph.
#[derive(Resource, Default)]
pub struct StreetNetwork {
    pub graph: Option<StreetGraph>,
    pub generated: bool,
}

fn should_generate_street_graph(ground: Res<GroundTerrain>, network: Res<StreetNetwork>) -> bool {
    ground.patch.is_some() && !network.generated
}

fn generate_street_graph(
    world: Res<WorldConfig>,
    config: Res<StreetGraphConfig>,
    mut rng: ResMut<LayoutRng>,
    mut network: ResMut<StreetNetwork>,
) {
    info!("Generating street graph...");

    let origin = (world.size.truncate() - world.play_size) / 2.0;
    let result = arena_outline(world.play_size, origin, &config, &mut rng.0)
        .and_then(|outline| StreetGraph::subdivide(&outline, &config, &mut rng.0));

    match result {
        Ok(graph) => {
            info!(
                "Street graph complete: {} segments, {} polygons",
                graph.segment_count(),
                graph.polygon_count()
            );
            network.graph = Some(graph);
        }
        Err(err) => error!("Street graph generation failed: {err}"),
    }

    network.generated = true;
}
