//! Parcel planning: decide which street polygons get a building.
//!
//! Each polygon's inner boundary is either left as plain ground or shrunk
//! away from the street, raised to a building pad and given the largest
//! rectangular footprint that fits.

use bevy::prelude::*;
use rand::Rng;

use super::geometry::contract_toward;
use super::inner_boundary::{extract_inner_boundary, BoundaryChain};
use super::rect_fit::{fit_rectangle_in, FittedRectangle};
use super::road_surface::RoadSurfaces;
use super::selector::Selector;
use super::street_graph::{PolygonId, StreetGraph, StreetNetwork};
use super::LayoutSet;
use crate::world::terrain::{TerrainError, TerrainPatch};
use crate::world::{GroundTerrain, LayoutRng};

pub struct ParcelPlugin;

impl Plugin for ParcelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ParcelConfig>()
            .init_resource::<ParcelPlans>()
            .add_systems(
                Update,
                plan_arena_parcels
                    .run_if(should_plan_parcels)
                    .in_set(LayoutSet::Parcels),
            );
    }
}

/// Configuration for parcel planning.
#[derive(Resource, Clone, Debug)]
pub struct ParcelConfig {
    /// Parcels whose inner corner polygon is smaller than this stay ground.
    pub min_parcel_area: f32,
    /// Smallest building footprint worth placing.
    pub min_footprint_area: f32,
    /// Chance an otherwise buildable parcel is left as ground.
    pub ground_chance: f32,
    /// Fraction of the way each corner moves toward the parcel centre.
    pub margin: f32,
    /// Weight of the parcel centre's height in the pad height.
    pub center_weight: f32,
    /// Weight of the highest boundary point against the lowest.
    pub high_weight: f32,
    /// How far the outer edge of the ground strips reaches past the boundary,
    /// relative to its distance from the centre.
    pub skirt_spread: f32,
    /// How far the outer edge of the ground strips sinks below the boundary.
    pub skirt_drop: f32,
}

impl Default for ParcelConfig {
    fn default() -> Self {
        Self {
            min_parcel_area: 40_000.0,
            min_footprint_area: 10_000.0,
            ground_chance: 0.10,
            margin: 0.25,
            center_weight: 0.35,
            high_weight: 0.65,
            skirt_spread: 0.01,
            skirt_drop: 10.0,
        }
    }
}

/// Why a parcel carries no building.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundReason {
    TooSmall,
    Chance,
    NoFit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParcelPlan {
    Building {
        footprint: FittedRectangle,
        /// Height the footprint is levelled to.
        pad_height: f32,
        /// Distance from the arena centre relative to the farthest street endpoint.
        distance_ratio: f32,
    },
    Ground(GroundReason),
}

#[derive(Clone, Debug)]
pub struct Parcel {
    pub polygon: PolygonId,
    pub boundary: BoundaryChain,
    pub center: Vec3,
    pub area: f32,
    pub plan: ParcelPlan,
    /// Ground between the road and the pad, one 2x3 patch per boundary point.
    /// Rows run from a skirt under the road, through the boundary, to the
    /// pad edge (or the centre when nothing is built).
    pub strips: Vec<TerrainPatch>,
}

impl Parcel {
    pub fn is_building(&self) -> bool {
        matches!(self.plan, ParcelPlan::Building { .. })
    }
}

/// Planned parcels for the arena.
#[derive(Resource, Default)]
pub struct ParcelPlans {
    pub parcels: Vec<Parcel>,
    /// Polygons without a usable inner boundary or ground strips.
    pub skipped: usize,
    pub generated: bool,
}

impl ParcelPlans {
    pub fn buildings(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.iter().filter(|p| p.is_building())
    }
}

fn pad_height(center: Vec3, low: f32, high: f32, config: &ParcelConfig) -> f32 {
    let blended = config.high_weight * high + (1.0 - config.high_weight) * low;
    config.center_weight * center.z + (1.0 - config.center_weight) * blended
}

/// Join each `[skirt, boundary, inner]` row to the next one around the parcel.
fn ground_strips(rows: &[[Vec3; 3]]) -> Result<Vec<TerrainPatch>, TerrainError> {
    let n = rows.len();
    (0..n)
        .map(|j| {
            let mut strip = TerrainPatch::new(2, 3)?;
            for k in 0..3 {
                strip.set_point(0, k, rows[j][k]);
                strip.set_point(1, k, rows[(j + 1) % n][k]);
            }
            Ok(strip)
        })
        .collect()
}

/// Plan one parcel from its inner boundary.
///
/// `extent` is the arena centre and farthest street endpoint distance.
pub fn plan_parcel<R: Rng + ?Sized>(
    polygon: PolygonId,
    boundary: BoundaryChain,
    extent: (Vec2, f32),
    config: &ParcelConfig,
    rng: &mut R,
) -> Result<Parcel, TerrainError> {
    let center = boundary.center();
    let area = boundary.corner_area();
    let (low, high) = boundary.height_range();
    let z = pad_height(center, low, high, config);

    let too_small = area < config.min_parcel_area;
    let by_chance = rng.probability(config.ground_chance);

    let plan = if too_small {
        debug!("Parcel {polygon:?} grounded because of area size");
        ParcelPlan::Ground(GroundReason::TooSmall)
    } else if by_chance {
        debug!("Parcel {polygon:?} grounded by random chance");
        ParcelPlan::Ground(GroundReason::Chance)
    } else {
        let corners: Vec<Vec2> = boundary.corners().iter().map(|c| c.truncate()).collect();
        let pad: Vec<Vec3> = contract_toward(&corners, center.truncate(), config.margin)
            .into_iter()
            .map(|c| c.extend(z))
            .collect();

        match fit_rectangle_in(&pad, config.min_footprint_area) {
            Some(footprint) => {
                let (arena_center, max_dist) = extent;
                let distance_ratio = if max_dist > 0.0 {
                    center.truncate().distance(arena_center) / max_dist
                } else {
                    0.0
                };
                ParcelPlan::Building {
                    footprint,
                    pad_height: z,
                    distance_ratio,
                }
            }
            None => {
                debug!("Parcel {polygon:?} has no room for a footprint");
                ParcelPlan::Ground(GroundReason::NoFit)
            }
        }
    };

    let mid = center.truncate();
    let rows: Vec<[Vec3; 3]> = boundary
        .ring()
        .into_iter()
        .map(|p| {
            let xy = p.truncate();
            let skirt = (xy + (xy - mid) * config.skirt_spread).extend(p.z - config.skirt_drop);
            let inner = match plan {
                ParcelPlan::Building { .. } => xy.lerp(mid, config.margin).extend(z),
                ParcelPlan::Ground(GroundReason::NoFit) => center,
                ParcelPlan::Ground(_) => mid.extend(z),
            };
            [skirt, p, inner]
        })
        .collect();
    let strips = ground_strips(&rows)?;

    Ok(Parcel {
        polygon,
        boundary,
        center,
        area,
        plan,
        strips,
    })
}

/// Plan every live polygon of the graph. Roads must already be built.
///
/// Returns the parcels and the number of polygons skipped for lack of a
/// usable inner boundary or ground strips.
pub fn plan_parcels<R: Rng + ?Sized>(
    graph: &StreetGraph,
    ground: &TerrainPatch,
    config: &ParcelConfig,
    rng: &mut R,
) -> (Vec<Parcel>, usize) {
    let extent = graph.extent();
    let mut parcels = Vec::with_capacity(graph.polygon_count());
    let mut skipped = 0;

    for (id, polygon) in graph.polygons() {
        match extract_inner_boundary(polygon, graph, ground) {
            Ok(boundary) => match plan_parcel(id, boundary, extent, config, rng) {
                Ok(parcel) => parcels.push(parcel),
                Err(err) => {
                    warn!("Skipping polygon {id:?}: {err}");
                    skipped += 1;
                }
            },
            Err(err) => {
                if err.is_miss() {
                    debug!("Skipping polygon {id:?}: {err}");
                } else {
                    warn!("Skipping polygon {id:?}: {err}");
                }
                skipped += 1;
            }
        }
    }

    (parcels, skipped)
}

fn should_plan_parcels(surfaces: Res<RoadSurfaces>, plans: Res<ParcelPlans>) -> bool {
    surfaces.built && !plans.generated
}

fn plan_arena_parcels(
    ground: Res<GroundTerrain>,
    network: Res<StreetNetwork>,
    config: Res<ParcelConfig>,
    mut rng: ResMut<LayoutRng>,
    mut plans: ResMut<ParcelPlans>,
) {
    plans.generated = true;

    let (Some(graph), Some(ground)) = (network.graph.as_ref(), ground.patch.as_ref()) else {
        return;
    };

    info!("Planning parcels for {} polygons", graph.polygon_count());
    let (parcels, skipped) = plan_parcels(graph, ground, &config, &mut rng.0);

    plans.parcels = parcels;
    plans.skipped = skipped;
    info!(
        "Parcels planned: {} buildings, {} ground, {} skipped",
        plans.buildings().count(),
        plans.parcels.len() - plans.buildings().count(),
        skipped
    );
}
