//! Road surfaces draped over the ground along every street segment.
//!
//! Each road is a terrain patch whose U axis runs along the segment and whose
//! nine V rows form the cross-section: a steep kerb on either side of a
//! crowned carriageway, with the centre row on the segment itself.

use bevy::prelude::*;
use rand::Rng;

use super::selector::Selector;
use super::street_graph::{Segment, StreetGraph, StreetNetwork};
use super::LayoutSet;
use crate::world::terrain::{TerrainError, TerrainPatch};
use crate::world::{GroundTerrain, LayoutRng};

/// Cross-section offsets as fractions of the road half-width.
const CROSS_SECTION: [f32; 9] = [-1.0, -0.99, -0.98, -0.95, 0.0, 0.95, 0.98, 0.99, 1.0];

/// Crown added to each cross-section row, as multiples of the crown height.
const CROWN: [f32; 9] = [-5.0, 0.2, 0.4, 0.5, 1.0, 0.5, 0.4, 0.2, -5.0];

pub struct RoadSurfacePlugin;

impl Plugin for RoadSurfacePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoadSurfaceConfig>()
            .init_resource::<RoadSurfaces>()
            .add_systems(
                Update,
                (build_road_surfaces, place_vehicle_spawns)
                    .chain()
                    .run_if(should_build_roads)
                    .in_set(LayoutSet::Roads),
            );
    }
}

/// Configuration for road surfaces and the vehicles parked on them.
#[derive(Resource, Clone, Debug)]
pub struct RoadSurfaceConfig {
    /// Road half-width per segment level; deeper levels use the last entry.
    pub widths: Vec<f32>,
    /// Target length of one patch cell along the road.
    pub cell_length: f32,
    /// Segments at or beyond this level are narrow dirt tracks.
    pub dirt_level: u32,
    /// Spacing between vehicle slots along a road.
    pub vehicle_spacing: f32,
    /// Chance each slot is occupied.
    pub vehicle_probability: f32,
}

impl Default for RoadSurfaceConfig {
    fn default() -> Self {
        Self {
            widths: vec![220.0, 160.0, 120.0, 100.0, 30.0, 20.0, 10.0],
            cell_length: 220.0,
            dirt_level: 4,
            vehicle_spacing: 120.0,
            vehicle_probability: 0.25,
        }
    }
}

impl RoadSurfaceConfig {
    pub fn half_width(&self, level: u32) -> f32 {
        let last = self.widths.len().saturating_sub(1);
        self.widths
            .get((level as usize).min(last))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_dirt(&self, level: u32) -> bool {
        level >= self.dirt_level
    }

    fn crown_height(&self, level: u32) -> f32 {
        let w = self.half_width(level);
        if self.is_dirt(level) {
            w / 100.0
        } else {
            w / 20.0
        }
    }
}

/// A parked vehicle: position on a road surface and heading in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleSpawn {
    pub position: Vec3,
    pub yaw: f32,
}

/// Output of the road stage.
#[derive(Resource, Default)]
pub struct RoadSurfaces {
    pub built: bool,
    pub vehicles: Vec<VehicleSpawn>,
    /// Vehicle slots that fell off their road surface.
    pub missed_vehicles: usize,
}

/// Build the road patch for one segment, sampling heights from `ground`.
///
/// Points that miss the ground keep a height of 0 before the crown is added.
pub fn build_road(
    segment: &Segment,
    ground: &TerrainPatch,
    config: &RoadSurfaceConfig,
) -> Result<TerrainPatch, TerrainError> {
    let length = segment.length();
    let cells = ((length / config.cell_length).ceil() as usize).max(1);
    let mut road = TerrainPatch::new(cells + 1, CROSS_SECTION.len())?;

    let w = config.half_width(segment.level);
    let perp = (segment.pt2 - segment.pt1).perp().normalize_or_zero();

    for u in 0..=cells {
        let center = segment.pt1.lerp(segment.pt2, u as f32 / cells as f32);
        for (v, offset) in CROSS_SECTION.iter().enumerate() {
            let xy = center + perp * (offset * w);
            let z = match ground.height_at(xy) {
                Ok(z) => z,
                Err(err) => {
                    debug!("Road point {xy} off the ground: {err}");
                    0.0
                }
            };
            road.set_point(u, v, xy.extend(z));
        }
    }

    crown(&mut road, config.crown_height(segment.level));
    Ok(road)
}

fn crown(road: &mut TerrainPatch, h: f32) {
    for u in 0..road.u_size() {
        for (v, bump) in CROWN.iter().enumerate() {
            let p = road.point(u, v);
            road.set_point(u, v, p + Vec3::Z * (bump * h));
        }
    }
}

/// Build and attach a road surface to every segment of the graph.
///
/// Returns the number of roads built.
pub fn build_roads(
    graph: &mut StreetGraph,
    ground: &TerrainPatch,
    config: &RoadSurfaceConfig,
) -> Result<usize, TerrainError> {
    let mut built = 0;
    for id in graph.segment_ids() {
        let Some(segment) = graph.segment(id) else {
            continue;
        };
        let road = build_road(segment, ground, config)?;
        graph.attach_road(id, road);
        built += 1;
    }
    Ok(built)
}

/// Scatter vehicles along the centre line of every paved road.
///
/// Returns the placed spawns and the number of slots that missed their road.
pub fn place_vehicles<R: Rng + ?Sized>(
    graph: &StreetGraph,
    config: &RoadSurfaceConfig,
    rng: &mut R,
) -> (Vec<VehicleSpawn>, usize) {
    let mut spawns = Vec::new();
    let mut missed = 0;

    for (_, segment) in graph.segments() {
        if config.is_dirt(segment.level) {
            continue;
        }
        let Some(road) = segment.road.as_ref() else {
            continue;
        };

        let mid = road.v_size() / 2;
        let first = road.point(0, mid);
        let last = road.point(road.u_size() - 1, mid);
        // Spacing is measured along the slope of the road.
        let slots = first.distance(last) / config.vehicle_spacing;
        let (start, end) = (first.truncate(), last.truncate());

        let mut j = 0.0;
        while j < slots {
            if rng.probability(config.vehicle_probability) {
                let xy = start.lerp(end, j / slots);
                match road.height_at(xy) {
                    Ok(z) => spawns.push(VehicleSpawn {
                        position: xy.extend(z),
                        yaw: rng.range_int(0, 360) as f32,
                    }),
                    Err(_) => missed += 1,
                }
            }
            j += 1.0;
        }
    }

    (spawns, missed)
}

fn should_build_roads(network: Res<StreetNetwork>, surfaces: Res<RoadSurfaces>) -> bool {
    network.graph.is_some() && !surfaces.built
}

fn build_road_surfaces(
    ground: Res<GroundTerrain>,
    config: Res<RoadSurfaceConfig>,
    mut network: ResMut<StreetNetwork>,
    mut surfaces: ResMut<RoadSurfaces>,
) {
    surfaces.built = true;

    let (Some(graph), Some(ground)) = (network.graph.as_mut(), ground.patch.as_ref()) else {
        return;
    };

    info!("Making road terrain patches...");
    match build_roads(graph, ground, &config) {
        Ok(count) => info!("Built {count} road surfaces"),
        Err(err) => error!("Road surface generation failed: {err}"),
    }
}

fn place_vehicle_spawns(
    config: Res<RoadSurfaceConfig>,
    network: Res<StreetNetwork>,
    mut rng: ResMut<LayoutRng>,
    mut surfaces: ResMut<RoadSurfaces>,
) {
    let Some(graph) = network.graph.as_ref() else {
        return;
    };

    let (vehicles, missed) = place_vehicles(graph, &config, &mut rng.0);
    info!("Vehicles placed: {}, unable to place: {}", vehicles.len(), missed);
    surfaces.vehicles = vehicles;
    surfaces.missed_vehicles = missed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::street_graph::StreetGraphConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_ground(z: f32) -> TerrainPatch {
        let mut ground = TerrainPatch::new(4, 4).unwrap();
        ground.layout_rectangular(-2000.0, -2000.0, 6000.0, 6000.0);
        for u in 0..4 {
            for v in 0..4 {
                let p = ground.point(u, v);
                ground.set_point(u, v, p.truncate().extend(z));
            }
        }
        ground
    }

    fn segment(pt1: Vec2, pt2: Vec2, level: u32) -> Segment {
        Segment {
            pt1,
            pt2,
            level,
            road: None,
        }
    }

    #[test]
    fn road_follows_its_segment() {
        let config = RoadSurfaceConfig::default();
        let seg = segment(Vec2::new(0.0, 0.0), Vec2::new(1000.0, 0.0), 1);
        let road = build_road(&seg, &flat_ground(10.0), &config).unwrap();

        // ceil(1000 / 220) = 5 cells.
        assert_eq!(road.u_size(), 6);
        assert_eq!(road.v_size(), 9);

        let first = road.point(0, 4);
        let last = road.point(5, 4);
        assert!((first.truncate() - seg.pt1).length() < 1e-3);
        assert!((last.truncate() - seg.pt2).length() < 1e-3);

        // Level 1 is 160 wide; the cross-section runs along +Y for a +X road.
        assert!((road.point(0, 0).y + 160.0).abs() < 1e-3);
        assert!((road.point(0, 8).y - 160.0).abs() < 1e-3);
    }

    #[test]
    fn paved_road_is_crowned() {
        let config = RoadSurfaceConfig::default();
        let seg = segment(Vec2::new(0.0, 0.0), Vec2::new(500.0, 0.0), 0);
        let road = build_road(&seg, &flat_ground(10.0), &config).unwrap();

        // Paved level 0: h = 220 / 20 = 11.
        assert!((road.point(1, 4).z - 21.0).abs() < 1e-3);
        assert!((road.point(1, 0).z - (10.0 - 55.0)).abs() < 1e-3);
        assert!((road.point(1, 3).z - 15.5).abs() < 1e-3);
    }

    #[test]
    fn dirt_road_has_low_crown() {
        let config = RoadSurfaceConfig::default();
        let seg = segment(Vec2::new(0.0, 0.0), Vec2::new(0.0, 300.0), 5);
        let road = build_road(&seg, &flat_ground(0.0), &config).unwrap();

        // Dirt level 5: w = 20, h = 0.2.
        assert!((road.point(0, 4).z - 0.2).abs() < 1e-5);
        assert!((road.point(0, 0).z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn off_ground_points_start_at_zero() {
        let config = RoadSurfaceConfig::default();
        let seg = segment(Vec2::new(10_000.0, 0.0), Vec2::new(10_500.0, 0.0), 6);
        let road = build_road(&seg, &flat_ground(50.0), &config).unwrap();

        // h = 10 / 100 = 0.1 added to a 0 base.
        assert!((road.point(0, 4).z - 0.1).abs() < 1e-5);
    }

    #[test]
    fn deep_levels_use_narrowest_width() {
        let config = RoadSurfaceConfig::default();
        assert_eq!(config.half_width(0), 220.0);
        assert_eq!(config.half_width(6), 10.0);
        assert_eq!(config.half_width(40), 10.0);
        assert!(config.is_dirt(4));
        assert!(!config.is_dirt(3));
    }

    fn square(side: f32) -> [Vec2; 4] {
        [
            Vec2::new(0.0, 0.0),
            Vec2::new(side, 0.0),
            Vec2::new(side, side),
            Vec2::new(0.0, side),
        ]
    }

    #[test]
    fn every_segment_gets_a_road() {
        let mut rng = StdRng::seed_from_u64(8);
        let cfg = StreetGraphConfig {
            max_area: 1_000_000.0,
            ..default()
        };
        let mut graph = StreetGraph::subdivide(&square(3000.0), &cfg, &mut rng).unwrap();

        let config = RoadSurfaceConfig::default();
        let built = build_roads(&mut graph, &flat_ground(5.0), &config).unwrap();
        assert_eq!(built, graph.segment_count());
        assert!(graph.segments().all(|(_, s)| s.road.is_some()));
    }

    #[test]
    fn vehicles_sit_on_the_crown() {
        let mut rng = StdRng::seed_from_u64(8);
        let cfg = StreetGraphConfig {
            max_area: 1.0e8,
            ..default()
        };
        let mut graph = StreetGraph::subdivide(&square(3000.0), &cfg, &mut rng).unwrap();
        let config = RoadSurfaceConfig::default();
        build_roads(&mut graph, &flat_ground(5.0), &config).unwrap();

        let (spawns, missed) = place_vehicles(&graph, &config, &mut rng);
        assert_eq!(missed, 0);
        assert!(!spawns.is_empty());
        for spawn in &spawns {
            assert!((0.0..=360.0).contains(&spawn.yaw));
            // Level 0 crown is 220 / 20 above the ground.
            assert!((spawn.position.z - 16.0).abs() < 1e-2, "{spawn:?}");
        }
    }

    #[test]
    fn vehicle_spacing_follows_the_slope() {
        // z = 0.75 x, so a 1000 long road along X climbs 750 over 1250.
        let mut ground = flat_ground(0.0);
        for u in 0..4 {
            for v in 0..4 {
                let p = ground.point(u, v);
                ground.set_point(u, v, p.truncate().extend(0.75 * p.x));
            }
        }

        let mut graph = StreetGraph::subdivide(
            &square(1000.0),
            &StreetGraphConfig {
                max_area: 1.0e8,
                ..default()
            },
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        let config = RoadSurfaceConfig {
            vehicle_probability: 1.0,
            ..default()
        };
        build_roads(&mut graph, &ground, &config).unwrap();

        // Two climbing roads with ceil(1250 / 120) slots, two level ones with ceil(1000 / 120).
        let (spawns, missed) = place_vehicles(&graph, &config, &mut StdRng::seed_from_u64(2));
        assert_eq!(spawns.len() + missed, 2 * 11 + 2 * 9);
    }

    #[test]
    fn dirt_roads_get_no_vehicles() {
        let mut graph = StreetGraph::subdivide(
            &square(1000.0),
            &StreetGraphConfig {
                max_area: 1.0e8,
                ..default()
            },
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        let config = RoadSurfaceConfig {
            dirt_level: 0,
            vehicle_probability: 1.0,
            ..default()
        };
        build_roads(&mut graph, &flat_ground(0.0), &config).unwrap();

        let (spawns, missed) = place_vehicles(&graph, &config, &mut StdRng::seed_from_u64(2));
        assert!(spawns.is_empty());
        assert_eq!(missed, 0);
    }
}
