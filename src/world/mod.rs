//! World management: arena configuration, the layout random source and the ground.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub mod terrain;

use terrain::{TerrainError, TerrainPatch};

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WorldConfig>()
            .init_resource::<LayoutRng>()
            .init_resource::<GroundTerrain>()
            .add_systems(Startup, (seed_layout_rng, generate_ground_terrain).chain());
    }
}

/// Global arena configuration.
#[derive(Resource, Clone, Debug)]
pub struct WorldConfig {
    /// Arena extent in map units; `z` is the tallest the ground may get.
    pub size: Vec3,
    /// Area the street graph spans, centred in the arena.
    pub play_size: Vec2,
    /// Ground grid points along each axis.
    pub ground_resolution: usize,
    /// Smoothing passes applied to the random ground.
    pub smoothing_passes: usize,
    /// Seed for every random decision in the layout.
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: Vec3::new(10240.0, 10240.0, 600.0),
            play_size: Vec2::new(8192.0, 8192.0),
            ground_resolution: 16,
            smoothing_passes: 15,
            seed: 1,
        }
    }
}

/// The one random generator every layout stage draws from.
#[derive(Resource)]
pub struct LayoutRng(pub StdRng);

impl LayoutRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for LayoutRng {
    fn default() -> Self {
        Self::from_seed(WorldConfig::default().seed)
    }
}

/// Rolling ground under the whole arena.
#[derive(Resource, Default)]
pub struct GroundTerrain {
    pub patch: Option<TerrainPatch>,
}

/// Random heights over the whole arena, smoothed into hills and stretched
/// back to the full height range.
pub fn generate_ground<R: rand::Rng + ?Sized>(
    config: &WorldConfig,
    rng: &mut R,
) -> Result<TerrainPatch, TerrainError> {
    let res = config.ground_resolution;
    let mut ground = TerrainPatch::new(res, res)?;
    ground.layout_rectangular(0.0, 0.0, config.size.x, config.size.y);
    ground.randomize(config.size.z, rng);
    for _ in 0..config.smoothing_passes {
        ground.smooth();
    }
    ground.amplify(config.size.z);
    Ok(ground)
}

fn seed_layout_rng(config: Res<WorldConfig>, mut rng: ResMut<LayoutRng>) {
    info!("Seeding layout with {}", config.seed);
    *rng = LayoutRng::from_seed(config.seed);
}

fn generate_ground_terrain(
    config: Res<WorldConfig>,
    mut rng: ResMut<LayoutRng>,
    mut ground: ResMut<GroundTerrain>,
) {
    info!("Generating ground terrain...");
    match generate_ground(&config, &mut rng.0) {
        Ok(patch) => {
            let (low, high) = patch.height_range();
            info!("Ground terrain ready: heights {low:.1}..{high:.1}");
            ground.patch = Some(patch);
        }
        Err(err) => error!("Ground terrain generation failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_spans_full_height_range() {
        let config = WorldConfig::default();
        let ground = generate_ground(&config, &mut StdRng::seed_from_u64(5)).unwrap();

        let (low, high) = ground.height_range();
        assert!(low.abs() < 1e-3);
        assert!((high - config.size.z).abs() < 1e-2);

        assert_eq!(ground.u_size(), 16);
        let far = ground.point(15, 15);
        assert_eq!((far.x, far.y), (config.size.x, config.size.y));
    }

    #[test]
    fn ground_covers_the_arena() {
        let config = WorldConfig::default();
        let ground = generate_ground(&config, &mut StdRng::seed_from_u64(5)).unwrap();

        let center = config.size.truncate() / 2.0;
        let z = ground.height_at(center).unwrap();
        assert!((0.0..=config.size.z).contains(&z));
        assert!(ground.height_at(Vec2::new(-10.0, 5.0)).unwrap_err().is_miss());
    }

    #[test]
    fn same_seed_same_ground() {
        let config = WorldConfig::default();
        let a = generate_ground(&config, &mut LayoutRng::from_seed(9).0).unwrap();
        let b = generate_ground(&config, &mut LayoutRng::from_seed(9).0).unwrap();
        assert!(a.points().eq(b.points()));
    }

    #[test]
    fn tiny_ground_grid_is_rejected() {
        let config = WorldConfig {
            ground_resolution: 1,
            ..default()
        };
        let err = generate_ground(&config, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(!err.is_miss());
    }
}
