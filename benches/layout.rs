use arenagen::procgen::parcels::{plan_parcels, ParcelConfig};
use arenagen::procgen::road_surface::{build_roads, RoadSurfaceConfig};
use arenagen::procgen::street_graph::{arena_outline, StreetGraph, StreetGraphConfig};
use arenagen::world::{generate_ground, WorldConfig};
use bevy::math::Vec2;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn subdivision(c: &mut Criterion) {
    let world = WorldConfig::default();
    let config = StreetGraphConfig::default();
    let origin = (world.size.truncate() - world.play_size) / 2.0;
    let outline = arena_outline(world.play_size, origin, &config, &mut StdRng::seed_from_u64(1))
        .expect("outline");

    c.bench_function("subdivide_arena", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(2);
            StreetGraph::subdivide(black_box(&outline), &config, &mut rng).expect("graph")
        })
    });
}

fn height_lookup(c: &mut Criterion) {
    let world = WorldConfig::default();
    let ground = generate_ground(&world, &mut StdRng::seed_from_u64(3)).expect("ground");
    let samples: Vec<Vec2> = (0..256)
        .map(|i| Vec2::new((i % 16) as f32 * 600.0 + 37.0, (i / 16) as f32 * 600.0 + 91.0))
        .collect();

    c.bench_function("ground_height_at", |b| {
        b.iter(|| {
            samples
                .iter()
                .filter_map(|p| ground.height_at(black_box(*p)).ok())
                .sum::<f32>()
        })
    });
}

fn full_layout(c: &mut Criterion) {
    let world = WorldConfig::default();
    let streets = StreetGraphConfig::default();
    let roads = RoadSurfaceConfig::default();
    let parcels = ParcelConfig::default();
    let origin = (world.size.truncate() - world.play_size) / 2.0;

    c.bench_function("full_layout", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(world.seed);
            let ground = generate_ground(&world, &mut rng).expect("ground");
            let outline =
                arena_outline(world.play_size, origin, &streets, &mut rng).expect("outline");
            let mut graph = StreetGraph::subdivide(&outline, &streets, &mut rng).expect("graph");
            build_roads(&mut graph, &ground, &roads).expect("roads");
            plan_parcels(&graph, &ground, &parcels, &mut rng)
        })
    });
}

criterion_group!(benches, subdivision, height_lookup, full_layout);
criterion_main!(benches);
