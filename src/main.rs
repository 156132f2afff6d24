//! Arenagen - headless arena layout generator
//!
//! Runs every layout stage once and logs the results. The first argument,
//! if given, is the layout seed.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use arenagen::procgen::ProcgenPlugin;
use arenagen::world::{WorldConfig, WorldPlugin};

fn main() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_once()))
        .add_plugins(LogPlugin::default());

    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse() {
            Ok(seed) => {
                app.insert_resource(WorldConfig { seed, ..default() });
            }
            Err(err) => warn!("Ignoring seed {arg:?}: {err}"),
        }
    }

    app
        // World management
        .add_plugins(WorldPlugin)
        // Procedural generation
        .add_plugins(ProcgenPlugin)
        .run();
}
