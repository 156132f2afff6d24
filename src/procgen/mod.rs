//! Procedural layout systems.
//!
//! - Recursive polygon subdivision for the street graph
//! - Road surfaces draped over the ground
//! - Inner parcel boundaries and building footprints

use bevy::prelude::*;

pub mod geometry;
pub mod inner_boundary;
pub mod parcels;
pub mod rect_fit;
pub mod road_surface;
pub mod selector;
pub mod street_graph;

/// Layout stages, run in order within a single update.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayoutSet {
    Streets,
    Roads,
    Parcels,
}

pub struct ProcgenPlugin;

impl Plugin for ProcgenPlugin {
    fn build(&self, app: &mut App) {
        // Roads need the finished graph; parcels need the roads
        app.configure_sets(
            Update,
            (LayoutSet::Streets, LayoutSet::Roads, LayoutSet::Parcels).chain(),
        )
        .add_plugins(street_graph::StreetGraphPlugin)
        .add_plugins(road_surface::RoadSurfacePlugin)
        .add_plugins(parcels::ParcelPlugin);
    }
}
