//! Arenagen - procedural outdoor arena layout
//!
//! Street graphs from recursive polygon subdivision, height-field terrain
//! patches for the ground and roads, and building footprints fitted inside
//! the parcels the streets leave behind.

pub mod procgen;
pub mod world;
