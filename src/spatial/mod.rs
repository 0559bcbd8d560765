//! Spatial knowledge: where things are

pub mod knowledge;

pub use knowledge::{KnownPlace, PlaceKind, SpatialKnowledge};
