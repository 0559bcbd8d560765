//! Host-provided world view

pub mod snapshot;

pub use snapshot::{AgentVitals, BlockSample, NearbyEntity, TerrainSample, WorldSnapshot};
