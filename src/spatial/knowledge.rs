//! Landmark, resource and danger registry
//!
//! Places are identified by kind + name + category. Rediscovering a known
//! place bumps its visit count instead of adding a duplicate. Spatial facts
//! never expire on their own.

use crate::core::error::Result;
use crate::core::types::{AgentId, Tick, Vec3};
use crate::persistence::{self, DataKind, Persistence};
use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Edge length of the cells dangers are bucketed into (world units)
///
/// Hostiles wander, so sightings within the same 8-block cell count as
/// repeat encounters of one danger zone.
const DANGER_CELL: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlaceKind {
    Landmark,
    Resource,
    Danger,
}

/// A remembered place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownPlace {
    pub kind: PlaceKind,
    /// Landmark name, or a location label for resources and dangers
    pub name: String,
    /// Landmark category, resource type or danger type
    pub category: String,
    pub position: Vec3,
    pub discovered_tick: Tick,
    pub last_seen_tick: Tick,
    /// Visits (landmarks, resources) or encounters (dangers)
    pub visits: u32,
    #[serde(default)]
    pub notes: String,
}

type PlaceKey = (PlaceKind, String, String);

/// In-memory spatial index, hydrated from and flushed to storage
#[derive(Debug, Clone, Default)]
pub struct SpatialKnowledge {
    places: AHashMap<PlaceKey, KnownPlace>,
}

impl SpatialKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a place, returning its visit count
    pub fn record(
        &mut self,
        kind: PlaceKind,
        name: &str,
        category: &str,
        position: Vec3,
        tick: Tick,
    ) -> u32 {
        let key = (kind, name.to_string(), category.to_string());
        let place = self.places.entry(key).or_insert_with(|| {
            tracing::debug!(?kind, name, category, %position, "Discovered place");
            KnownPlace {
                kind,
                name: name.to_string(),
                category: category.to_string(),
                position,
                discovered_tick: tick,
                last_seen_tick: tick,
                visits: 0,
                notes: String::new(),
            }
        });
        place.visits += 1;
        place.last_seen_tick = place.last_seen_tick.max(tick);
        place.visits
    }

    pub fn add_landmark(&mut self, name: &str, category: &str, position: Vec3, tick: Tick) -> u32 {
        self.record(PlaceKind::Landmark, name, category, position, tick)
    }

    /// Resources are identified by type and block cell
    pub fn add_resource(&mut self, resource_type: &str, position: Vec3, tick: Tick) -> u32 {
        let label = location_label(resource_type, position, 1.0);
        self.record(PlaceKind::Resource, &label, resource_type, position, tick)
    }

    /// Dangers are identified by type and coarse cell
    pub fn add_danger(&mut self, danger_type: &str, position: Vec3, tick: Tick) -> u32 {
        let label = location_label(danger_type, position, DANGER_CELL);
        self.record(PlaceKind::Danger, &label, danger_type, position, tick)
    }

    /// Whether a resource of this type is already known in this block cell
    pub fn knows_resource(&self, resource_type: &str, position: Vec3) -> bool {
        let label = location_label(resource_type, position, 1.0);
        self.places
            .contains_key(&(PlaceKind::Resource, label, resource_type.to_string()))
    }

    /// Attach free-form notes to a known place
    pub fn annotate(&mut self, kind: PlaceKind, name: &str, category: &str, notes: &str) -> bool {
        let key = (kind, name.to_string(), category.to_string());
        match self.places.get_mut(&key) {
            Some(place) => {
                place.notes = notes.to_string();
                true
            }
            None => false,
        }
    }

    /// Closest known place of `kind`, optionally restricted to one category
    pub fn find_nearest(&self, position: Vec3, kind: PlaceKind, category: Option<&str>) -> Option<&KnownPlace> {
        self.places
            .values()
            .filter(|p| p.kind == kind)
            .filter(|p| category.map_or(true, |c| p.category == c))
            .min_by_key(|p| (OrderedFloat(p.position.distance(&position)), p.discovered_tick, p.name.clone()))
    }

    /// Exact landmark lookup by name
    pub fn find_landmark(&self, name: &str) -> Option<&KnownPlace> {
        self.places
            .values()
            .filter(|p| p.kind == PlaceKind::Landmark && p.name == name)
            .min_by(|a, b| a.discovered_tick.cmp(&b.discovered_tick).then_with(|| a.category.cmp(&b.category)))
    }

    /// Dangers within `radius` of `position`
    pub fn dangers_within(&self, position: Vec3, radius: f32) -> Vec<&KnownPlace> {
        let mut dangers: Vec<&KnownPlace> = self
            .places
            .values()
            .filter(|p| p.kind == PlaceKind::Danger && p.position.distance(&position) <= radius)
            .collect();
        dangers.sort_by_key(|p| OrderedFloat(p.position.distance(&position)));
        dangers
    }

    pub fn count(&self, kind: PlaceKind) -> usize {
        self.places.values().filter(|p| p.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownPlace> {
        self.places.values()
    }

    /// Short lines describing the places closest to `position`
    pub fn summary(&self, position: Vec3, limit: usize) -> Vec<String> {
        let mut places: Vec<&KnownPlace> = self.places.values().collect();
        places.sort_by_key(|p| (OrderedFloat(p.position.distance(&position)), p.name.clone()));
        places
            .into_iter()
            .take(limit)
            .map(|p| {
                format!(
                    "{:?} {} ({}) at {}, {:.0} away, seen {}x",
                    p.kind,
                    p.name,
                    p.category,
                    p.position,
                    p.position.distance(&position),
                    p.visits
                )
            })
            .collect()
    }

    /// Places in a stable order (kind, category, name)
    fn sorted(&self) -> Vec<KnownPlace> {
        let mut places: Vec<KnownPlace> = self.places.values().cloned().collect();
        places.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.name.cmp(&b.name))
        });
        places
    }

    pub fn save(&self, store: &dyn Persistence, agent: AgentId) -> Result<()> {
        persistence::save_json(store, agent, DataKind::SpatialKnowledge, &self.sorted())
    }

    /// Hydrate from storage; absent or corrupted data yields an empty store
    pub fn load(store: &dyn Persistence, agent: AgentId) -> Self {
        let places: Vec<KnownPlace> = persistence::load_json(store, agent, DataKind::SpatialKnowledge);
        let places = places
            .into_iter()
            .map(|p| ((p.kind, p.name.clone(), p.category.clone()), p))
            .collect();
        Self { places }
    }
}

fn location_label(category: &str, position: Vec3, cell: f32) -> String {
    let scaled = position * (1.0 / cell);
    let (x, y, z) = scaled.cell();
    format!("{}@{},{},{}", category, x, y, z)
}
