//! Semantic building entities derived from the geometric model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::geometry::Point;

/// Functional classification of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Office,
    Meeting,
    Classroom,
    Living,
    Bedroom,
    Kitchen,
    Sanitary,
    Bathroom,
    Corridor,
    Stair,
    Storage,
    Technical,
    Retail,
    Ward,
    Production,
    Other,
}

impl SpaceType {
    pub fn name(&self) -> &'static str {
        match self {
            SpaceType::Office => "office",
            SpaceType::Meeting => "meeting",
            SpaceType::Classroom => "classroom",
            SpaceType::Living => "living",
            SpaceType::Bedroom => "bedroom",
            SpaceType::Kitchen => "kitchen",
            SpaceType::Sanitary => "sanitary",
            SpaceType::Bathroom => "bathroom",
            SpaceType::Corridor => "corridor",
            SpaceType::Stair => "stair",
            SpaceType::Storage => "storage",
            SpaceType::Technical => "technical",
            SpaceType::Retail => "retail",
            SpaceType::Ward => "ward",
            SpaceType::Production => "production",
            SpaceType::Other => "other",
        }
    }

    /// Rooms with water fixtures.
    pub fn is_wet(&self) -> bool {
        matches!(
            self,
            SpaceType::Kitchen | SpaceType::Sanitary | SpaceType::Bathroom
        )
    }

    /// Rooms where people stay for extended periods.
    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            SpaceType::Office
                | SpaceType::Meeting
                | SpaceType::Classroom
                | SpaceType::Living
                | SpaceType::Bedroom
                | SpaceType::Kitchen
                | SpaceType::Retail
                | SpaceType::Ward
                | SpaceType::Production
        )
    }

    /// Rooms that act as protected escape routes.
    pub fn is_exit(&self) -> bool {
        matches!(self, SpaceType::Stair)
    }

    /// Design occupant density in persons per m².
    pub fn occupancy_density(&self) -> f64 {
        match self {
            SpaceType::Office => 0.10,
            SpaceType::Meeting => 0.50,
            SpaceType::Classroom => 0.50,
            SpaceType::Living | SpaceType::Bedroom => 0.04,
            SpaceType::Kitchen => 0.10,
            SpaceType::Retail => 0.20,
            SpaceType::Ward => 0.10,
            SpaceType::Production => 0.05,
            _ => 0.0,
        }
    }
}

impl fmt::Display for SpaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Water fixture kinds placed in wet rooms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    Washbasin,
    Wc,
    Shower,
    Sink,
    Dishwasher,
}

/// Location where a fixture connects to the services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixtureAnchor {
    pub kind: FixtureKind,
    pub position: Point,
}

/// A closed, classified room with computed geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: String,
    pub level: usize,
    pub name: Option<String>,
    pub space_type: SpaceType,
    pub vertices: Vec<Point>,
    pub area_m2: f64,
    pub perimeter_m: f64,
    /// Perimeter length not shared with any neighbouring room.
    pub exterior_wall_m: f64,
    pub height_m: f64,
    pub centroid: Point,
    /// Shorter side of the axis-aligned bounding box.
    pub short_side_m: f64,
    /// Longer side of the axis-aligned bounding box.
    pub long_side_m: f64,
    pub doors: u32,
    pub windows: u32,
    pub window_area_m2: f64,
    pub fixtures: Vec<FixtureAnchor>,
}

impl Room {
    pub fn volume_m3(&self) -> f64 {
        self.area_m2 * self.height_m
    }

    pub fn occupants(&self) -> f64 {
        self.area_m2 * self.space_type.occupancy_density()
    }

    pub fn fixture_count(&self, kind: FixtureKind) -> usize {
        self.fixtures.iter().filter(|f| f.kind == kind).count()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Two rooms sharing a wall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adjacency {
    pub a: String,
    pub b: String,
    pub shared_length_m: f64,
}

/// Storey metadata after extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelInfo {
    pub index: usize,
    pub name: String,
    pub elevation_m: f64,
    pub storey_height_m: f64,
}

/// Extracted entity model consumed by every generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildingModel {
    pub levels: Vec<LevelInfo>,
    pub rooms: Vec<Room>,
    pub adjacency: Vec<Adjacency>,
}

impl BuildingModel {
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn rooms_on_level(&self, level: usize) -> impl Iterator<Item = &Room> {
        self.rooms.iter().filter(move |r| r.level == level)
    }

    /// Neighbour ids with shared wall length.
    pub fn neighbours(&self, id: &str) -> Vec<(&str, f64)> {
        self.adjacency
            .iter()
            .filter_map(|adj| {
                if adj.a == id {
                    Some((adj.b.as_str(), adj.shared_length_m))
                } else if adj.b == id {
                    Some((adj.a.as_str(), adj.shared_length_m))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn net_floor_area_m2(&self) -> f64 {
        self.rooms.iter().map(|r| r.area_m2).sum()
    }

    /// Floor area per level index.
    pub fn area_by_level(&self) -> BTreeMap<usize, f64> {
        let mut out = BTreeMap::new();
        for room in &self.rooms {
            *out.entry(room.level).or_insert(0.0) += room.area_m2;
        }
        out
    }
}
