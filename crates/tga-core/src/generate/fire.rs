//! Extinguishers, detection and escape distances.
//!
//! Escape distances are shortest paths over the room adjacency graph,
//! weighted by centroid distance, to the nearest exit room. Stairs are exits
//! on every storey. On the lowest storey, corridors with an exterior wall
//! are exits as well.

use std::collections::HashMap;

use pathfinding::prelude::dijkstra;

use crate::domain::{
    ArtifactDocument, BuildingCategory, BuildingModel, CalculationTable, Discipline,
    GenerationError, Room, SpaceType,
};
use crate::generate::tables::fmt;
use crate::generate::{room_row, DisciplineGenerator, GenerationInput, MetricsExt, GENERATOR_VERSION};

/// Extinguishing units per extinguisher.
const LE_PER_EXTINGUISHER: u32 = 6;
/// Basic equipment for normal fire risk: (area up to m², LE).
const LE_TABLE: [(f64, u32); 11] = [
    (50.0, 6),
    (100.0, 9),
    (200.0, 12),
    (300.0, 15),
    (400.0, 18),
    (500.0, 21),
    (600.0, 24),
    (700.0, 27),
    (800.0, 30),
    (900.0, 33),
    (1000.0, 36),
];
const LE_INCREMENT_AREA_M2: f64 = 250.0;
const LE_INCREMENT: u32 = 6;

const SMOKE_DETECTOR_AREA_M2: f64 = 60.0;
const HEAT_DETECTOR_AREA_M2: f64 = 30.0;

/// Required extinguishing units for a storey of `area_m2`.
pub fn required_le(area_m2: f64) -> u32 {
    if let Some((_, le)) = LE_TABLE.iter().find(|(limit, _)| area_m2 <= *limit) {
        return *le;
    }
    let extra = ((area_m2 - 1000.0) / LE_INCREMENT_AREA_M2).ceil() as u32;
    36 + extra * LE_INCREMENT
}

fn detector_area(space: SpaceType) -> f64 {
    match space {
        SpaceType::Kitchen => HEAT_DETECTOR_AREA_M2,
        _ => SMOKE_DETECTOR_AREA_M2,
    }
}

fn needs_smoke_alarm(category: BuildingCategory, space: SpaceType) -> bool {
    category == BuildingCategory::Residential
        && matches!(space, SpaceType::Bedroom | SpaceType::Living | SpaceType::Corridor)
}

/// Shortest escape route of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct EscapeRoute {
    pub path: Vec<String>,
    pub distance_m: f64,
}

/// Escape route of every non-exit room; `None` when no exit is reachable.
pub fn escape_routes(building: &BuildingModel) -> Vec<(usize, Option<EscapeRoute>)> {
    let bottom = building.levels.iter().map(|l| l.index).min().unwrap_or(0);
    let is_exit = |room: &Room| {
        room.space_type.is_exit()
            || (room.level == bottom
                && room.space_type == SpaceType::Corridor
                && room.exterior_wall_m > 0.0)
    };
    let index: HashMap<&str, usize> = building
        .rooms
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect();
    let mut graph: Vec<Vec<(usize, u64)>> = vec![Vec::new(); building.rooms.len()];
    for adj in &building.adjacency {
        let (Some(&a), Some(&b)) = (index.get(adj.a.as_str()), index.get(adj.b.as_str())) else {
            continue;
        };
        let d = building.rooms[a].centroid.distance(&building.rooms[b].centroid);
        let cost = (d * 1000.0).round() as u64;
        graph[a].push((b, cost));
        graph[b].push((a, cost));
    }

    building
        .rooms
        .iter()
        .enumerate()
        .filter(|(_, room)| !is_exit(room))
        .map(|(start, room)| {
            let found = dijkstra(
                &start,
                |n| graph[*n].iter().copied(),
                |n| is_exit(&building.rooms[*n]),
            );
            let route = found.map(|(path, cost)| {
                // Worst point of the room to its centroid.
                let inner = 0.5 * room.short_side_m.hypot(room.long_side_m);
                EscapeRoute {
                    path: path.iter().map(|i| building.rooms[*i].id.clone()).collect(),
                    distance_m: cost as f64 / 1000.0 + inner,
                }
            });
            (start, route)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FireProtectionGenerator;

impl DisciplineGenerator for FireProtectionGenerator {
    fn discipline(&self) -> Discipline {
        Discipline::FireProtection
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let building = &input.building;
        let category = input.project.category;
        let mut doc = ArtifactDocument::new(self.discipline(), GENERATOR_VERSION);

        let mut extinguishers = CalculationTable::new(
            "Extinguishers",
            &["Level", "Area m²", "LE required", "Extinguishers", "LE provided"],
        );
        let mut le_required = 0;
        let mut le_provided = 0;
        let mut extinguisher_count = 0;
        let mut le_coverage = f64::INFINITY;
        for (level, area) in building.area_by_level() {
            let required = required_le(area);
            let count = required.div_ceil(LE_PER_EXTINGUISHER).max(1);
            let provided = count * LE_PER_EXTINGUISHER;
            le_required += required;
            le_provided += provided;
            extinguisher_count += count;
            le_coverage = le_coverage.min(provided as f64 / required as f64);
            extinguishers.push_row(vec![
                level.to_string(),
                fmt(area, 1),
                required.to_string(),
                count.to_string(),
                provided.to_string(),
            ]);
        }
        if !le_coverage.is_finite() {
            return Err(GenerationError::new(self.discipline(), "building has no storeys"));
        }

        let routes: HashMap<usize, Option<EscapeRoute>> = escape_routes(building).into_iter().collect();

        let mut detection = CalculationTable::new("Detection", &["Room", "Use", "Detector", "Count"]);
        let mut escape = CalculationTable::new("Escape routes", &["Room", "Level", "Route", "Distance m"]);
        let mut detectors_total = 0;
        let mut detector_coverage = f64::INFINITY;
        let mut max_escape: f64 = 0.0;
        let mut unreachable = 0;

        for (i, room) in building.rooms.iter().enumerate() {
            let per_detector = detector_area(room.space_type);
            let detectors = ((room.area_m2 / per_detector).ceil() as u32).max(1);
            detectors_total += detectors;
            detector_coverage = detector_coverage.min(detectors as f64 * per_detector / room.area_m2);

            let mut row = room_row(room);
            row.put("detectors", detectors as f64);
            if needs_smoke_alarm(category, room.space_type) {
                row.put("smoke_alarm", 1.0);
            }
            match routes.get(&i) {
                Some(Some(route)) => {
                    max_escape = max_escape.max(route.distance_m);
                    row.put("escape_distance_m", route.distance_m);
                    row.put("escape_route_reachable", 1.0);
                    escape.push_row(vec![
                        room.id.clone(),
                        room.level.to_string(),
                        route.path.join(" → "),
                        fmt(route.distance_m, 1),
                    ]);
                }
                Some(None) => {
                    unreachable += 1;
                    row.put("escape_route_reachable", 0.0);
                    escape.push_row(vec![
                        room.id.clone(),
                        room.level.to_string(),
                        "no exit reachable".to_string(),
                        "-".to_string(),
                    ]);
                }
                None => {}
            }
            doc.rooms.push(row);
            detection.push_row(vec![
                room.id.clone(),
                room.space_type.to_string(),
                if room.space_type == SpaceType::Kitchen { "heat" } else { "smoke" }.to_string(),
                detectors.to_string(),
            ]);
        }

        let exits = building.rooms.len() - routes.len();
        doc.put("le_required", le_required as f64);
        doc.put("le_provided", le_provided as f64);
        doc.put("le_coverage", le_coverage);
        doc.put("extinguishers", extinguisher_count as f64);
        doc.put("detectors", detectors_total as f64);
        doc.put("detector_coverage", detector_coverage);
        doc.put("exit_rooms", exits as f64);
        doc.put("max_escape_distance_m", max_escape);
        doc.put("unreachable_rooms", unreachable as f64);
        doc.tables.push(extinguishers);
        doc.tables.push(detection);
        doc.tables.push(escape);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Adjacency, LevelInfo, Point};
    use crate::generate::test_support::{room, sample_building, sample_input};

    #[test]
    fn test_required_le() {
        assert_eq!(required_le(40.0), 6);
        assert_eq!(required_le(360.0), 18);
        assert_eq!(required_le(1000.0), 36);
        assert_eq!(required_le(1001.0), 42);
        assert_eq!(required_le(1500.0), 48);
    }

    #[test]
    fn test_sample_routes_reach_stair() {
        let building = sample_building();
        let routes = escape_routes(&building);
        // stairs everywhere plus the ground floor corridor
        assert_eq!(routes.len(), 36 - 4);
        for (_, route) in &routes {
            let route = route.as_ref().expect("reachable");
            assert!(route.distance_m < 35.0, "{route:?}");
        }
        let upper_office = building
            .rooms
            .iter()
            .position(|r| r.id == "L2-R12")
            .expect("room");
        let (_, route) = routes.iter().find(|(i, _)| *i == upper_office).expect("route");
        let route = route.as_ref().expect("reachable");
        assert_eq!(route.path.first().map(String::as_str), Some("L2-R12"));
        assert_eq!(route.path.last().map(String::as_str), Some("L2-R01"));
    }

    #[test]
    fn test_isolated_room_unreachable() {
        let square = |x: f64| {
            vec![
                Point::new(x, 0.0),
                Point::new(x + 4.0, 0.0),
                Point::new(x + 4.0, 4.0),
                Point::new(x, 4.0),
            ]
        };
        let mk = |id: &str, space: SpaceType, x: f64| Room {
            id: id.to_string(),
            level: 0,
            name: None,
            space_type: space,
            vertices: square(x),
            area_m2: 16.0,
            perimeter_m: 16.0,
            exterior_wall_m: 12.0,
            height_m: 3.0,
            centroid: Point::new(x + 2.0, 2.0),
            short_side_m: 4.0,
            long_side_m: 4.0,
            doors: 1,
            windows: 0,
            window_area_m2: 0.0,
            fixtures: Vec::new(),
        };
        let building = BuildingModel {
            levels: vec![LevelInfo {
                index: 0,
                name: "Level 0".into(),
                elevation_m: 0.0,
                storey_height_m: 3.0,
            }],
            rooms: vec![
                mk("stair", SpaceType::Stair, 0.0),
                mk("office", SpaceType::Office, 4.0),
                mk("island", SpaceType::Office, 20.0),
            ],
            adjacency: vec![Adjacency {
                a: "stair".into(),
                b: "office".into(),
                shared_length_m: 4.0,
            }],
        };
        let routes: HashMap<usize, Option<EscapeRoute>> = escape_routes(&building).into_iter().collect();
        let office = routes[&1].as_ref().expect("office reachable");
        // 4 m between centroids plus half the diagonal
        assert!((office.distance_m - (4.0 + 0.5 * 32f64.sqrt())).abs() < 1e-3);
        assert!(routes[&2].is_none());
    }

    #[test]
    fn test_sample_design() {
        let doc = FireProtectionGenerator
            .design(&sample_input(Discipline::FireProtection))
            .expect("design");
        // 360 m² per storey → 18 LE → 3 extinguishers
        assert_eq!(doc.metric("le_required"), Some(54.0));
        assert_eq!(doc.metric("extinguishers"), Some(9.0));
        assert!(doc.metric("le_coverage").expect("coverage") >= 1.0);
        assert!(doc.metric("detector_coverage").expect("coverage") >= 1.0);
        assert_eq!(doc.metric("unreachable_rooms"), Some(0.0));
        let kitchen = room(&doc, "L0-R06");
        assert_eq!(kitchen.metrics.get("escape_route_reachable"), Some(&1.0));
        assert!(!kitchen.metrics.contains_key("smoke_alarm"));
        let stair = room(&doc, "L0-R01");
        assert!(!stair.metrics.contains_key("escape_distance_m"));
    }
}
