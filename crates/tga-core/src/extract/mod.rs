//! Entity extraction: [`GeometricModel`] → [`BuildingModel`].
//!
//! Room outlines are closed (or rejected), measured, labelled, classified and
//! connected into an adjacency graph. Boundaries that cannot be closed are
//! reported as [`ExtractError::IncompleteGeometry`] rather than approximated.

pub mod adjacency;
pub mod classify;
pub mod polygon;

use tracing::{debug, instrument};

use crate::config::ExtractConfig;
use crate::domain::{
    polygon_edges, signed_area, BuildingModel, ExtractError, FixtureAnchor, FixtureKind,
    GeometricModel, Label, Level, LevelInfo, Opening, OpeningKind, Point, Room, RoomOutline,
    Segment, SpaceType,
};

/// Inset of fixture anchors from the wall they are mounted on.
const FIXTURE_INSET_M: f64 = 0.3;

/// Extract the building model.
#[instrument(skip_all, fields(levels = model.levels.len(), outlines = model.outline_count()))]
pub fn extract(model: &GeometricModel, config: &ExtractConfig) -> Result<BuildingModel, ExtractError> {
    let levels = level_infos(&model.levels, config);

    let mut rooms = Vec::new();
    for level in &model.levels {
        let height = levels
            .iter()
            .find(|l| l.index == level.index)
            .map_or(config.default_storey_height_m, |l| l.storey_height_m);
        for outline in &level.outlines {
            let vertices = close_outline(outline, &level.walls, config)?;
            let area = signed_area(&vertices).abs();
            if area < config.min_room_area_m2 {
                debug!(outline = %outline.id, area, "skipping outline below minimum room area");
                continue;
            }
            rooms.push(measure_room(outline, level, vertices, height, config));
        }
    }

    if rooms.is_empty() {
        return Err(ExtractError::IncompleteGeometry {
            element: "drawing".to_string(),
            detail: "no closed room outlines found".to_string(),
        });
    }

    let keyed: Vec<(&str, usize, &[Point])> = rooms
        .iter()
        .map(|r| (r.id.as_str(), r.level, r.vertices.as_slice()))
        .collect();
    let adjacency = adjacency::build(&keyed, config.min_shared_edge_m, config.max_wall_gap_m);

    for room in &mut rooms {
        let shared: f64 = adjacency
            .iter()
            .filter(|a| a.a == room.id || a.b == room.id)
            .map(|a| a.shared_length_m)
            .sum();
        room.exterior_wall_m = (room.perimeter_m - shared).max(0.0);
    }

    debug!(rooms = rooms.len(), adjacencies = adjacency.len(), "building model extracted");
    Ok(BuildingModel {
        levels,
        rooms,
        adjacency,
    })
}

fn level_infos(levels: &[Level], config: &ExtractConfig) -> Vec<LevelInfo> {
    let mut sorted: Vec<&Level> = levels.iter().collect();
    sorted.sort_by_key(|l| l.index);
    sorted
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let storey_height_m = sorted
                .get(i + 1)
                .map(|next| next.elevation_m - level.elevation_m)
                .filter(|h| *h > 0.5)
                .unwrap_or(config.default_storey_height_m);
            LevelInfo {
                index: level.index,
                name: level.name.clone(),
                elevation_m: level.elevation_m,
                storey_height_m,
            }
        })
        .collect()
}

/// Return a closed, de-duplicated, counter-clockwise vertex ring.
fn close_outline(
    outline: &RoomOutline,
    walls: &[Segment],
    config: &ExtractConfig,
) -> Result<Vec<Point>, ExtractError> {
    let incomplete = |detail: String| ExtractError::IncompleteGeometry {
        element: outline.id.clone(),
        detail,
    };

    let mut vertices = outline.vertices.clone();
    vertices.dedup_by(|a, b| a.distance(b) < 1e-9);

    let mut closed = outline.closed;
    if let (Some(first), Some(last)) = (vertices.first().copied(), vertices.last().copied()) {
        let gap = first.distance(&last);
        if vertices.len() > 3 && gap <= config.snap_tolerance_m {
            vertices.pop();
            closed = true;
        } else if !closed {
            let bridged = walls.iter().any(|w| {
                w.distance_to(&first) <= config.snap_tolerance_m
                    && w.distance_to(&last) <= config.snap_tolerance_m
            });
            if !bridged {
                return Err(incomplete(format!(
                    "outline is open with a {gap:.2} m gap between its end points"
                )));
            }
            closed = true;
        }
    }

    if !closed || vertices.len() < 3 {
        return Err(incomplete(format!(
            "outline has {} distinct vertices, at least 3 required",
            vertices.len()
        )));
    }
    if let Some((i, j)) = polygon::self_intersection(&vertices) {
        return Err(incomplete(format!("edges {i} and {j} cross each other")));
    }
    polygon::ensure_ccw(&mut vertices);
    Ok(vertices)
}

fn measure_room(
    outline: &RoomOutline,
    level: &Level,
    vertices: Vec<Point>,
    height_m: f64,
    config: &ExtractConfig,
) -> Room {
    let area_m2 = signed_area(&vertices).abs();
    let perimeter_m = polygon::perimeter(&vertices);
    let centroid = polygon::centroid(&vertices);
    let (short_side_m, long_side_m) = polygon::bbox_sides(&vertices);

    let name = room_label(&vertices, &centroid, &level.labels).map(str::to_string);
    let space_type = name
        .as_deref()
        .and_then(classify::from_label)
        .unwrap_or_else(|| classify::from_shape(area_m2, short_side_m, long_side_m));

    let (doors, windows, window_width) = count_openings(&vertices, &level.openings, config);
    let fixtures = fixture_anchors(space_type, area_m2, &vertices, &centroid);

    Room {
        id: outline.id.clone(),
        level: level.index,
        name,
        space_type,
        area_m2,
        perimeter_m,
        exterior_wall_m: perimeter_m,
        height_m,
        centroid,
        short_side_m,
        long_side_m,
        doors,
        windows,
        window_area_m2: window_width * config.window_height_m,
        fixtures,
        vertices,
    }
}

/// Label inside the room closest to its centroid.
fn room_label<'l>(vertices: &[Point], centroid: &Point, labels: &'l [Label]) -> Option<&'l str> {
    labels
        .iter()
        .filter(|l| polygon::contains(vertices, &l.position))
        .min_by(|a, b| {
            a.position
                .distance(centroid)
                .total_cmp(&b.position.distance(centroid))
        })
        .map(|l| l.text.as_str())
}

/// Openings within snap distance of the boundary. A door between two rooms
/// counts for both.
fn count_openings(
    vertices: &[Point],
    openings: &[Opening],
    config: &ExtractConfig,
) -> (u32, u32, f64) {
    let (mut doors, mut windows, mut window_width) = (0, 0, 0.0);
    for opening in openings {
        let distance = polygon::boundary_distance(vertices, &opening.position);
        if distance > config.opening_snap_m {
            continue;
        }
        match opening.kind {
            OpeningKind::Door => doors += 1,
            OpeningKind::Window => {
                windows += 1;
                window_width += opening.width_m;
            }
        }
    }
    (doors, windows, window_width)
}

/// Fixtures per wet room, spaced along its longest wall.
fn fixture_anchors(
    space_type: SpaceType,
    area_m2: f64,
    vertices: &[Point],
    centroid: &Point,
) -> Vec<FixtureAnchor> {
    let kinds: Vec<FixtureKind> = match space_type {
        SpaceType::Sanitary => {
            let wc = ((area_m2 / 3.0).round() as usize).max(1);
            let basins = wc.div_ceil(2);
            std::iter::repeat(FixtureKind::Wc)
                .take(wc)
                .chain(std::iter::repeat(FixtureKind::Washbasin).take(basins))
                .collect()
        }
        SpaceType::Bathroom => vec![FixtureKind::Wc, FixtureKind::Washbasin, FixtureKind::Shower],
        SpaceType::Kitchen => vec![FixtureKind::Sink, FixtureKind::Dishwasher],
        _ => return Vec::new(),
    };

    let Some(wall) = polygon_edges(vertices).max_by(|a, b| a.length().total_cmp(&b.length()))
    else {
        return Vec::new();
    };
    let count = kinds.len() as f64;
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| {
            let t = (i as f64 + 0.5) / count;
            let on_wall = Point::new(
                wall.start.x + t * (wall.end.x - wall.start.x),
                wall.start.y + t * (wall.end.y - wall.start.y),
            );
            let towards = on_wall.distance(centroid);
            let position = if towards > FIXTURE_INSET_M {
                let k = FIXTURE_INSET_M / towards;
                Point::new(
                    on_wall.x + k * (centroid.x - on_wall.x),
                    on_wall.y + k * (centroid.y - on_wall.y),
                )
            } else {
                *centroid
            };
            FixtureAnchor { kind, position }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DrawingFormat;

    fn outline(id: &str, points: &[(f64, f64)], closed: bool) -> RoomOutline {
        RoomOutline {
            id: id.to_string(),
            layer: "A-AREA".to_string(),
            vertices: points.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
            closed,
        }
    }

    fn label(text: &str, x: f64, y: f64) -> Label {
        Label {
            text: text.to_string(),
            position: Point::new(x, y),
        }
    }

    fn single_level(outlines: Vec<RoomOutline>, labels: Vec<Label>) -> GeometricModel {
        let mut level = Level::new(0, "Level 0", 0.0);
        level.outlines = outlines;
        level.labels = labels;
        GeometricModel {
            source_format: DrawingFormat::VectorExchange,
            levels: vec![level],
        }
    }

    #[test]
    fn test_rooms_measured_and_classified() {
        let model = single_level(
            vec![
                outline("R1", &[(0.0, 0.0), (6.0, 0.0), (6.0, 5.0), (0.0, 5.0)], true),
                outline("R2", &[(6.0, 0.0), (9.0, 0.0), (9.0, 5.0), (6.0, 5.0)], true),
            ],
            vec![label("OFFICE 0.01", 3.0, 2.5), label("WC", 7.5, 2.5)],
        );
        let building = extract(&model, &ExtractConfig::default()).expect("extract");
        assert_eq!(building.rooms.len(), 2);
        let office = building.room("R1").expect("office");
        assert_eq!(office.space_type, SpaceType::Office);
        assert!((office.area_m2 - 30.0).abs() < 1e-9);
        assert!((office.exterior_wall_m - 17.0).abs() < 1e-9);
        let wc = building.room("R2").expect("wc");
        assert_eq!(wc.space_type, SpaceType::Sanitary);
        // 15 m² → 5 WCs, 3 basins
        assert_eq!(wc.fixture_count(FixtureKind::Wc), 5);
        assert_eq!(wc.fixture_count(FixtureKind::Washbasin), 3);
        assert!(wc.fixtures.iter().all(|f| polygon::contains(&wc.vertices, &f.position)));
        assert_eq!(building.adjacency.len(), 1);
    }

    #[test]
    fn test_snap_closes_small_gap() {
        let model = single_level(
            vec![outline(
                "R1",
                &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.02)],
                false,
            )],
            Vec::new(),
        );
        let building = extract(&model, &ExtractConfig::default()).expect("extract");
        assert_eq!(building.rooms[0].vertices.len(), 4);
    }

    #[test]
    fn test_open_outline_is_incomplete() {
        let model = single_level(
            vec![outline("L0-R07", &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (1.0, 4.0)], false)],
            Vec::new(),
        );
        let err = extract(&model, &ExtractConfig::default()).unwrap_err();
        let ExtractError::IncompleteGeometry { element, detail } = err;
        assert_eq!(element, "L0-R07");
        assert!(detail.contains("gap"));
    }

    #[test]
    fn test_wall_bridges_open_outline() {
        let mut model = single_level(
            vec![outline("R1", &[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], false)],
            Vec::new(),
        );
        model.levels[0]
            .walls
            .push(Segment::new(Point::new(0.0, -0.1), Point::new(0.0, 4.1)));
        let building = extract(&model, &ExtractConfig::default()).expect("extract");
        assert!((building.rooms[0].area_m2 - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_self_intersecting_outline_is_incomplete() {
        let model = single_level(
            vec![outline("R1", &[(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 4.0)], true)],
            Vec::new(),
        );
        assert!(extract(&model, &ExtractConfig::default()).is_err());
    }

    #[test]
    fn test_no_rooms_is_incomplete() {
        let model = single_level(Vec::new(), Vec::new());
        let err = extract(&model, &ExtractConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no closed room outlines"));
    }

    #[test]
    fn test_storey_heights_from_elevations() {
        let levels = vec![Level::new(0, "EG", 0.0), Level::new(1, "OG", 3.5)];
        let infos = level_infos(&levels, &ExtractConfig::default());
        assert!((infos[0].storey_height_m - 3.5).abs() < 1e-9);
        assert!((infos[1].storey_height_m - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_openings_counted() {
        let mut model = single_level(
            vec![outline("R1", &[(0.0, 0.0), (5.0, 0.0), (5.0, 4.0), (0.0, 4.0)], true)],
            Vec::new(),
        );
        model.levels[0].openings = vec![
            Opening {
                kind: OpeningKind::Window,
                position: Point::new(2.0, 0.0),
                width_m: 1.2,
            },
            Opening {
                kind: OpeningKind::Door,
                position: Point::new(5.0, 2.0),
                width_m: 0.9,
            },
            Opening {
                kind: OpeningKind::Window,
                position: Point::new(20.0, 0.0),
                width_m: 1.2,
            },
        ];
        let building = extract(&model, &ExtractConfig::default()).expect("extract");
        let room = &building.rooms[0];
        assert_eq!((room.doors, room.windows), (1, 1));
        assert!((room.window_area_m2 - 1.8).abs() < 1e-9);
    }
}
