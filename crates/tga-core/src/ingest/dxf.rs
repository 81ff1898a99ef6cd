//! ASCII DXF decoder.
//!
//! A DXF file is a flat sequence of `(group code, value)` line pairs organised
//! in sections. Only `HEADER` (for `$INSUNITS`) and `ENTITIES` are read:
//!
//! | entity                    | layer class | becomes            |
//! |---------------------------|-------------|--------------------|
//! | `LWPOLYLINE`, `POLYLINE`  | room        | [`RoomOutline`]    |
//! | `LINE`                    | wall        | wall [`Segment`]   |
//! | `INSERT`                  | door/window | [`Opening`]        |
//! | `TEXT`, `MTEXT`           | any         | [`Label`]          |
//!
//! Levels are derived by clustering entity elevations.

use tracing::debug;

use crate::config::IngestConfig;
use crate::domain::{
    DrawingFormat, GeometricModel, IngestError, Label, Level, Opening, OpeningKind, Point,
    RoomOutline, Segment,
};
use crate::ingest::{cluster_elevations, nearest_level, DrawingDecoder};

const BINARY_SENTINEL: &[u8] = b"AutoCAD Binary DXF";

/// Cheap content sniff for ASCII (and binary) DXF.
pub(crate) fn looks_like_dxf(bytes: &[u8]) -> bool {
    if bytes.starts_with(BINARY_SENTINEL) {
        return true;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
    let mut lines = head.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some("0"), Some("SECTION")) => true,
        (Some("999"), Some(_)) => head.contains("SECTION"),
        _ => false,
    }
}

pub struct DxfDecoder;

impl DrawingDecoder for DxfDecoder {
    fn format(&self) -> DrawingFormat {
        DrawingFormat::VectorExchange
    }

    fn decode(&self, bytes: &[u8], config: &IngestConfig) -> Result<GeometricModel, IngestError> {
        if bytes.starts_with(BINARY_SENTINEL) {
            return Err(IngestError::unsupported(
                "binary DXF is not supported; save the drawing as ASCII DXF",
            ));
        }
        let text = String::from_utf8_lossy(bytes);
        let pairs = read_pairs(&text)?;
        let sections = split_sections(&pairs)?;

        let scale = sections
            .iter()
            .find(|(name, _)| *name == "HEADER")
            .map(|(_, body)| units_scale(body))
            .transpose()?
            .unwrap_or(1.0);

        let entities = sections
            .iter()
            .find(|(name, _)| *name == "ENTITIES")
            .map(|(_, body)| *body)
            .ok_or_else(|| IngestError::corrupt("drawing has no ENTITIES section"))?;

        let raw = collect_entities(entities, config, scale)?;
        Ok(raw.into_model(config))
    }
}

#[derive(Debug, Clone, Copy)]
struct Pair<'a> {
    code: i32,
    value: &'a str,
    line: usize,
}

fn read_pairs(text: &str) -> Result<Vec<Pair<'_>>, IngestError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut pairs = Vec::with_capacity(lines.len() / 2);
    let mut idx = 0;
    while idx < lines.len() {
        let code_line = lines[idx].trim();
        if code_line.is_empty() && idx + 1 == lines.len() {
            break;
        }
        let code: i32 = code_line.parse().map_err(|_| {
            IngestError::corrupt(format!("line {}: expected group code, found '{code_line}'", idx + 1))
        })?;
        let value = lines
            .get(idx + 1)
            .map(|v| v.trim())
            .ok_or_else(|| IngestError::corrupt(format!("line {}: group code without value", idx + 1)))?;
        pairs.push(Pair {
            code,
            value,
            line: idx + 2,
        });
        idx += 2;
        if code == 0 && value == "EOF" {
            break;
        }
    }
    Ok(pairs)
}

type Section<'p, 'a> = (&'a str, &'p [Pair<'a>]);

fn split_sections<'p, 'a>(pairs: &'p [Pair<'a>]) -> Result<Vec<Section<'p, 'a>>, IngestError> {
    let mut sections = Vec::new();
    let mut idx = 0;
    while idx < pairs.len() {
        let pair = pairs[idx];
        if pair.code == 0 && pair.value == "SECTION" {
            let name = pairs
                .get(idx + 1)
                .filter(|p| p.code == 2)
                .map(|p| p.value)
                .ok_or_else(|| {
                    IngestError::corrupt(format!("line {}: SECTION without name", pair.line))
                })?;
            let start = idx + 2;
            let len = pairs[start.min(pairs.len())..]
                .iter()
                .position(|p| p.code == 0 && p.value == "ENDSEC")
                .ok_or_else(|| IngestError::corrupt(format!("section {name} is not terminated")))?;
            sections.push((name, &pairs[start..start + len]));
            idx = start + len + 1;
        } else {
            idx += 1;
        }
    }
    Ok(sections)
}

/// Metres per drawing unit from `$INSUNITS`.
fn units_scale(header: &[Pair<'_>]) -> Result<f64, IngestError> {
    let Some(pos) = header
        .iter()
        .position(|p| p.code == 9 && p.value == "$INSUNITS")
    else {
        return Ok(1.0);
    };
    let Some(units) = header[pos + 1..].iter().take_while(|p| p.code != 9).find(|p| p.code == 70)
    else {
        return Ok(1.0);
    };
    let scale = match units.value.parse::<i32>() {
        Ok(1) => 0.0254,
        Ok(2) => 0.3048,
        Ok(4) => 0.001,
        Ok(5) => 0.01,
        Ok(0) | Ok(6) => 1.0,
        Ok(other) => {
            return Err(IngestError::unsupported(format!(
                "drawing unit code {other} is not supported"
            )))
        }
        Err(_) => {
            return Err(IngestError::corrupt(format!(
                "line {}: invalid $INSUNITS value '{}'",
                units.line, units.value
            )))
        }
    };
    Ok(scale)
}

fn number(pair: &Pair<'_>) -> Result<f64, IngestError> {
    pair.value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            IngestError::corrupt(format!(
                "line {}: group {} expects a number, found '{}'",
                pair.line, pair.code, pair.value
            ))
        })
}

struct Entity<'p, 'a> {
    kind: &'a str,
    line: usize,
    pairs: &'p [Pair<'a>],
}

impl<'p, 'a> Entity<'p, 'a> {
    fn text(&self, code: i32) -> Option<&'a str> {
        self.pairs.iter().find(|p| p.code == code).map(|p| p.value)
    }

    fn float(&self, code: i32) -> Result<Option<f64>, IngestError> {
        self.pairs
            .iter()
            .find(|p| p.code == code)
            .map(number)
            .transpose()
    }

    fn require(&self, code: i32) -> Result<f64, IngestError> {
        self.float(code)?.ok_or_else(|| {
            IngestError::corrupt(format!(
                "line {}: {} is missing group {code}",
                self.line, self.kind
            ))
        })
    }

    fn layer(&self) -> &'a str {
        self.text(8).unwrap_or("0")
    }

    fn flags(&self) -> i64 {
        self.text(70).and_then(|v| v.parse().ok()).unwrap_or(0)
    }
}

fn split_entities<'p, 'a>(pairs: &'p [Pair<'a>]) -> Vec<Entity<'p, 'a>> {
    let starts: Vec<usize> = pairs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.code == 0)
        .map(|(i, _)| i)
        .collect();
    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(pairs.len());
            Entity {
                kind: pairs[start].value,
                line: pairs[start].line,
                pairs: &pairs[start + 1..end],
            }
        })
        .collect()
}

fn layer_matches(layer: &str, prefixes: &[String]) -> bool {
    let upper = layer.to_ascii_uppercase();
    prefixes
        .iter()
        .any(|p| upper.starts_with(&p.to_ascii_uppercase()))
}

#[derive(Default)]
struct RawDrawing {
    outlines: Vec<(RoomOutline, f64)>,
    loose_outlines: Vec<(RoomOutline, f64)>,
    walls: Vec<(Segment, f64)>,
    openings: Vec<(Opening, f64)>,
    labels: Vec<(Label, f64)>,
}

fn collect_entities(
    pairs: &[Pair<'_>],
    config: &IngestConfig,
    scale: f64,
) -> Result<RawDrawing, IngestError> {
    let entities = split_entities(pairs);
    let mut raw = RawDrawing::default();
    let mut idx = 0;

    while idx < entities.len() {
        let entity = &entities[idx];
        idx += 1;
        match entity.kind {
            "LWPOLYLINE" => {
                let vertices = lwpolyline_vertices(entity)?
                    .into_iter()
                    .map(|p| p.scaled(scale))
                    .collect();
                let z = entity.float(38)?.unwrap_or(0.0) * scale;
                raw.push_outline(entity.layer(), vertices, entity.flags() & 1 == 1, z, config);
            }
            "POLYLINE" => {
                let z = entity.float(30)?.unwrap_or(0.0) * scale;
                let mut vertices = Vec::new();
                while let Some(vertex) = entities.get(idx).filter(|e| e.kind == "VERTEX") {
                    vertices.push(Point::new(vertex.require(10)?, vertex.require(20)?).scaled(scale));
                    idx += 1;
                }
                if entities.get(idx).map(|e| e.kind) != Some("SEQEND") {
                    return Err(IngestError::corrupt(format!(
                        "line {}: POLYLINE is not terminated by SEQEND",
                        entity.line
                    )));
                }
                idx += 1;
                raw.push_outline(entity.layer(), vertices, entity.flags() & 1 == 1, z, config);
            }
            "LINE" => {
                if !layer_matches(entity.layer(), &config.wall_layers) {
                    continue;
                }
                let start = Point::new(entity.require(10)?, entity.require(20)?).scaled(scale);
                let end = Point::new(entity.require(11)?, entity.require(21)?).scaled(scale);
                let z = entity.float(30)?.unwrap_or(0.0) * scale;
                raw.walls.push((Segment::new(start, end), z));
            }
            "INSERT" => {
                let Some(kind) = opening_kind(entity, config) else {
                    continue;
                };
                let position = Point::new(entity.require(10)?, entity.require(20)?).scaled(scale);
                let z = entity.float(30)?.unwrap_or(0.0) * scale;
                let x_scale = entity.float(41)?.map(f64::abs).filter(|s| *s > 0.0).unwrap_or(1.0);
                let base = match kind {
                    OpeningKind::Door => config.default_door_width_m,
                    OpeningKind::Window => config.default_window_width_m,
                };
                raw.openings.push((
                    Opening {
                        kind,
                        position,
                        width_m: base * x_scale,
                    },
                    z,
                ));
            }
            "TEXT" | "MTEXT" => {
                let text = if entity.kind == "MTEXT" {
                    let mut joined: String = entity
                        .pairs
                        .iter()
                        .filter(|p| p.code == 3)
                        .map(|p| p.value)
                        .collect();
                    joined.push_str(entity.text(1).unwrap_or_default());
                    clean_mtext(&joined)
                } else {
                    entity.text(1).unwrap_or_default().to_string()
                };
                let text = text.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let position = Point::new(entity.require(10)?, entity.require(20)?).scaled(scale);
                let z = entity.float(30)?.unwrap_or(0.0) * scale;
                raw.labels.push((Label { text, position }, z));
            }
            _ => {}
        }
    }

    Ok(raw)
}

fn lwpolyline_vertices(entity: &Entity<'_, '_>) -> Result<Vec<Point>, IngestError> {
    let mut vertices = Vec::new();
    let mut pending_x: Option<f64> = None;
    for pair in entity.pairs {
        match pair.code {
            10 => {
                if pending_x.replace(number(pair)?).is_some() {
                    return Err(IngestError::corrupt(format!(
                        "line {}: LWPOLYLINE vertex without y coordinate",
                        pair.line
                    )));
                }
            }
            20 => {
                let x = pending_x.take().ok_or_else(|| {
                    IngestError::corrupt(format!(
                        "line {}: LWPOLYLINE y coordinate without x",
                        pair.line
                    ))
                })?;
                vertices.push(Point::new(x, number(pair)?));
            }
            _ => {}
        }
    }
    if pending_x.is_some() {
        return Err(IngestError::corrupt(format!(
            "line {}: LWPOLYLINE ends with an incomplete vertex",
            entity.line
        )));
    }
    Ok(vertices)
}

fn opening_kind(entity: &Entity<'_, '_>, config: &IngestConfig) -> Option<OpeningKind> {
    let layer = entity.layer();
    if layer_matches(layer, &config.door_layers) {
        return Some(OpeningKind::Door);
    }
    if layer_matches(layer, &config.window_layers) {
        return Some(OpeningKind::Window);
    }
    let block = entity.text(2).unwrap_or_default().to_ascii_uppercase();
    if block.contains("DOOR") || block.contains("TUER") {
        Some(OpeningKind::Door)
    } else if block.contains("WIN") || block.contains("FENSTER") {
        Some(OpeningKind::Window)
    } else {
        None
    }
}

/// Strip inline MTEXT formatting (`\P`, `\fArial;`, braces).
fn clean_mtext(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '\\' => match chars.next() {
                Some('P') | Some('~') => out.push(' '),
                Some('\\') => out.push('\\'),
                Some(code) if "fFHCWQTApLlOoKk".contains(code) => {
                    if matches!(code, 'L' | 'l' | 'O' | 'o' | 'K' | 'k') {
                        continue;
                    }
                    for skipped in chars.by_ref() {
                        if skipped == ';' {
                            break;
                        }
                    }
                }
                _ => {}
            },
            other => out.push(other),
        }
    }
    out
}

impl RawDrawing {
    fn push_outline(
        &mut self,
        layer: &str,
        vertices: Vec<Point>,
        closed: bool,
        z: f64,
        config: &IngestConfig,
    ) {
        let outline = RoomOutline {
            id: String::new(),
            layer: layer.to_string(),
            vertices,
            closed,
        };
        if layer_matches(layer, &config.room_layers) {
            self.outlines.push((outline, z));
        } else if closed
            && !layer_matches(layer, &config.wall_layers)
            && !layer_matches(layer, &config.door_layers)
            && !layer_matches(layer, &config.window_layers)
        {
            self.loose_outlines.push((outline, z));
        }
    }

    fn into_model(mut self, config: &IngestConfig) -> GeometricModel {
        if self.outlines.is_empty() && !self.loose_outlines.is_empty() {
            debug!(
                count = self.loose_outlines.len(),
                "no polylines on room layers, using closed polylines from other layers"
            );
            self.outlines = std::mem::take(&mut self.loose_outlines);
        }

        let elevations: Vec<f64> = if self.outlines.is_empty() {
            self.walls
                .iter()
                .map(|(_, z)| *z)
                .chain(self.labels.iter().map(|(_, z)| *z))
                .collect()
        } else {
            self.outlines.iter().map(|(_, z)| *z).collect()
        };
        let elevations = cluster_elevations(elevations, config.level_tolerance_m);

        let mut levels: Vec<Level> = elevations
            .iter()
            .enumerate()
            .map(|(i, z)| Level::new(i, format!("Level {i}"), *z))
            .collect();

        for (mut outline, z) in self.outlines {
            let level = &mut levels[nearest_level(&elevations, z)];
            outline.id = format!("L{}-R{:02}", level.index, level.outlines.len() + 1);
            level.outlines.push(outline);
        }
        for (wall, z) in self.walls {
            levels[nearest_level(&elevations, z)].walls.push(wall);
        }
        for (opening, z) in self.openings {
            levels[nearest_level(&elevations, z)].openings.push(opening);
        }
        for (label, z) in self.labels {
            levels[nearest_level(&elevations, z)].labels.push(label);
        }

        GeometricModel {
            source_format: DrawingFormat::VectorExchange,
            levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DxfBuilder;

    fn decode(text: &str) -> Result<GeometricModel, IngestError> {
        DxfDecoder.decode(text.as_bytes(), &IngestConfig::default())
    }

    #[test]
    fn test_decodes_rooms_walls_openings_labels() {
        let dxf = DxfBuilder::new(6)
            .room("A-AREA", &[(0.0, 0.0), (5.0, 0.0), (5.0, 4.0), (0.0, 4.0)], 0.0)
            .wall((0.0, 0.0), (5.0, 0.0), 0.0)
            .door((2.5, 4.0), 0.0)
            .window((2.5, 0.0), 0.0)
            .text("OFFICE 1", (2.5, 2.0), 0.0)
            .build();
        let model = decode(&dxf).expect("decode");
        assert_eq!(model.levels.len(), 1);
        let level = &model.levels[0];
        assert_eq!(level.outlines.len(), 1);
        assert_eq!(level.outlines[0].id, "L0-R01");
        assert!(level.outlines[0].closed);
        assert_eq!(level.walls.len(), 1);
        assert_eq!(level.openings.len(), 2);
        assert_eq!(level.labels[0].text, "OFFICE 1");
    }

    #[test]
    fn test_millimetre_units_are_scaled() {
        let dxf = DxfBuilder::new(4)
            .room("ROOM", &[(0.0, 0.0), (4000.0, 0.0), (4000.0, 3000.0), (0.0, 3000.0)], 3500.0)
            .build();
        let model = decode(&dxf).expect("decode");
        let outline = &model.levels[0].outlines[0];
        assert!((outline.vertices[1].x - 4.0).abs() < 1e-9);
        assert!((model.levels[0].elevation_m - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_levels_from_elevations() {
        let square = [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)];
        let dxf = DxfBuilder::new(6)
            .room("A-AREA", &square, 3.5)
            .room("A-AREA", &square, 0.0)
            .room("A-AREA", &square, 3.52)
            .text("WC", (2.0, 2.0), 3.5)
            .build();
        let model = decode(&dxf).expect("decode");
        assert_eq!(model.levels.len(), 2);
        assert_eq!(model.levels[0].outlines.len(), 1);
        assert_eq!(model.levels[1].outlines.len(), 2);
        assert_eq!(model.levels[1].labels.len(), 1);
        assert_eq!(model.levels[1].outlines[1].id, "L1-R02");
    }

    #[test]
    fn test_truncated_pair_is_corrupt() {
        let err = decode("  0\nSECTION\n  2\nENTITIES\n  0\n").unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument { .. }));
    }

    #[test]
    fn test_bad_group_code_is_corrupt() {
        let err = decode("  0\nSECTION\n  x\nENTITIES\n").unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument { .. }));
    }

    #[test]
    fn test_bad_coordinate_is_corrupt() {
        let text = "0\nSECTION\n2\nENTITIES\n0\nLINE\n8\nA-WALL\n10\nabc\n20\n0\n11\n1\n21\n0\n0\nENDSEC\n0\nEOF\n";
        let err = decode(text).unwrap_err();
        match err {
            IngestError::CorruptDocument { detail } => assert!(detail.contains("abc")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_entities_section() {
        let err = decode("0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n").unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument { .. }));
    }

    #[test]
    fn test_unterminated_section() {
        let err = decode("0\nSECTION\n2\nENTITIES\n0\nLINE\n8\nA-WALL\n").unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument { .. }));
    }

    #[test]
    fn test_binary_dxf_unsupported() {
        let err = DxfDecoder
            .decode(b"AutoCAD Binary DXF\r\n\x1a\x00", &IngestConfig::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_old_style_polyline() {
        let text = "0\nSECTION\n2\nENTITIES\n\
            0\nPOLYLINE\n8\nROOM\n66\n1\n10\n0\n20\n0\n30\n0\n70\n1\n\
            0\nVERTEX\n8\nROOM\n10\n0\n20\n0\n\
            0\nVERTEX\n8\nROOM\n10\n3\n20\n0\n\
            0\nVERTEX\n8\nROOM\n10\n3\n20\n3\n\
            0\nSEQEND\n8\nROOM\n\
            0\nENDSEC\n0\nEOF\n";
        let model = decode(text).expect("decode");
        assert_eq!(model.levels[0].outlines[0].vertices.len(), 3);
    }

    #[test]
    fn test_clean_mtext() {
        assert_eq!(clean_mtext(r"{\fArial|b1;MEETING}\PROOM"), "MEETING ROOM");
        assert_eq!(clean_mtext(r"\LWC\l"), "WC");
    }
}
