//! Uploaded drawings and the normalized geometric model produced from them.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::IngestError;

/// Drawing formats accepted by the ingestor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DrawingFormat {
    /// Native CAD vector drawing (DWG).
    CadVector,
    /// Drawing exchange format (DXF).
    VectorExchange,
    /// Vector or raster PDF plan.
    Pdf,
}

impl DrawingFormat {
    /// Map a file extension (without dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dwg" => Some(DrawingFormat::CadVector),
            "dxf" => Some(DrawingFormat::VectorExchange),
            "pdf" => Some(DrawingFormat::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DrawingFormat::CadVector => "dwg",
            DrawingFormat::VectorExchange => "dxf",
            DrawingFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DrawingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw uploaded drawing. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct DrawingDocument {
    bytes: Arc<[u8]>,
    declared_filename: String,
    declared_format: DrawingFormat,
}

impl DrawingDocument {
    /// Wrap an upload, deriving the declared format from the filename extension.
    pub fn from_upload(
        bytes: impl Into<Arc<[u8]>>,
        declared_filename: impl Into<String>,
    ) -> Result<Self, IngestError> {
        let declared_filename = declared_filename.into();
        let ext = Path::new(&declared_filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let declared_format = DrawingFormat::from_extension(ext).ok_or_else(|| {
            IngestError::unsupported(format!(
                "extension of '{declared_filename}' is not one of dwg, dxf, pdf"
            ))
        })?;
        Ok(Self {
            bytes: bytes.into(),
            declared_filename,
            declared_format,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn declared_filename(&self) -> &str {
        &self.declared_filename
    }

    pub fn declared_format(&self) -> DrawingFormat {
        self.declared_format
    }
}

/// 2D point in metres (plan coordinates).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn scaled(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

/// Straight segment between two points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    /// Shortest distance from `p` to this segment.
    pub fn distance_to(&self, p: &Point) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.start.distance(p);
        }
        let t = (((p.x - self.start.x) * dx + (p.y - self.start.y) * dy) / len_sq).clamp(0.0, 1.0);
        Point::new(self.start.x + t * dx, self.start.y + t * dy).distance(p)
    }
}

/// Shoelace area of a polygon; positive for counter-clockwise winding.
pub fn signed_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Edges of a closed polygon, including the closing edge.
pub fn polygon_edges(vertices: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    let n = vertices.len();
    let count = if n >= 2 { n } else { 0 };
    (0..count).map(move |i| Segment::new(vertices[i], vertices[(i + 1) % n]))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OpeningKind {
    Door,
    Window,
}

/// Door or window insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opening {
    pub kind: OpeningKind,
    pub position: Point,
    pub width_m: f64,
}

/// Free text placed in the drawing, typically a room name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub text: String,
    pub position: Point,
}

/// Boundary polyline of a room as drawn, possibly not yet closed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomOutline {
    pub id: String,
    pub layer: String,
    pub vertices: Vec<Point>,
    /// Whether the source flagged the polyline as closed.
    pub closed: bool,
}

/// One storey of the drawing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Level {
    pub index: usize,
    pub name: String,
    pub elevation_m: f64,
    pub outlines: Vec<RoomOutline>,
    pub walls: Vec<Segment>,
    pub openings: Vec<Opening>,
    pub labels: Vec<Label>,
}

impl Level {
    pub fn new(index: usize, name: impl Into<String>, elevation_m: f64) -> Self {
        Self {
            index,
            name: name.into(),
            elevation_m,
            outlines: Vec::new(),
            walls: Vec::new(),
            openings: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Normalized geometry: levels → room outlines → openings, in metres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeometricModel {
    pub source_format: DrawingFormat,
    pub levels: Vec<Level>,
}

impl GeometricModel {
    pub fn outline_count(&self) -> usize {
        self.levels.iter().map(|l| l.outlines.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_upload_detects_extension() {
        let doc = DrawingDocument::from_upload(b"0\nEOF\n".to_vec(), "Plan.DXF").expect("dxf");
        assert_eq!(doc.declared_format(), DrawingFormat::VectorExchange);
        assert_eq!(doc.len(), 6);
    }

    #[test]
    fn test_from_upload_rejects_unknown_extension() {
        let err = DrawingDocument::from_upload(b"x".to_vec(), "plan.ifc").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_signed_area_winding() {
        let ccw = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        ];
        assert!((signed_area(&ccw) - 12.0).abs() < 1e-9);
        let cw: Vec<Point> = ccw.iter().rev().copied().collect();
        assert!((signed_area(&cw) + 12.0).abs() < 1e-9);
        assert_eq!(polygon_edges(&ccw).count(), 4);
        assert_eq!(signed_area(&ccw[..2]), 0.0);
    }

    #[test]
    fn test_segment_distance() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!((seg.distance_to(&Point::new(5.0, 2.0)) - 2.0).abs() < 1e-9);
        assert!((seg.distance_to(&Point::new(-3.0, 4.0)) - 5.0).abs() < 1e-9);
    }
}
