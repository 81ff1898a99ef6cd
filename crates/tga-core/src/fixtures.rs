//! Sample drawings and projects for tests, demos and the CLI `sample` command.
//!
//! Provides `DxfBuilder` and `PdfBuilder` for assembling small but valid
//! drawings, plus a three-storey sample office in both formats.

use std::fmt::{Display, Write as _};
use std::io::{self, Write as _};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, Stream};

use crate::domain::{BuildingCategory, Discipline, Project, Region};

// ---------------------------------------------------------------------------
// DxfBuilder
// ---------------------------------------------------------------------------

/// Builder for ASCII DXF text with a HEADER and an ENTITIES section.
#[derive(Debug, Clone)]
pub struct DxfBuilder {
    insunits: i32,
    entities: String,
}

impl DxfBuilder {
    /// `insunits` is the `$INSUNITS` code (4 = mm, 6 = m).
    pub fn new(insunits: i32) -> Self {
        Self {
            insunits,
            entities: String::new(),
        }
    }

    fn pair(&mut self, code: i32, value: impl Display) {
        let _ = write!(self.entities, "{code:>3}\n{value}\n");
    }

    fn polyline(mut self, layer: &str, points: &[(f64, f64)], elevation: f64, closed: bool) -> Self {
        self.pair(0, "LWPOLYLINE");
        self.pair(8, layer);
        self.pair(90, points.len());
        self.pair(70, if closed { 1 } else { 0 });
        self.pair(38, elevation);
        for (x, y) in points {
            self.pair(10, x);
            self.pair(20, y);
        }
        self
    }

    /// Closed room boundary.
    pub fn room(self, layer: &str, points: &[(f64, f64)], elevation: f64) -> Self {
        self.polyline(layer, points, elevation, true)
    }

    /// Room boundary drawn without the closed flag.
    pub fn open_room(self, layer: &str, points: &[(f64, f64)], elevation: f64) -> Self {
        self.polyline(layer, points, elevation, false)
    }

    pub fn wall(mut self, from: (f64, f64), to: (f64, f64), elevation: f64) -> Self {
        self.pair(0, "LINE");
        self.pair(8, "A-WALL");
        self.pair(10, from.0);
        self.pair(20, from.1);
        self.pair(30, elevation);
        self.pair(11, to.0);
        self.pair(21, to.1);
        self.pair(31, elevation);
        self
    }

    fn insert(mut self, layer: &str, block: &str, at: (f64, f64), elevation: f64) -> Self {
        self.pair(0, "INSERT");
        self.pair(8, layer);
        self.pair(2, block);
        self.pair(10, at.0);
        self.pair(20, at.1);
        self.pair(30, elevation);
        self
    }

    pub fn door(self, at: (f64, f64), elevation: f64) -> Self {
        self.insert("A-DOOR", "DOOR-900", at, elevation)
    }

    pub fn window(self, at: (f64, f64), elevation: f64) -> Self {
        self.insert("A-GLAZ", "WIN-1200", at, elevation)
    }

    pub fn text(mut self, text: &str, at: (f64, f64), elevation: f64) -> Self {
        self.pair(0, "TEXT");
        self.pair(8, "A-ANNO");
        self.pair(10, at.0);
        self.pair(20, at.1);
        self.pair(30, elevation);
        self.pair(40, 0.25);
        self.pair(1, text);
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "  0\nSECTION\n  2\nHEADER\n  9\n$ACADVER\n  1\nAC1015\n  9\n$INSUNITS\n 70\n{}\n  0\nENDSEC\n",
            self.insunits
        );
        out.push_str("  0\nSECTION\n  2\nENTITIES\n");
        out.push_str(&self.entities);
        out.push_str("  0\nENDSEC\n  0\nEOF\n");
        out
    }
}

// ---------------------------------------------------------------------------
// PdfBuilder
// ---------------------------------------------------------------------------

/// Builder for a minimal multi-page PDF with one content stream per page.
///
/// The media box sits on the page tree root, so decoders have to follow
/// inheritance to find it.
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    media_box: [f64; 4],
    pages: Vec<String>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    /// A4 portrait pages.
    pub fn new() -> Self {
        Self {
            media_box: [0.0, 0.0, 595.0, 842.0],
            pages: Vec::new(),
        }
    }

    pub fn media_box(mut self, media_box: [f64; 4]) -> Self {
        self.media_box = media_box;
        self
    }

    pub fn page(mut self, content: &str) -> Self {
        self.pages.push(content.to_string());
        self
    }

    /// Uncompressed content streams.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        let streams = self
            .pages
            .iter()
            .map(|p| Stream::new(dictionary! {}, p.as_bytes().to_vec()))
            .collect();
        self.assemble(streams)
    }

    /// FlateDecode-compressed content streams.
    pub fn build_compressed(&self) -> io::Result<Vec<u8>> {
        let mut streams = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(page.as_bytes())?;
            let mut stream = Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                encoder.finish()?,
            );
            stream.allows_compression = false;
            streams.push(stream);
        }
        self.assemble(streams)
    }

    fn assemble(&self, streams: Vec<Stream>) -> io::Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(streams.len());
        for stream in streams {
            let content_id = doc.add_object(stream);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        let media_box: Vec<Object> = self.media_box.iter().map(|v| Object::Real(*v as _)).collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => media_box,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Sample office
// ---------------------------------------------------------------------------

struct SampleRoom {
    label: &'static str,
    numbered: bool,
    rect: [f64; 4],
    windows: &'static [f64],
}

/// One storey: 30 m × 12 m, a 2 m corridor between a south and a north row.
const SAMPLE_FLOOR: &[SampleRoom] = &[
    SampleRoom { label: "STAIR", numbered: false, rect: [0.0, 0.0, 4.0, 5.0], windows: &[2.0] },
    SampleRoom { label: "OFFICE", numbered: true, rect: [4.0, 0.0, 10.0, 5.0], windows: &[5.5, 8.5] },
    SampleRoom { label: "OFFICE", numbered: true, rect: [10.0, 0.0, 16.0, 5.0], windows: &[11.5, 14.5] },
    SampleRoom { label: "MEETING", numbered: true, rect: [16.0, 0.0, 24.0, 5.0], windows: &[18.0, 20.0, 22.0] },
    SampleRoom { label: "WC", numbered: true, rect: [24.0, 0.0, 27.0, 5.0], windows: &[] },
    SampleRoom { label: "KITCHEN", numbered: true, rect: [27.0, 0.0, 30.0, 5.0], windows: &[28.5] },
    SampleRoom { label: "CORRIDOR", numbered: false, rect: [0.0, 5.0, 30.0, 7.0], windows: &[] },
    SampleRoom { label: "OFFICE", numbered: true, rect: [0.0, 7.0, 8.0, 12.0], windows: &[2.0, 6.0] },
    SampleRoom { label: "OFFICE", numbered: true, rect: [8.0, 7.0, 16.0, 12.0], windows: &[10.0, 14.0] },
    SampleRoom { label: "OPEN OFFICE", numbered: true, rect: [16.0, 7.0, 26.0, 12.0], windows: &[18.0, 20.5, 23.0, 25.0] },
    SampleRoom { label: "STORAGE", numbered: false, rect: [26.0, 7.0, 28.0, 12.0], windows: &[] },
    SampleRoom { label: "TECHNICAL", numbered: false, rect: [28.0, 7.0, 30.0, 12.0], windows: &[] },
];

pub const SAMPLE_STOREYS: usize = 3;
pub const SAMPLE_STOREY_HEIGHT_M: f64 = 3.5;

fn sample_label(room: &SampleRoom, level: usize, seq: usize) -> String {
    if room.numbered {
        format!("{} {}.{:02}", room.label, level, seq + 1)
    } else {
        room.label.to_string()
    }
}

/// Three-storey office (1080 m² net) as ASCII DXF in metres.
pub fn sample_office_dxf() -> String {
    let mut builder = DxfBuilder::new(6);
    for level in 0..SAMPLE_STOREYS {
        let z = level as f64 * SAMPLE_STOREY_HEIGHT_M;
        for outline in [
            ((0.0, 0.0), (30.0, 0.0)),
            ((30.0, 0.0), (30.0, 12.0)),
            ((30.0, 12.0), (0.0, 12.0)),
            ((0.0, 12.0), (0.0, 0.0)),
        ] {
            builder = builder.wall(outline.0, outline.1, z);
        }
        for (seq, room) in SAMPLE_FLOOR.iter().enumerate() {
            let [x0, y0, x1, y1] = room.rect;
            builder = builder
                .room("A-AREA", &[(x0, y0), (x1, y0), (x1, y1), (x0, y1)], z)
                .text(&sample_label(room, level, seq), ((x0 + x1) / 2.0, (y0 + y1) / 2.0), z);
            if room.label == "CORRIDOR" {
                continue;
            }
            let south = y0 < 5.0;
            let (door_y, window_y) = if south { (y1, y0) } else { (y0, y1) };
            builder = builder.door(((x0 + x1) / 2.0, door_y), z);
            for x in room.windows {
                builder = builder.window((*x, window_y), z);
            }
        }
    }
    builder.build()
}

/// Ground floor of the sample office as a vector PDF at 1:100 on A3.
pub fn sample_office_pdf() -> io::Result<Vec<u8>> {
    const POINTS_PER_METRE: f64 = 1.0 / 0.035_278;
    const MARGIN: f64 = 50.0;
    let pt = |m: f64| MARGIN + m * POINTS_PER_METRE;

    let mut content = String::from("q 0.5 w\n20 20 1151 802 re S\n");
    for (seq, room) in SAMPLE_FLOOR.iter().enumerate() {
        let [x0, y0, x1, y1] = room.rect;
        let _ = writeln!(
            content,
            "{:.2} {:.2} {:.2} {:.2} re S",
            pt(x0),
            pt(y0),
            (x1 - x0) * POINTS_PER_METRE,
            (y1 - y0) * POINTS_PER_METRE
        );
        let _ = writeln!(
            content,
            "BT /F1 8 Tf {:.2} {:.2} Td ({}) Tj ET",
            pt((x0 + x1) / 2.0),
            pt((y0 + y1) / 2.0),
            sample_label(room, 0, seq)
        );
    }
    content.push_str("Q\n");
    PdfBuilder::new()
        .media_box([0.0, 0.0, 1191.0, 842.0])
        .page(&content)
        .build()
}

/// Office project in Germany matching the sample drawing.
pub fn sample_office_project(disciplines: impl IntoIterator<Item = Discipline>) -> Project {
    Project::new(
        "Sample Office",
        BuildingCategory::Office,
        1000.0,
        SAMPLE_STOREYS as u32,
        Region::Germany,
        disciplines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dxf_builder_layout() {
        let dxf = DxfBuilder::new(6).wall((0.0, 0.0), (1.0, 0.0), 0.0).build();
        assert!(dxf.starts_with("  0\nSECTION\n  2\nHEADER\n"));
        assert!(dxf.contains("$INSUNITS\n 70\n6\n"));
        assert!(dxf.ends_with("  0\nEOF\n"));
    }

    #[test]
    fn test_pdf_builder_page_tree() {
        let pdf = PdfBuilder::new()
            .page("0 0 10 10 re S")
            .page("0 0 20 20 re S")
            .build()
            .expect("build");
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).expect("reload");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        let first = pages[&1];
        let content = doc.get_page_content(first).expect("content");
        assert_eq!(content, b"0 0 10 10 re S");
    }

    #[test]
    fn test_pdf_builder_compresses_contents() {
        let pdf = PdfBuilder::new()
            .page("0 0 10 10 re S")
            .build_compressed()
            .expect("build");
        let doc = Document::load_mem(&pdf).expect("reload");
        let page = doc.get_pages()[&1];
        let content_id = doc.get_page_contents(page)[0];
        let stream = doc
            .get_object(content_id)
            .and_then(Object::as_stream)
            .expect("stream");
        assert_eq!(stream.dict.get(b"Filter").and_then(Object::as_name).ok(), Some(&b"FlateDecode"[..]));
    }

    #[test]
    fn test_sample_labels() {
        assert_eq!(sample_label(&SAMPLE_FLOOR[1], 2, 1), "OFFICE 2.02");
        assert_eq!(sample_label(&SAMPLE_FLOOR[0], 2, 0), "STAIR");
    }
}
