//! Vector PDF decoder.
//!
//! `lopdf` reads the object graph and the page tree; each page's content
//! streams are inflated under the configured budget and tokenised into
//! operations. Every page becomes one level: closed subpaths become room
//! outlines, stroked open segments become walls and shown text becomes
//! labels. Coordinates are converted from PDF points to metres with
//! `pdf_metres_per_point`.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};

use flate2::read::ZlibDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::config::IngestConfig;
use crate::domain::{
    signed_area, DrawingFormat, GeometricModel, IngestError, Label, Level, Point, RoomOutline,
    Segment,
};
use crate::ingest::{find_subslice, DrawingDecoder};

/// Letter-size page, used when no `/MediaBox` is found on the page or its parents.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Closed paths covering this share of the page are drawing frames, not rooms.
const FRAME_COVERAGE: f64 = 0.9;

const MAX_TREE_DEPTH: usize = 32;

pub struct PdfDecoder;

impl DrawingDecoder for PdfDecoder {
    fn format(&self) -> DrawingFormat {
        DrawingFormat::Pdf
    }

    fn decode(&self, bytes: &[u8], config: &IngestConfig) -> Result<GeometricModel, IngestError> {
        let doc = load_document(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(encrypted());
        }
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(IngestError::corrupt("PDF contains no pages"));
        }

        let mut budget = InflateBudget::new(config.max_inflated_bytes);
        let mut levels = Vec::with_capacity(pages.len());
        for (index, page_id) in pages.values().enumerate() {
            let content = page_content(&doc, *page_id, &mut budget)?;
            let operations = Content::decode(&content)
                .map_err(|e| {
                    IngestError::corrupt(format!("page {}: unreadable content stream: {e}", index + 1))
                })?
                .operations;
            let media_box = media_box(&doc, *page_id).unwrap_or(DEFAULT_MEDIA_BOX);
            let drawn = interpret(&operations);
            levels.push(drawn.into_level(index, media_box, config.pdf_metres_per_point));
        }

        let outlines: usize = levels.iter().map(|l| l.outlines.len()).sum();
        if outlines == 0 && has_images(&doc) {
            return Err(IngestError::unsupported(
                "raster PDF plans carry no vector geometry; upload a vector export",
            ));
        }
        debug!(pages = levels.len(), outlines, inflated = budget.used, "pdf pages interpreted");

        Ok(GeometricModel {
            source_format: DrawingFormat::Pdf,
            levels,
        })
    }
}

fn encrypted() -> IngestError {
    IngestError::unsupported("encrypted PDF documents are not supported")
}

/// Parse the object graph. Parser panics on hostile input surface as
/// `CorruptDocument`.
fn load_document(bytes: &[u8]) -> Result<Document, IngestError> {
    let loaded = panic::catch_unwind(AssertUnwindSafe(|| Document::load_mem(bytes)));
    match loaded {
        Ok(Ok(doc)) => Ok(doc),
        // A document lopdf cannot read may still announce encryption.
        Ok(Err(_)) | Err(_) if find_subslice(bytes, b"/Encrypt").is_some() => Err(encrypted()),
        Ok(Err(e)) => Err(IngestError::corrupt(format!("failed to parse PDF: {e}"))),
        Err(_) => Err(IngestError::corrupt("PDF parser rejected malformed object data")),
    }
}

/// Running total of decoded content bytes for one document.
struct InflateBudget {
    used: usize,
    max: usize,
}

impl InflateBudget {
    fn new(max: usize) -> Self {
        Self { used: 0, max }
    }

    fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used)
    }

    fn charge(&mut self, bytes: usize) -> Result<(), IngestError> {
        let used = self.used.saturating_add(bytes);
        if used > self.max {
            return Err(IngestError::SizeExceeded {
                size: used,
                max: self.max,
            });
        }
        self.used = used;
        Ok(())
    }

    /// Inflate a zlib stream, reading at most one byte past the remaining budget.
    fn inflate(&mut self, data: &[u8]) -> Result<Vec<u8>, IngestError> {
        let cap = u64::try_from(self.remaining())
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .take(cap)
            .read_to_end(&mut out)
            .map_err(|e| IngestError::corrupt(format!("inflate failed: {e}")))?;
        self.charge(out.len())?;
        Ok(out)
    }
}

/// Concatenated, decoded content streams of one page.
fn page_content(
    doc: &Document,
    page_id: ObjectId,
    budget: &mut InflateBudget,
) -> Result<Vec<u8>, IngestError> {
    let mut content = Vec::new();
    for id in doc.get_page_contents(page_id) {
        let stream = doc
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|e| IngestError::corrupt(format!("content object {} {}: {e}", id.0, id.1)))?;
        let data = match filter_names(&stream.dict).as_slice() {
            [] => {
                budget.charge(stream.content.len())?;
                stream.content.clone()
            }
            [f] if f == b"FlateDecode" || f == b"Fl" => budget.inflate(&stream.content)?,
            other => {
                let names: Vec<String> = other
                    .iter()
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .collect();
                return Err(IngestError::unsupported(format!(
                    "content object {} uses unsupported stream filter {}",
                    id.0,
                    names.join(", ")
                )));
            }
        };
        content.extend(data);
        content.push(b'\n');
    }
    Ok(content)
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// `/MediaBox` of the page, inherited from the nearest ancestor that has one.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f64; 4]> {
    let mut dict = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(b"MediaBox") {
            let items = resolve(doc, value).as_array().ok()?;
            let numbers: Vec<f64> = items.iter().filter_map(|o| number(resolve(doc, o))).collect();
            return <[f64; 4]>::try_from(numbers).ok();
        }
        let parent = dict.get(b"Parent").ok()?;
        dict = resolve(doc, parent).as_dict().ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn has_images(doc: &Document) -> bool {
    doc.objects.values().any(|obj| match obj {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(name)) if name == b"Image"
        ),
        _ => false,
    })
}

fn number(obj: &Object) -> Option<f64> {
    let value = match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => f64::from(*r),
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Affine transform `[a b c d e f]` as in PDF.
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f64, y: f64) -> Point {
    Point::new(m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

#[derive(Debug, Default)]
struct SubPath {
    points: Vec<Point>,
    closed: bool,
}

/// Geometry drawn on one page, in PDF user-space points.
#[derive(Debug, Default)]
struct PageDrawing {
    closed: Vec<Vec<Point>>,
    strokes: Vec<Segment>,
    labels: Vec<Label>,
}

struct Interpreter {
    ctm: Matrix,
    saved: Vec<Matrix>,
    path: Vec<SubPath>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    run: Option<(Point, String)>,
    drawing: PageDrawing,
}

fn interpret(operations: &[Operation]) -> PageDrawing {
    let mut interp = Interpreter {
        ctm: IDENTITY,
        saved: Vec::new(),
        path: Vec::new(),
        text_matrix: IDENTITY,
        line_matrix: IDENTITY,
        leading: 0.0,
        run: None,
        drawing: PageDrawing::default(),
    };
    for op in operations {
        interp.execute(&op.operator, &op.operands);
    }
    interp.flush_text();
    interp.drawing
}

/// The last `N` operands as numbers, if they all are.
fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    let tail = operands.get(operands.len().checked_sub(N)?..)?;
    let mut out = [0.0; N];
    for (slot, op) in out.iter_mut().zip(tail) {
        *slot = number(op)?;
    }
    Some(out)
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xfe_u8, 0xff]) {
        let units: Vec<u16> = utf16
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

impl Interpreter {
    fn execute(&mut self, op: &str, operands: &[Object]) {
        match op {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "m" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    let p = apply(&self.ctm, x, y);
                    self.path.push(SubPath {
                        points: vec![p],
                        closed: false,
                    });
                }
            }
            "l" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    self.line_to(x, y);
                }
            }
            "c" => {
                if let Some([_, _, _, _, x, y]) = numbers::<6>(operands) {
                    self.line_to(x, y);
                }
            }
            "v" | "y" => {
                if let Some([_, _, x, y]) = numbers::<4>(operands) {
                    self.line_to(x, y);
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = numbers::<4>(operands) {
                    let points = vec![
                        apply(&self.ctm, x, y),
                        apply(&self.ctm, x + w, y),
                        apply(&self.ctm, x + w, y + h),
                        apply(&self.ctm, x, y + h),
                    ];
                    self.path.push(SubPath {
                        points,
                        closed: true,
                    });
                }
            }
            "h" => self.close_subpath(),
            "s" | "b" | "b*" => {
                self.close_subpath();
                self.paint(true);
            }
            "S" | "B" | "B*" => self.paint(true),
            "f" | "F" | "f*" => self.paint(false),
            "n" => self.path.clear(),
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.flush_text(),
            "TL" => {
                if let Some([tl]) = numbers::<1>(operands) {
                    self.leading = tl;
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    self.flush_text();
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "Td" | "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    if op == "TD" {
                        self.leading = -ty;
                    }
                    self.next_line(tx, ty);
                }
            }
            "T*" => self.next_line(0.0, -self.leading),
            "Tj" | "'" | "\"" => {
                if op != "Tj" {
                    self.next_line(0.0, -self.leading);
                }
                if let Some(Object::String(bytes, _)) = operands.last() {
                    self.show(&decode_text(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.last() {
                    let mut text = String::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_text(bytes)),
                            other if number(other).is_some_and(|adjust| adjust < -200.0) => {
                                text.push(' ')
                            }
                            _ => {}
                        }
                    }
                    self.show(&text);
                }
            }
            _ => {}
        }
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let p = apply(&self.ctm, x, y);
        match self.path.last_mut() {
            Some(sub) if !sub.closed => sub.points.push(p),
            _ => self.path.push(SubPath {
                points: vec![p],
                closed: false,
            }),
        }
    }

    fn close_subpath(&mut self) {
        if let Some(sub) = self.path.last_mut() {
            sub.closed = true;
        }
    }

    fn paint(&mut self, stroked: bool) {
        for mut sub in self.path.drain(..) {
            let loops = match (sub.points.first(), sub.points.last()) {
                (Some(first), Some(last)) => sub.points.len() > 3 && first.distance(last) < 1e-6,
                _ => false,
            };
            if loops {
                sub.points.pop();
                sub.closed = true;
            }
            if sub.closed && sub.points.len() >= 3 {
                self.drawing.closed.push(sub.points);
            } else if stroked {
                self.drawing.strokes.extend(
                    sub.points
                        .windows(2)
                        .map(|w| Segment::new(w[0], w[1]))
                        .filter(|s| s.length() > 0.0),
                );
            }
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.flush_text();
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show(&mut self, text: &str) {
        let origin = apply(&self.ctm, self.text_matrix[4], self.text_matrix[5]);
        if let Some((_, run)) = self.run.as_mut() {
            run.push_str(text);
        } else {
            self.run = Some((origin, text.to_string()));
        }
    }

    fn flush_text(&mut self) {
        if let Some((position, text)) = self.run.take() {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                self.drawing.labels.push(Label { text, position });
            }
        }
    }
}

impl PageDrawing {
    fn into_level(self, index: usize, media_box: [f64; 4], metres_per_point: f64) -> Level {
        let page_area = ((media_box[2] - media_box[0]) * (media_box[3] - media_box[1])).abs();
        let mut level = Level::new(index, format!("Page {}", index + 1), 0.0);
        for vertices in self.closed {
            let area = signed_area(&vertices).abs();
            if area <= 0.0 || (page_area > 0.0 && area >= FRAME_COVERAGE * page_area) {
                continue;
            }
            level.outlines.push(RoomOutline {
                id: format!("L{}-R{:02}", index, level.outlines.len() + 1),
                layer: format!("page-{}", index + 1),
                vertices: vertices.iter().map(|p| p.scaled(metres_per_point)).collect(),
                closed: true,
            });
        }
        level.walls = self
            .strokes
            .iter()
            .map(|s| Segment::new(s.start.scaled(metres_per_point), s.end.scaled(metres_per_point)))
            .collect();
        level.labels = self
            .labels
            .into_iter()
            .map(|l| Label {
                text: l.text,
                position: l.position.scaled(metres_per_point),
            })
            .collect();
        level
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
