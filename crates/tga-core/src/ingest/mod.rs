//! Drawing ingestion: raw upload bytes → normalized [`GeometricModel`].
//!
//! The ingestor re-validates what the upload surface already checked (size,
//! extension), sniffs the real format from the content and dispatches to a
//! [`DrawingDecoder`]. It is a pure function of its input: any byte sequence
//! yields either a model or a typed [`IngestError`].

pub mod dwg;
pub mod dxf;
pub mod pdf;

use tracing::{debug, instrument};

use crate::config::IngestConfig;
use crate::domain::{DrawingDocument, DrawingFormat, GeometricModel, IngestError};

/// Decoder for one drawing format.
pub trait DrawingDecoder: Send + Sync {
    fn format(&self) -> DrawingFormat;

    /// Decode `bytes` (already sniffed as this format) into metres-based geometry.
    fn decode(&self, bytes: &[u8], config: &IngestConfig) -> Result<GeometricModel, IngestError>;
}

/// Identify the drawing format from its leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<DrawingFormat> {
    if dwg::is_dwg(bytes) {
        return Some(DrawingFormat::CadVector);
    }
    // The PDF header may be preceded by up to 1024 bytes of junk.
    let head = &bytes[..bytes.len().min(1024)];
    if find_subslice(head, b"%PDF-").is_some() {
        return Some(DrawingFormat::Pdf);
    }
    if dxf::looks_like_dxf(bytes) {
        return Some(DrawingFormat::VectorExchange);
    }
    None
}

/// Ingest an uploaded document.
#[instrument(skip(document, config), fields(file = %document.declared_filename(), size = document.len()))]
pub fn ingest(
    document: &DrawingDocument,
    config: &IngestConfig,
) -> Result<GeometricModel, IngestError> {
    if document.len() > config.max_upload_bytes {
        return Err(IngestError::SizeExceeded {
            size: document.len(),
            max: config.max_upload_bytes,
        });
    }
    if document.is_empty() {
        return Err(IngestError::corrupt("document is empty"));
    }

    let detected = detect_format(document.bytes()).ok_or_else(|| {
        IngestError::unsupported(format!(
            "content of '{}' is not a recognised DWG, DXF or PDF drawing",
            document.declared_filename()
        ))
    })?;
    if detected != document.declared_format() {
        return Err(IngestError::unsupported(format!(
            "declared as {} but content is {}",
            document.declared_format(),
            detected
        )));
    }

    let model = decoder_for(detected).decode(document.bytes(), config)?;
    debug!(
        format = %detected,
        levels = model.levels.len(),
        outlines = model.outline_count(),
        "drawing decoded"
    );
    Ok(model)
}

fn decoder_for(format: DrawingFormat) -> Box<dyn DrawingDecoder> {
    match format {
        DrawingFormat::CadVector => Box::new(dwg::DwgDecoder),
        DrawingFormat::VectorExchange => Box::new(dxf::DxfDecoder),
        DrawingFormat::Pdf => Box::new(pdf::PdfDecoder),
    }
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Assign each elevation to a level, clustering values within `tolerance`.
///
/// Returns the sorted representative elevations.
pub(crate) fn cluster_elevations(mut elevations: Vec<f64>, tolerance: f64) -> Vec<f64> {
    elevations.retain(|e| e.is_finite());
    elevations.sort_by(|a, b| a.total_cmp(b));
    let mut levels: Vec<f64> = Vec::new();
    for e in elevations {
        match levels.last() {
            Some(last) if (e - last).abs() <= tolerance => {}
            _ => levels.push(e),
        }
    }
    if levels.is_empty() {
        levels.push(0.0);
    }
    levels
}

/// Index of the level elevation closest to `z`.
pub(crate) fn nearest_level(levels: &[f64], z: f64) -> usize {
    levels
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - z).abs().total_cmp(&(*b - z).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8], name: &str) -> DrawingDocument {
        DrawingDocument::from_upload(bytes.to_vec(), name).expect("upload")
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(detect_format(b"AC1032\0\0\0"), Some(DrawingFormat::CadVector));
        assert_eq!(detect_format(b"%PDF-1.7\n"), Some(DrawingFormat::Pdf));
        assert_eq!(
            detect_format(b"  0\nSECTION\n  2\nENTITIES\n  0\nENDSEC\n  0\nEOF\n"),
            Some(DrawingFormat::VectorExchange)
        );
        assert_eq!(detect_format(b"\x89PNG\r\n"), None);
    }

    #[test]
    fn test_size_exceeded() {
        let config = IngestConfig {
            max_upload_bytes: 4,
            ..IngestConfig::default()
        };
        let err = ingest(&doc(b"%PDF-1.7", "a.pdf"), &config).unwrap_err();
        assert_eq!(err, IngestError::SizeExceeded { size: 8, max: 4 });
    }

    #[test]
    fn test_declared_format_mismatch() {
        let err = ingest(&doc(b"%PDF-1.7\n%%EOF", "plan.dxf"), &IngestConfig::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_unknown_content() {
        let err = ingest(&doc(b"hello world", "plan.pdf"), &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_empty_document() {
        let err = ingest(&doc(b"", "plan.dxf"), &IngestConfig::default()).unwrap_err();
        assert!(matches!(err, IngestError::CorruptDocument { .. }));
    }

    #[test]
    fn test_cluster_elevations() {
        let levels = cluster_elevations(vec![3.5, 0.0, 0.05, 7.0, 3.45], 0.1);
        assert_eq!(levels, vec![0.0, 3.45, 7.0]);
        assert_eq!(nearest_level(&levels, 3.6), 1);
        assert_eq!(cluster_elevations(Vec::new(), 0.1), vec![0.0]);
    }
}
