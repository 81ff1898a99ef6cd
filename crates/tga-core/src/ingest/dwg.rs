//! Native CAD (DWG) recognition.
//!
//! DWG is a closed binary format without a public specification. Files are
//! recognised by their `AC10xx` version magic and rejected with a conversion
//! hint so the caller can re-export the plan as DXF.

use crate::config::IngestConfig;
use crate::domain::{DrawingFormat, GeometricModel, IngestError};
use crate::ingest::DrawingDecoder;

/// Known release codes, oldest to newest.
const RELEASES: &[(&str, &str)] = &[
    ("AC1012", "R13"),
    ("AC1014", "R14"),
    ("AC1015", "2000"),
    ("AC1018", "2004"),
    ("AC1021", "2007"),
    ("AC1024", "2010"),
    ("AC1027", "2013"),
    ("AC1032", "2018"),
];

pub(crate) fn is_dwg(bytes: &[u8]) -> bool {
    bytes.len() >= 6 && bytes.starts_with(b"AC10") && bytes[4..6].iter().all(u8::is_ascii_digit)
}

fn release_name(bytes: &[u8]) -> &'static str {
    let magic = bytes.get(..6).unwrap_or_default();
    RELEASES
        .iter()
        .find(|(code, _)| code.as_bytes() == magic)
        .map(|(_, name)| *name)
        .unwrap_or("unknown release")
}

pub struct DwgDecoder;

impl DrawingDecoder for DwgDecoder {
    fn format(&self) -> DrawingFormat {
        DrawingFormat::CadVector
    }

    fn decode(&self, bytes: &[u8], _config: &IngestConfig) -> Result<GeometricModel, IngestError> {
        if !is_dwg(bytes) {
            return Err(IngestError::corrupt("missing DWG version header"));
        }
        Err(IngestError::unsupported(format!(
            "DWG {} drawings must be exported to DXF before upload",
            release_name(bytes)
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dwg_names_release() {
        let err = DwgDecoder
            .decode(b"AC1032\x00\x00\x00\x00", &IngestConfig::default())
            .unwrap_err();
        match err {
            IngestError::UnsupportedFormat { detail } => {
                assert!(detail.contains("2018"));
                assert!(detail.contains("DXF"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_dwg() {
        assert!(is_dwg(b"AC1015rest"));
        assert!(!is_dwg(b"AC10"));
        assert!(!is_dwg(b"ACXX15"));
    }
}
