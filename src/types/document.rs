use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Document formats with a dedicated embedder; anything else travels with a sidecar file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Other(String),
}

impl DocumentFormat {
    /// Selects the format from the file extension, case-insensitively
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "pptx" => DocumentFormat::Pptx,
            _ => DocumentFormat::Other(ext),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "PDF"),
            DocumentFormat::Docx => write!(f, "DOCX"),
            DocumentFormat::Pptx => write!(f, "PPTX"),
            DocumentFormat::Other(ext) if ext.is_empty() => write!(f, "unknown"),
            DocumentFormat::Other(ext) => write!(f, ".{}", ext),
        }
    }
}

/// Storage channel holding the signature bundle inside (or next to) a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataChannel {
    /// `/Signature` entry of the PDF document-info dictionary
    PdfInfoSignature,
    /// Base64 copy under the custom `/CertSeal_Signature` info key
    PdfInfoCustomKey,
    /// `dc:description` ("comments") of the Office core properties part
    CoreProperties,
    /// `[SIGNATURE-METADATA] <json>` paragraph or text box in the body
    TaggedParagraph,
    /// `<output>.signature.json` next to the document
    Sidecar,
}

impl fmt::Display for MetadataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataChannel::PdfInfoSignature => "PDF /Signature info entry",
            MetadataChannel::PdfInfoCustomKey => "PDF custom info entry",
            MetadataChannel::CoreProperties => "core properties comments",
            MetadataChannel::TaggedParagraph => "tagged body paragraph",
            MetadataChannel::Sidecar => "sidecar file",
        };
        write!(f, "{}", name)
    }
}

/// Where the QR landed in the output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPlacement {
    /// Zero-based page or slide index
    pub page: usize,
    /// Left edge, in the format's native unit (points for PDF, EMU for Office)
    pub x: f64,
    /// Bottom edge for PDF (bottom-up space), top edge for Office
    pub y: f64,
    pub size: f64,
    /// False when the placeholder was missing and the default position was used
    pub at_placeholder: bool,
}
