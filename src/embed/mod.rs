//! Format dispatch for embedding, extraction and tamper stamping
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! Embedding is two-phase. `prepare` loads the document, removes every
//! placeholder occurrence and fingerprints the remaining text; the caller
//! signs a payload carrying that fingerprint, renders the QR and hands both
//! back to `embed`. Extraction walks the channels in the order returned by
//! [`metadata_channels`], the same order the embedders write them.

pub mod office;
pub mod pdf;
pub mod sidecar;

use std::path::{Path, PathBuf};

use crate::config::SigningConfig;
use crate::error::{Error, Result};
use crate::qr::QrImage;
use crate::types::{DocumentFormat, MetadataChannel, QrPlacement, SignatureBundle};

use self::office::{DocxHandler, PptxHandler};
use self::pdf::PdfHandler;
use self::sidecar::SidecarHandler;

/// Marker prepended to fallback paragraphs and text boxes holding the bundle
pub const METADATA_TAG: &str = "[SIGNATURE-METADATA]";

/// Suffix inserted before the extension of tamper-evidence copies
pub const MODIFIED_SUFFIX: &str = "_MODIFIED";

/// A loaded document with its placeholders removed, waiting for a bundle
pub struct PreparedDocument {
    pub format: DocumentFormat,
    pub source: PathBuf,
    /// `sha256:<hex>` of the visible content after redaction
    pub content_digest: String,
    /// Number of placeholder occurrences removed
    pub redactions: usize,
    pub(crate) state: PreparedState,
}

pub(crate) enum PreparedState {
    Pdf(Box<pdf::PdfState>),
    Package(Box<office::PackageState>),
    Bytes(Vec<u8>),
}

impl PreparedDocument {
    pub fn placeholder_found(&self) -> bool {
        self.redactions > 0
    }
}

/// Result of a successful embed
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub output_path: PathBuf,
    pub format: DocumentFormat,
    /// Channels that accepted the bundle, in write order
    pub channels: Vec<MetadataChannel>,
    /// Where the QR went; `None` for sidecar output
    pub placement: Option<QrPlacement>,
    pub redactions: usize,
}

/// Bundle text found in a document and the channel it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedBundle {
    pub channel: MetadataChannel,
    pub json: String,
    /// Custom validation legend stored next to the bundle, when present
    pub validation_text: Option<String>,
}

/// One document format's embedding capability
pub trait FormatHandler: Sync {
    fn format(&self) -> DocumentFormat;

    /// Loads `input`, removes every `placeholder` occurrence and fingerprints the rest
    fn prepare(&self, input: &Path, placeholder: &str) -> Result<PreparedDocument>;

    /// Places the QR and writes the bundle into every channel the format supports
    fn embed(
        &self,
        prepared: PreparedDocument,
        qr: &QrImage,
        bundle: &SignatureBundle,
        config: &SigningConfig,
        output: &Path,
    ) -> Result<EmbeddedDocument>;

    /// Reads the bundle back, trying channels in write order
    fn extract(&self, path: &Path) -> Result<Option<ExtractedBundle>>;

    /// Recomputes the content fingerprint of a finished document
    fn fingerprint(&self, path: &Path, placeholder: &str) -> Result<String>;

    /// Writes a copy of `input` carrying an overt tamper stamp
    fn stamp_modified(&self, input: &Path, output: &Path) -> Result<()>;
}

static PDF: PdfHandler = PdfHandler;
static DOCX: DocxHandler = DocxHandler;
static PPTX: PptxHandler = PptxHandler;
static SIDECAR: SidecarHandler = SidecarHandler;

/// Selects the handler for a format, once, at the boundary
pub fn handler_for(format: &DocumentFormat) -> &'static dyn FormatHandler {
    match format {
        DocumentFormat::Pdf => &PDF,
        DocumentFormat::Docx => &DOCX,
        DocumentFormat::Pptx => &PPTX,
        DocumentFormat::Other(_) => &SIDECAR,
    }
}

pub fn handler_for_path(path: &Path) -> &'static dyn FormatHandler {
    handler_for(&DocumentFormat::from_path(path))
}

/// Channels written by the embedder for `format`, in write order
pub fn metadata_channels(format: &DocumentFormat) -> &'static [MetadataChannel] {
    match format {
        DocumentFormat::Pdf => &[MetadataChannel::PdfInfoSignature, MetadataChannel::PdfInfoCustomKey],
        DocumentFormat::Docx | DocumentFormat::Pptx => {
            &[MetadataChannel::CoreProperties, MetadataChannel::TaggedParagraph]
        }
        DocumentFormat::Other(_) => &[MetadataChannel::Sidecar],
    }
}

/// `<dir>/<stem>_MODIFIED.<ext>` next to `path`
pub fn modified_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, MODIFIED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, MODIFIED_SUFFIX),
    };
    path.with_file_name(name)
}

/// Formats a fallback paragraph holding the bundle
pub fn tagged_metadata(bundle_json: &str) -> String {
    format!("{} {}", METADATA_TAG, bundle_json)
}

/// Parses a fallback paragraph; `None` when the text is not tagged
pub fn parse_tagged_metadata(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix(METADATA_TAG)
        .map(str::trim)
        .filter(|json| !json.is_empty())
}

pub(crate) fn wrong_state(format: &DocumentFormat) -> Error {
    Error::malformed(format!("prepared document was not loaded as {}", format))
}
