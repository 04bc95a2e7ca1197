//! Sidecar channel for formats without an embedder
//! Author: kartik4091

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::{wrong_state, EmbeddedDocument, ExtractedBundle, FormatHandler, PreparedDocument, PreparedState};
use crate::config::SigningConfig;
use crate::error::Result;
use crate::fingerprint::bytes_fingerprint;
use crate::qr::QrImage;
use crate::types::{DocumentFormat, MetadataChannel, SignatureBundle};

pub const SIDECAR_SUFFIX: &str = ".signature.json";

/// `<path>.signature.json`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Copies the document unchanged and writes the bundle next to it.
/// No QR is placed; the content fingerprint covers the raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct SidecarHandler;

impl FormatHandler for SidecarHandler {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Other(String::new())
    }

    fn prepare(&self, input: &Path, _placeholder: &str) -> Result<PreparedDocument> {
        let bytes = fs::read(input)?;
        Ok(PreparedDocument {
            format: DocumentFormat::from_path(input),
            source: input.to_path_buf(),
            content_digest: bytes_fingerprint(&bytes),
            redactions: 0,
            state: PreparedState::Bytes(bytes),
        })
    }

    #[instrument(skip_all, fields(output = %output.display()))]
    fn embed(
        &self,
        prepared: PreparedDocument,
        _qr: &QrImage,
        bundle: &SignatureBundle,
        _config: &SigningConfig,
        output: &Path,
    ) -> Result<EmbeddedDocument> {
        let format = prepared.format.clone();
        let PreparedState::Bytes(bytes) = prepared.state else {
            return Err(wrong_state(&format));
        };
        if prepared.source != output {
            fs::write(output, &bytes)?;
        }
        let sidecar = sidecar_path(output);
        fs::write(&sidecar, bundle.to_json().as_bytes())?;
        info!("🗂️ Signature written to sidecar {}", sidecar.display());

        Ok(EmbeddedDocument {
            output_path: output.to_path_buf(),
            format,
            channels: vec![MetadataChannel::Sidecar],
            placement: None,
            redactions: 0,
        })
    }

    fn extract(&self, path: &Path) -> Result<Option<ExtractedBundle>> {
        let sidecar = sidecar_path(path);
        if !sidecar.exists() {
            return Ok(None);
        }
        Ok(Some(ExtractedBundle {
            channel: MetadataChannel::Sidecar,
            json: fs::read_to_string(&sidecar)?,
            validation_text: None,
        }))
    }

    fn fingerprint(&self, path: &Path, _placeholder: &str) -> Result<String> {
        Ok(bytes_fingerprint(&fs::read(path)?))
    }

    /// Opaque formats cannot carry a visible stamp; the copy's name is the evidence
    fn stamp_modified(&self, input: &Path, output: &Path) -> Result<()> {
        fs::copy(input, output)?;
        Ok(())
    }
}
