//! Configuration types and validation for the signing session
//! Author: kartik4091
//! Created: 2025-06-03

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PLACEHOLDER: &str = "{{QR}}";
pub const DEFAULT_ISSUER: &str = "Signed by the certificate issuing office";
pub const DEFAULT_VALIDATION_LEGEND: &str = "Validated by the certificate issuing office";

/// Where the key pair lives and how large a generated key is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub bits: usize,
}

/// Which PDF pages receive the watermark and QR overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPages {
    /// Every page; pages without the placeholder get the QR in the default corner
    All,
    /// Only the page holding the placeholder (page 1 when none is found)
    PlaceholderPage,
}

/// Diagonal low-opacity watermark drawn behind the QR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub enabled: bool,
    pub text: String,
    pub secondary_text: Option<String>,
    pub font_size: f32,
    pub opacity: f32,
}

/// QR symbol geometry per output format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Pixels per module in the rendered image
    pub box_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
    /// Edge length on PDF pages, in points
    pub pdf_size: f32,
    /// Edge length of the inline DOCX picture, in EMU
    pub docx_size_emu: i64,
    /// Edge length of the PPTX picture, in EMU
    pub pptx_size_emu: i64,
}

/// Standard document-info fields written next to the signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Signing session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub keys: KeyConfig,
    pub issuer: String,
    pub validation_legend: String,
    pub info_text: String,
    pub placeholder: String,
    pub overlay_pages: OverlayPages,
    pub watermark: WatermarkConfig,
    pub qr: QrConfig,
    pub document_info: DocumentInfo,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key: PathBuf::from("keys").join("private_key.pem"),
            public_key: PathBuf::from("keys").join("public_key.pem"),
            bits: 2048,
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "VALID - CERTIFIED DOCUMENT".into(),
            secondary_text: Some("AUTHENTICATED CERTIFICATE".into()),
            font_size: 36.0,
            opacity: 0.08,
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            box_size: 3,
            border: 1,
            pdf_size: 60.0,
            docx_size_emu: 731_520,
            pptx_size_emu: 914_400,
        }
    }
}

impl Default for DocumentInfo {
    fn default() -> Self {
        Self {
            title: Some("Certificate".into()),
            author: None,
            subject: Some("Certificate of Participation".into()),
            creator: Some("certseal".into()),
            producer: Some(format!("certseal {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            keys: KeyConfig::default(),
            issuer: DEFAULT_ISSUER.into(),
            validation_legend: DEFAULT_VALIDATION_LEGEND.into(),
            info_text: "Certificate verifiable through its QR code".into(),
            placeholder: DEFAULT_PLACEHOLDER.into(),
            overlay_pages: OverlayPages::All,
            watermark: WatermarkConfig::default(),
            qr: QrConfig::default(),
            document_info: DocumentInfo::default(),
        }
    }
}

impl SigningConfig {
    /// Loads a configuration file, trying JSON first and YAML second
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SigningConfig = serde_json::from_str(&content)
            .or_else(|_| serde_yaml::from_str(&content))
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.placeholder.trim().is_empty() {
            return Err(Error::Config("Placeholder marker must not be empty".into()));
        }
        if self.keys.bits < 1024 {
            return Err(Error::Config(format!("Key size {} is below 1024 bits", self.keys.bits)));
        }
        if !(self.watermark.opacity > 0.0 && self.watermark.opacity <= 1.0) {
            return Err(Error::Config("Watermark opacity must be in (0, 1]".into()));
        }
        if self.qr.box_size == 0 || self.qr.pdf_size <= 0.0 {
            return Err(Error::Config("QR size must be positive".into()));
        }
        if self.qr.docx_size_emu <= 0 || self.qr.pptx_size_emu <= 0 {
            return Err(Error::Config("QR picture size must be positive".into()));
        }
        Ok(())
    }
}
