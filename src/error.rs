//! Error types and handling for the certificate signing library
//! Author: kartik4091

use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

/// Custom result type for signing, embedding and verification operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Key provisioning error: {0}")]
    Key(#[from] KeyError),

    #[error("Canonicalization error: {0}")]
    Canonicalization(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("QR encoding error: {0}")]
    Qr(#[from] QrError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Worker error: {0}")]
    Worker(String),
}

// -------------------- Sub-Error Categories --------------------

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Key encoding failed: {0}")]
    Encoding(String),

    #[error("Key file {path} could not be decoded: {reason}")]
    Decoding { path: PathBuf, reason: String },

    #[error("Key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum QrError {
    #[error("Payload of {0} bytes does not fit in a QR symbol")]
    DataTooLong(usize),

    #[error("QR encoding failed: {0}")]
    Encoding(String),
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EmbedError {
    #[error("Document has no pages")]
    NoPages,

    #[error("Encrypted PDF documents are not supported")]
    Encrypted,

    #[error("Package part missing: {0}")]
    MissingPart(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("No metadata channel accepted the signature bundle: {0}")]
    MetadataWrite(String),
}

impl Error {
    /// Shorthand for malformed-document embedding errors
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::Embed(EmbedError::Malformed(reason.into()))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(quick_xml::Error::from(err))
    }
}
