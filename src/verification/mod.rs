//! Verification of signed documents
//! Created: 2025-06-07
//! Author: kartik4091

mod integrity_checker;

pub use self::integrity_checker::IntegrityChecker;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::types::{MetadataChannel, SignatureBundle};

/// Terminal verification states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    NoSignature,
    SignatureFoundValid,
    SignatureFoundInvalid,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationStatus::NoSignature => "NO_SIGNATURE",
            VerificationStatus::SignatureFoundValid => "SIGNATURE_FOUND_VALID",
            VerificationStatus::SignatureFoundInvalid => "SIGNATURE_FOUND_INVALID",
        };
        write!(f, "{}", name)
    }
}

/// Why the checker ended in its state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IntegrityReason {
    /// No channel held a bundle
    NoSignatureData,
    /// The document or its metadata could not be read
    ExtractionFailed(String),
    /// A bundle was found but could not be parsed
    DamagedBundle(String),
    /// Signature and content both check out
    Unmodified,
    /// The signature does not match the payload under the trusted key
    SignatureMismatch,
    /// The signature holds but the visible content changed after signing
    ContentModified,
    /// The content fingerprint could not be recomputed
    ContentUnverifiable(String),
}

impl fmt::Display for IntegrityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityReason::NoSignatureData => write!(f, "no signature data"),
            IntegrityReason::ExtractionFailed(e) => write!(f, "could not read signature data: {}", e),
            IntegrityReason::DamagedBundle(e) => write!(f, "signature damaged or incomplete: {}", e),
            IntegrityReason::Unmodified => write!(f, "signature valid and document unmodified"),
            IntegrityReason::SignatureMismatch => write!(f, "signature does not match the certificate data"),
            IntegrityReason::ContentModified => write!(f, "document content changed after signing"),
            IntegrityReason::ContentUnverifiable(e) => write!(f, "document content could not be verified: {}", e),
        }
    }
}

/// Outcome of one integrity check. Always produced, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub path: PathBuf,
    pub status: VerificationStatus,
    pub reason: IntegrityReason,
    /// Channel the bundle was read from
    pub channel: Option<MetadataChannel>,
    pub bundle: Option<SignatureBundle>,
    /// Custom validation legend stored with the bundle
    pub validation_text: Option<String>,
    /// Tamper-evidence copy written for invalid documents
    pub tamper_copy: Option<PathBuf>,
}

impl IntegrityReport {
    pub(crate) fn no_signature(path: PathBuf, reason: IntegrityReason) -> Self {
        Self {
            path,
            status: VerificationStatus::NoSignature,
            reason,
            channel: None,
            bundle: None,
            validation_text: None,
            tamper_copy: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerificationStatus::SignatureFoundValid
    }

    /// One-line human-readable summary
    pub fn message(&self) -> String {
        match &self.tamper_copy {
            Some(copy) => format!("{}: {} (marked copy: {})", self.status, self.reason, copy.display()),
            None => format!("{}: {}", self.status, self.reason),
        }
    }
}
