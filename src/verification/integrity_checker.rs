//! Integrity checker: extract, re-verify, stamp on failure
//! Author: kartik4091

use std::fs;
use std::path::{Path, PathBuf};

use rsa::RsaPublicKey;
use tracing::{error, info, instrument, warn};

use super::{IntegrityReason, IntegrityReport, VerificationStatus};
use crate::config::SigningConfig;
use crate::crypto::{load_public_key, BundleVerifier};
use crate::embed::{handler_for_path, modified_sibling, FormatHandler};
use crate::error::Result;
use crate::types::SignatureBundle;

/// Verifies documents against a single trusted public key.
///
/// Every failure folds into the report. An invalid document always yields a
/// `_MODIFIED` sibling; the input file is never written to.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    verifier: BundleVerifier,
    placeholder: String,
}

impl IntegrityChecker {
    pub fn new(public_key: RsaPublicKey, placeholder: impl Into<String>) -> Self {
        Self {
            verifier: BundleVerifier::new(public_key),
            placeholder: placeholder.into(),
        }
    }

    /// Loads the trusted public key named by the configuration
    pub fn from_config(config: &SigningConfig) -> Result<Self> {
        let public_key = load_public_key(&config.keys.public_key)?;
        Ok(Self::new(public_key, config.placeholder.clone()))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn check(&self, path: &Path) -> IntegrityReport {
        let handler = handler_for_path(path);

        let extracted = match handler.extract(path) {
            Ok(Some(extracted)) => extracted,
            Ok(None) => {
                info!("No signature data found");
                return IntegrityReport::no_signature(path.to_path_buf(), IntegrityReason::NoSignatureData);
            }
            Err(e) => {
                warn!("Signature extraction failed: {}", e);
                return IntegrityReport::no_signature(
                    path.to_path_buf(),
                    IntegrityReason::ExtractionFailed(e.to_string()),
                );
            }
        };

        let bundle = match SignatureBundle::from_json(&extracted.json) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Signature bundle unreadable: {}", e);
                let mut report =
                    IntegrityReport::no_signature(path.to_path_buf(), IntegrityReason::DamagedBundle(e.to_string()));
                report.channel = Some(extracted.channel);
                return report;
            }
        };

        let reason = if !self.verifier.verify_bundle(&bundle) {
            IntegrityReason::SignatureMismatch
        } else {
            match bundle.payload.content_digest() {
                None => IntegrityReason::Unmodified,
                Some(expected) => match handler.fingerprint(path, &self.placeholder) {
                    Ok(actual) if actual == expected => IntegrityReason::Unmodified,
                    Ok(_) => IntegrityReason::ContentModified,
                    Err(e) => IntegrityReason::ContentUnverifiable(e.to_string()),
                },
            }
        };

        let (status, tamper_copy) = if reason == IntegrityReason::Unmodified {
            info!("✅ Signature valid via {}", extracted.channel);
            (VerificationStatus::SignatureFoundValid, None)
        } else {
            warn!("❌ {}", reason);
            (VerificationStatus::SignatureFoundInvalid, write_tamper_copy(handler, path))
        };

        IntegrityReport {
            path: path.to_path_buf(),
            status,
            reason,
            channel: Some(extracted.channel),
            bundle: Some(bundle),
            validation_text: extracted.validation_text,
            tamper_copy,
        }
    }
}

/// Stamped copy next to `path`; a plain copy when stamping fails
fn write_tamper_copy(handler: &dyn FormatHandler, path: &Path) -> Option<PathBuf> {
    let copy = modified_sibling(path);
    match handler.stamp_modified(path, &copy) {
        Ok(()) => {
            info!("🚩 Tamper-evidence copy written to {}", copy.display());
            Some(copy)
        }
        Err(e) => {
            error!("Could not stamp {}: {}; writing an unmarked copy", copy.display(), e);
            match fs::copy(path, &copy) {
                Ok(_) => Some(copy),
                Err(e) => {
                    error!("Could not write {}: {}", copy.display(), e);
                    None
                }
            }
        }
    }
}
