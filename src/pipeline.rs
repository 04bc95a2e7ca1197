//! Issuing pipeline: prepare, sign, render, embed
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! One `Issuer` owns a signing session. Keys are provisioned once in
//! [`Issuer::new`]; every document then runs the same four stages.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::SigningConfig;
use crate::crypto::{BundleSigner, KeyManager};
use crate::embed::{handler_for_path, EmbeddedDocument, FormatHandler, PreparedDocument};
use crate::error::Result;
use crate::qr::{make_qr_with, QrImage};
use crate::types::{CertificatePayload, CertificateRecord, SignatureBundle};
use crate::utils::ensure_parent_dir;

/// Output of a successful signing run
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub embedded: EmbeddedDocument,
    pub bundle: SignatureBundle,
}

/// Signing session holding the configuration and the loaded private key
#[derive(Debug)]
pub struct Issuer {
    config: SigningConfig,
    signer: BundleSigner,
}

impl Issuer {
    /// Validates the configuration and makes sure the key pair exists.
    /// A provisioning failure here is fatal for the whole session.
    #[instrument(skip(config))]
    pub fn new(config: SigningConfig) -> Result<Self> {
        config.validate()?;
        let keys = KeyManager::new(config.keys.clone());
        keys.ensure()?;
        let signer = BundleSigner::new(keys.private_key()?, keys.key_id());
        debug!("Signing with key {}", signer.key_id());
        Ok(Self { config, signer })
    }

    /// Replaces the validation legend for documents signed from now on
    pub fn with_legend(mut self, legend: impl Into<String>) -> Self {
        self.config.validation_legend = legend.into();
        self
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Signs `input` and writes the sealed document to `output`
    #[instrument(skip(self, record), fields(input = %input.display()))]
    pub fn sign_and_embed(&self, input: &Path, output: &Path, record: CertificateRecord) -> Result<SignedDocument> {
        info!("🚦 Sealing {}", input.display());
        let handler = handler_for_path(input);

        let prepared = self.stage_1_prepare(handler, input)?;
        let bundle = self.stage_2_sign(record, &prepared)?;
        let qr = self.stage_3_render(&bundle)?;
        let embedded = self.stage_4_embed(handler, prepared, &qr, &bundle, output)?;

        info!(
            "✅ {} sealed via {}",
            embedded.output_path.display(),
            embedded
                .channels
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(SignedDocument { embedded, bundle })
    }

    /// Converts any serializable record and signs it into `input`
    pub fn sign_record<T: Serialize>(&self, input: &Path, output: &Path, record: &T) -> Result<SignedDocument> {
        let record = CertificatePayload::record_from(record)?;
        self.sign_and_embed(input, output, record)
    }

    fn stage_1_prepare(&self, handler: &dyn FormatHandler, input: &Path) -> Result<PreparedDocument> {
        info!("🔍 Stage 1: Placeholder removal ({})", handler.format());
        let prepared = handler.prepare(input, &self.config.placeholder)?;
        debug!(
            "Removed {} placeholder(s); content {}",
            prepared.redactions, prepared.content_digest
        );
        Ok(prepared)
    }

    fn stage_2_sign(&self, record: CertificateRecord, prepared: &PreparedDocument) -> Result<SignatureBundle> {
        info!("🔏 Stage 2: Signing payload");
        let payload = CertificatePayload::build(record, &self.config.issuer, Some(prepared.content_digest.clone()));
        self.signer.sign_payload(payload)
    }

    fn stage_3_render(&self, bundle: &SignatureBundle) -> Result<QrImage> {
        info!("🔳 Stage 3: QR rendering");
        make_qr_with(&bundle.to_json(), &self.config.qr)
    }

    fn stage_4_embed(
        &self,
        handler: &dyn FormatHandler,
        prepared: PreparedDocument,
        qr: &QrImage,
        bundle: &SignatureBundle,
        output: &Path,
    ) -> Result<EmbeddedDocument> {
        info!("📦 Stage 4: Embedding");
        ensure_parent_dir(output)?;
        handler.embed(prepared, qr, bundle, &self.config, output)
    }
}
