//! Main Library File for certificate sealing
//! Signs certificate records, embeds the signature as a QR code and document
//! metadata, and detects tampering in PDF, DOCX and PPTX documents.

// Configuration and errors
pub mod config;
pub mod error;
pub mod types;

// Signing core
pub mod crypto;
pub mod fingerprint;
pub mod qr;

// Format embedders
pub mod embed;

// Issuing and verification
pub mod pipeline;
pub mod verification;

// Batch generation and template tooling
pub mod batch;
pub mod folio;
pub mod template;

// Shared Utilities
pub mod utils;

// Re-exports for crate consumers
pub use batch::{BatchEvent, BatchJob, BatchSummary, BatchWorker, CancellationToken, PassthroughFiller, TemplateFiller};
pub use config::{OverlayPages, SigningConfig};
pub use crypto::{BundleSigner, BundleVerifier, KeyManager};
pub use embed::{handler_for, handler_for_path, EmbeddedDocument, FormatHandler};
pub use error::{Error, Result};
pub use folio::FolioManager;
pub use pipeline::{Issuer, SignedDocument};
pub use template::{inspect_template, TemplateReport};
pub use types::{CertificatePayload, CertificateRecord, DocumentFormat, MetadataChannel, SignatureBundle};
pub use verification::{IntegrityChecker, IntegrityReason, IntegrityReport, VerificationStatus};
