//! Cryptographic core: key provisioning, canonical payload bytes, RSA-PSS signatures
//! Author: kartik4091
//! Created: 2025-06-03

pub mod canonical;
pub mod key_management;
pub mod signer;

pub use canonical::{canonical_json, canonicalize, canonicalize_payload};
pub use key_management::{ensure_keys, load_private_key, load_public_key, KeyManager, KeyPaths};
pub use signer::{sign, verify, BundleSigner, BundleVerifier};
