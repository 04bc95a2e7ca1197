//! RSA-PSS signing and fail-closed verification
//! Author: kartik4091

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::crypto::canonical::canonicalize_payload;
use crate::error::{Error, Result};
use crate::types::{CertificatePayload, SignatureBundle};

/// PSS salt length: the maximum the modulus allows, as MGF1-SHA256 signers
/// configured with "max length" produce.
fn max_salt_len(modulus_bytes: usize) -> usize {
    modulus_bytes.saturating_sub(<Sha256 as Digest>::output_size() + 2)
}

/// Signs `data` with RSA-PSS/SHA-256 and returns the signature as base64.
///
/// The salt is random, so two signatures over the same bytes differ; both verify.
pub fn sign(private_key: &RsaPrivateKey, data: &[u8]) -> Result<String> {
    let salt_len = max_salt_len(private_key.size());
    let signing_key = SigningKey::<Sha256>::new_with_salt_len(private_key.clone(), salt_len);
    let signature = signing_key
        .try_sign_with_rng(&mut OsRng, data)
        .map_err(|e| Error::Signing(e.to_string()))?;
    trace!("Produced {}-byte PSS signature", signature.to_bytes().len());
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Checks a base64 signature over `data`. Every failure, including malformed
/// base64 or a signature from another key, is reported as `false`.
pub fn verify(public_key: &RsaPublicKey, data: &[u8], signature_b64: &str) -> bool {
    let Ok(raw) = BASE64.decode(signature_b64.trim()) else {
        debug!("Signature is not valid base64");
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        debug!("Signature bytes rejected");
        return false;
    };
    let salt_len = max_salt_len(public_key.size());
    let verifying_key = VerifyingKey::<Sha256>::new_with_salt_len(public_key.clone(), salt_len);
    verifying_key.verify(data, &signature).is_ok()
}

/// Produces signature bundles for payloads
#[derive(Debug, Clone)]
pub struct BundleSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl BundleSigner {
    pub fn new(private_key: RsaPrivateKey, key_id: impl Into<String>) -> Self {
        Self {
            private_key,
            key_id: key_id.into(),
        }
    }

    pub fn sign_payload(&self, payload: CertificatePayload) -> Result<SignatureBundle> {
        let bytes = canonicalize_payload(&payload);
        let signature = sign(&self.private_key, &bytes)?;
        Ok(SignatureBundle {
            payload,
            signature,
            pubkey_id: self.key_id.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Re-verifies bundles against a single trusted public key
#[derive(Debug, Clone)]
pub struct BundleVerifier {
    public_key: RsaPublicKey,
}

impl BundleVerifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }

    pub fn verify_bundle(&self, bundle: &SignatureBundle) -> bool {
        verify(&self.public_key, &canonicalize_payload(&bundle.payload), &bundle.signature)
    }
}
