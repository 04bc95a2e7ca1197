//! Key Management Implementation
//! Author: kartik4091
//! Created: 2025-06-03 09:10:14 UTC
//!
//! The issuing key pair is created once and reused forever after. Existing
//! files are never regenerated or inspected beyond their presence: rotating
//! the key would invalidate every certificate issued so far.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, info, instrument};

use crate::config::KeyConfig;
use crate::error::{KeyError, Result};

/// Locations of a provisioned key pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

/// Makes sure a key pair exists at the given paths, generating one if either file is missing.
///
/// Any I/O failure is returned to the caller; signing must not proceed without keys.
#[instrument]
pub fn ensure_keys(private_path: &Path, public_path: &Path, bits: usize) -> Result<KeyPaths> {
    let paths = KeyPaths {
        private_key: private_path.to_path_buf(),
        public_key: public_path.to_path_buf(),
    };

    if private_path.exists() && public_path.exists() {
        debug!("Reusing existing key pair");
        return Ok(paths);
    }

    info!("🔑 Generating {}-bit RSA key pair", bits);
    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| KeyError::Generation(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Encoding(e.to_string()))?;

    create_parent(private_path)?;
    create_parent(public_path)?;
    write_private(private_path, private_pem.as_bytes())?;
    fs::write(public_path, public_pem.as_bytes()).map_err(|source| KeyError::Io {
        path: public_path.to_path_buf(),
        source,
    })?;

    info!("Key pair written to {} and {}", private_path.display(), public_path.display());
    Ok(paths)
}

/// Loads a PKCS#8 PEM private key
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey> {
    let pem = read_key_file(path)?;
    RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
        KeyError::Decoding {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Loads a SubjectPublicKeyInfo PEM public key
pub fn load_public_key(path: &Path) -> Result<RsaPublicKey> {
    let pem = read_key_file(path)?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(|e| {
        KeyError::Decoding {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Identifier recorded in every bundle: the public key's file name
pub fn key_identifier(public_path: &Path) -> String {
    public_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| public_path.display().to_string())
}

/// Owns the key configuration of a signing session
#[derive(Debug, Clone)]
pub struct KeyManager {
    config: KeyConfig,
}

impl KeyManager {
    pub fn new(config: KeyConfig) -> Self {
        Self { config }
    }

    pub fn ensure(&self) -> Result<KeyPaths> {
        ensure_keys(&self.config.private_key, &self.config.public_key, self.config.bits)
    }

    pub fn private_key(&self) -> Result<RsaPrivateKey> {
        load_private_key(&self.config.private_key)
    }

    pub fn public_key(&self) -> Result<RsaPublicKey> {
        load_public_key(&self.config.public_key)
    }

    pub fn key_id(&self) -> String {
        key_identifier(&self.config.public_key)
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }
}

fn read_key_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        KeyError::Io {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| KeyError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let io_err = |source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(pem).map_err(io_err)?;
    Ok(())
}
