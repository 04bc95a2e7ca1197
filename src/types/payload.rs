//! Certificate payload and signature bundle
//! Author: kartik4091

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto::canonical::canonical_json;
use crate::error::{EmbedError, Error, Result};

/// One participant row: field name to value
pub type CertificateRecord = Map<String, Value>;

pub const FIELD_DATA: &str = "data";
pub const FIELD_ISSUED_AT: &str = "issued_at";
pub const FIELD_ISSUER: &str = "issuer";
pub const FIELD_CONTENT_DIGEST: &str = "content_digest";

/// Signed certificate payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificatePayload {
    fields: Map<String, Value>,
}

impl CertificatePayload {
    /// Builds the payload for a record at signing time
    pub fn build(record: CertificateRecord, issuer: &str, content_digest: Option<String>) -> Self {
        let issued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut fields = Map::new();
        fields.insert(FIELD_DATA.into(), Value::Object(record));
        fields.insert(FIELD_ISSUED_AT.into(), Value::String(issued_at));
        fields.insert(FIELD_ISSUER.into(), Value::String(issuer.to_string()));
        if let Some(digest) = content_digest {
            fields.insert(FIELD_CONTENT_DIGEST.into(), Value::String(digest));
        }
        Self { fields }
    }

    /// Converts any serializable record into a field map
    pub fn record_from<T: Serialize>(record: &T) -> Result<CertificateRecord> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::Canonicalization(format!(
                "record must be a mapping, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(Error::Canonicalization(e.to_string())),
        }
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.fields.get(FIELD_DATA).and_then(Value::as_object)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.fields.get(FIELD_ISSUER).and_then(Value::as_str)
    }

    pub fn issued_at(&self) -> Option<&str> {
        self.fields.get(FIELD_ISSUED_AT).and_then(Value::as_str)
    }

    pub fn content_digest(&self) -> Option<&str> {
        self.fields.get(FIELD_CONTENT_DIGEST).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Payload plus signature plus key identifier; the unit stored in QR and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureBundle {
    pub payload: CertificatePayload,
    /// Base64 RSA-PSS signature over the canonical payload bytes
    pub signature: String,
    /// File name of the public key the verifier must obtain out of band
    pub pubkey_id: String,
}

impl SignatureBundle {
    /// Sorted-key, compact serialization; used for the QR, metadata and sidecar
    pub fn to_json(&self) -> String {
        let mut map = Map::new();
        map.insert("payload".into(), self.payload.to_value());
        map.insert("signature".into(), Value::String(self.signature.clone()));
        map.insert("pubkey_id".into(), Value::String(self.pubkey_id.clone()));
        canonical_json(&Value::Object(map))
    }

    /// Parses a stored bundle. Missing payload or signature is a damaged bundle.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text.trim())?;
        let Value::Object(map) = value else {
            return Err(incomplete("bundle is not a JSON object"));
        };
        let payload = match map.get("payload") {
            Some(Value::Object(fields)) if !fields.is_empty() => fields.clone(),
            _ => return Err(incomplete("payload missing")),
        };
        let signature = match map.get("signature") {
            Some(Value::String(sig)) if !sig.is_empty() => sig.clone(),
            _ => return Err(incomplete("signature missing")),
        };
        let pubkey_id = map
            .get("pubkey_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            payload: CertificatePayload::from_fields(payload),
            signature,
            pubkey_id,
        })
    }
}

fn incomplete(reason: &str) -> Error {
    Error::Embed(EmbedError::Malformed(format!("signature data incomplete: {}", reason)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
