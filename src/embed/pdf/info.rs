//! Document-information dictionary channel
//! Author: kartik4091

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use lopdf::{Dictionary, Document, Object, StringFormat};
use tracing::{debug, warn};

use crate::config::DocumentInfo;
use crate::embed::ExtractedBundle;
use crate::types::MetadataChannel;

pub const SIGNATURE_KEY: &str = "Signature";
pub const VALIDATION_KEY: &str = "ValidationText";
pub const CUSTOM_KEY: &str = "CertSeal_Signature";

/// PDF text string: plain bytes for ASCII, UTF-16BE with BOM otherwise
pub fn encode_text_string(text: &str) -> Object {
    let bytes = if text.is_ascii() {
        text.as_bytes().to_vec()
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        bytes
    };
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| *b as char).collect(),
    }
}

fn existing_info(doc: &Document) -> Dictionary {
    match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        },
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

fn info_string(info: &Dictionary, key: &str) -> Option<String> {
    match info.get(key.as_bytes()) {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Writes the bundle and standard fields into a fresh info dictionary.
///
/// `/Signature` is the durable channel and always written. The legend and
/// the base64 custom key are best effort.
pub fn write_info(doc: &mut Document, bundle_json: &str, legend: &str, fields: &DocumentInfo) -> Vec<MetadataChannel> {
    let mut info = existing_info(doc);
    let standard = [
        ("Title", &fields.title),
        ("Author", &fields.author),
        ("Subject", &fields.subject),
        ("Creator", &fields.creator),
        ("Producer", &fields.producer),
    ];
    for (key, value) in standard {
        if let Some(value) = value {
            info.set(key, encode_text_string(value));
        }
    }

    let mut channels = vec![MetadataChannel::PdfInfoSignature];
    info.set(SIGNATURE_KEY, encode_text_string(bundle_json));

    if !legend.is_empty() {
        info.set(VALIDATION_KEY, encode_text_string(legend));
    }

    let encoded = BASE64.encode(bundle_json.as_bytes());
    if encoded.is_empty() {
        warn!("Skipping custom signature key: empty bundle");
    } else {
        info.set(CUSTOM_KEY, Object::String(encoded.into_bytes(), StringFormat::Literal));
        channels.push(MetadataChannel::PdfInfoCustomKey);
    }

    let info_id = doc.add_object(Object::Dictionary(info));
    doc.trailer.set("Info", Object::Reference(info_id));
    channels
}

/// Reads the bundle back: `/Signature` first, then the custom key
pub fn read_bundle(doc: &Document) -> Option<ExtractedBundle> {
    let info = existing_info(doc);
    let validation_text = info_string(&info, VALIDATION_KEY);

    if let Some(json) = info_string(&info, SIGNATURE_KEY).filter(|s| !s.trim().is_empty()) {
        return Some(ExtractedBundle {
            channel: MetadataChannel::PdfInfoSignature,
            json,
            validation_text,
        });
    }

    let encoded = info_string(&info, CUSTOM_KEY)?;
    match BASE64
        .decode(encoded.trim())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
    {
        Some(json) => Some(ExtractedBundle {
            channel: MetadataChannel::PdfInfoCustomKey,
            json,
            validation_text,
        }),
        None => {
            debug!("Custom signature key is not valid base64 UTF-8");
            // hand the raw text over so the checker reports a damaged bundle
            Some(ExtractedBundle {
                channel: MetadataChannel::PdfInfoCustomKey,
                json: encoded,
                validation_text,
            })
        }
    }
}
