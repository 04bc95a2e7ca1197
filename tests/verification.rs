mod fixtures;

use std::fs;

use certseal::crypto::{ensure_keys, KeyManager};
use certseal::embed::modified_sibling;
use certseal::embed::sidecar::sidecar_path;
use certseal::{IntegrityChecker, IntegrityReason, Issuer, MetadataChannel, VerificationStatus};
use fixtures::{TestFixtures, CORE_XML, MARKER};
use serde_json::json;

#[test]
fn test_other_key_pair_rejects_signature() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Ana", MARKER], Some(CORE_XML));
    Issuer::new(TestFixtures::signing_config())
        .unwrap()
        .sign_record(&input, &output, &json!({"name": "Ana"}))
        .unwrap();

    let other = TestFixtures::config_in(&dir.path().join("other"), 1024);
    KeyManager::new(other.keys.clone()).ensure().unwrap();
    let report = IntegrityChecker::from_config(&other).unwrap().check(&output);
    assert_eq!(report.status, VerificationStatus::SignatureFoundInvalid);
    assert_eq!(report.reason, IntegrityReason::SignatureMismatch);
    assert!(modified_sibling(&output).exists());
}

#[test]
fn test_key_provisioning_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let private_path = dir.path().join("private_key.pem");
    let public_path = dir.path().join("public_key.pem");

    ensure_keys(&private_path, &public_path, 1024).unwrap();
    let first = (fs::read(&private_path).unwrap(), fs::read(&public_path).unwrap());
    ensure_keys(&private_path, &public_path, 1024).unwrap();
    let second = (fs::read(&private_path).unwrap(), fs::read(&public_path).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_sidecar_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "certificate.ppt");
    let output = TestFixtures::file_in(&dir, "signed.ppt");
    fs::write(&input, b"legacy binary presentation").unwrap();

    let config = TestFixtures::signing_config();
    let signed = Issuer::new(config.clone())
        .unwrap()
        .sign_record(&input, &output, &json!({"name": "Ana"}))
        .unwrap();
    assert_eq!(signed.embedded.channels, vec![MetadataChannel::Sidecar]);
    let sidecar = fs::read_to_string(sidecar_path(&output)).unwrap();
    assert!(sidecar.starts_with(r#"{"payload":{"content_digest":"sha256:"#));

    let checker = IntegrityChecker::from_config(&config).unwrap();
    assert!(checker.check(&output).is_valid());

    fs::write(&output, b"legacy binary presentation, edited").unwrap();
    let report = checker.check(&output);
    assert_eq!(report.reason, IntegrityReason::ContentModified);
    assert!(dir.path().join("signed_MODIFIED.ppt").exists());
}

#[test]
fn test_damaged_bundle_is_reported_without_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = TestFixtures::file_in(&dir, "notes.txt");
    fs::write(&path, b"notes").unwrap();
    fs::write(sidecar_path(&path), br#"{"payload": {}, "signature": ""}"#).unwrap();

    let report = IntegrityChecker::from_config(&TestFixtures::signing_config())
        .unwrap()
        .check(&path);
    assert_eq!(report.status, VerificationStatus::NoSignature);
    assert!(matches!(report.reason, IntegrityReason::DamagedBundle(_)));
    assert_eq!(report.channel, Some(MetadataChannel::Sidecar));
    assert!(!modified_sibling(&path).exists());
}

#[test]
fn test_unreadable_document_never_counts_as_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = TestFixtures::file_in(&dir, "broken.pdf");
    fs::write(&path, b"%PDF-1.4 truncated").unwrap();

    let report = IntegrityChecker::from_config(&TestFixtures::signing_config())
        .unwrap()
        .check(&path);
    assert_eq!(report.status, VerificationStatus::NoSignature);
    assert!(matches!(report.reason, IntegrityReason::ExtractionFailed(_)));
    assert!(!report.is_valid());
}
