mod fixtures;

use certseal::embed::modified_sibling;
use certseal::embed::sidecar::sidecar_path;
use certseal::embed::office::{docx, pptx};
use certseal::{IntegrityChecker, IntegrityReason, Issuer, MetadataChannel, VerificationStatus};
use fixtures::{TestFixtures, BROKEN_CORE_XML, CORE_XML, MARKER};
use serde_json::json;

const SLIDE: &str = "ppt/slides/slide1.xml";

fn checker() -> IntegrityChecker {
    IntegrityChecker::from_config(&TestFixtures::signing_config()).unwrap()
}

fn issuer() -> Issuer {
    Issuer::new(TestFixtures::signing_config()).unwrap()
}

#[test]
fn test_docx_signed_output_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(
        &input,
        &["Certificate of Participation", "Awarded to Ana Lopez", MARKER],
        Some(CORE_XML),
    );

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Ana Lopez"})).unwrap();
    assert_eq!(signed.embedded.channels, vec![MetadataChannel::CoreProperties]);
    assert!(signed.embedded.placement.unwrap().at_placeholder);
    assert!(!docx::read_text(&output).unwrap().contains(MARKER));

    let report = checker().check(&output);
    assert_eq!(report.status, VerificationStatus::SignatureFoundValid, "{}", report.message());
    assert_eq!(report.channel, Some(MetadataChannel::CoreProperties));
    assert!(!modified_sibling(&output).exists());
}

#[test]
fn test_docx_body_edit_is_invalid_with_marked_copy() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Ana Lopez", MARKER], Some(CORE_XML));
    issuer().sign_record(&input, &output, &json!({"name": "Ana Lopez"})).unwrap();

    TestFixtures::edit_part(&output, docx::DOCUMENT_PART, "Ana Lopez", "Eve Mallory");

    let report = checker().check(&output);
    assert_eq!(report.status, VerificationStatus::SignatureFoundInvalid);
    assert_eq!(report.reason, IntegrityReason::ContentModified);
    let copy = report.tamper_copy.unwrap();
    assert_eq!(copy, dir.path().join("signed_MODIFIED.docx"));
    let stamped = docx::read_text(&copy).unwrap();
    assert!(stamped.starts_with("*** MODIFIED / TAMPERED ***"));
    assert!(docx::read_text(&output).unwrap().contains("Eve Mallory"));
}

#[test]
fn test_docx_falls_back_to_sidecar_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Ana Lopez", MARKER], Some(CORE_XML));
    let signed = issuer().sign_record(&input, &output, &json!({"name": "Ana Lopez"})).unwrap();

    // the unsigned template carries the same visible text once the marker is ignored
    std::fs::write(sidecar_path(&input), signed.bundle.to_json()).unwrap();
    let report = checker().check(&input);
    assert_eq!(report.status, VerificationStatus::SignatureFoundValid, "{}", report.message());
    assert_eq!(report.channel, Some(MetadataChannel::Sidecar));
}

#[test]
fn test_docx_without_metadata_has_no_signature() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "plain.docx");
    TestFixtures::write_docx(&input, &["Just a document"], Some(CORE_XML));

    let report = checker().check(&input);
    assert_eq!(report.status, VerificationStatus::NoSignature);
    assert_eq!(report.reason, IntegrityReason::NoSignatureData);
    assert!(report.tamper_copy.is_none());
    assert!(!modified_sibling(&input).exists());
}

#[test]
fn test_docx_marker_split_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Seal: {{|QR}}|."], Some(CORE_XML));

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Ana"})).unwrap();
    assert_eq!(signed.embedded.redactions, 1);
    let text = docx::read_text(&output).unwrap();
    assert_eq!(text.trim(), "Seal: .");
}

#[test]
fn test_docx_core_part_is_created_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Luis", MARKER], None);

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Luis"})).unwrap();
    assert_eq!(signed.embedded.channels, vec![MetadataChannel::CoreProperties]);
    assert!(checker().check(&output).is_valid());
}

#[test]
fn test_docx_broken_core_part_falls_back_to_tagged_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Luis", MARKER], Some(BROKEN_CORE_XML));

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Luis"})).unwrap();
    assert_eq!(signed.embedded.channels, vec![MetadataChannel::TaggedParagraph]);

    let report = checker().check(&output);
    assert_eq!(report.channel, Some(MetadataChannel::TaggedParagraph));
    assert!(report.is_valid(), "{}", report.message());
}

#[test]
fn test_docx_without_marker_appends_qr_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.docx");
    let output = TestFixtures::file_in(&dir, "signed.docx");
    TestFixtures::write_docx(&input, &["Awarded to Luis"], Some(CORE_XML));

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Luis"})).unwrap();
    assert!(!signed.embedded.placement.unwrap().at_placeholder);
    assert!(checker().check(&output).is_valid());
}

#[test]
fn test_pptx_sign_verify_and_tamper() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.pptx");
    let output = TestFixtures::file_in(&dir, "signed.pptx");
    TestFixtures::write_pptx(
        &input,
        &[
            &[("Certificate for Ana Lopez", 914_400, 914_400), (MARKER, 6_400_800, 4_572_000)],
            &[("Thank you", 914_400, 914_400)],
        ],
        Some(CORE_XML),
    );

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Ana Lopez"})).unwrap();
    let placement = signed.embedded.placement.unwrap();
    assert!(placement.at_placeholder);
    assert_eq!((placement.x, placement.y), (6_400_800.0, 4_572_000.0));
    assert!(!pptx::read_text(&output).unwrap().contains(MARKER));
    assert!(checker().check(&output).is_valid());

    TestFixtures::edit_part(&output, SLIDE, "Ana Lopez", "Eve Mallory");
    let report = checker().check(&output);
    assert_eq!(report.reason, IntegrityReason::ContentModified);
    let stamped = pptx::read_text(&report.tamper_copy.unwrap()).unwrap();
    assert!(stamped.contains("[MODIFIED] Certificate for Eve Mallory"));
}

#[test]
fn test_pptx_without_core_rels_uses_text_box() {
    let dir = tempfile::tempdir().unwrap();
    let input = TestFixtures::file_in(&dir, "template.pptx");
    let output = TestFixtures::file_in(&dir, "signed.pptx");
    TestFixtures::write_pptx(&input, &[&[("Certificate for Luis", 914_400, 914_400)]], Some(BROKEN_CORE_XML));

    let signed = issuer().sign_record(&input, &output, &json!({"name": "Luis"})).unwrap();
    assert_eq!(signed.embedded.channels, vec![MetadataChannel::TaggedParagraph]);
    assert!(!signed.embedded.placement.unwrap().at_placeholder);

    let report = checker().check(&output);
    assert_eq!(report.channel, Some(MetadataChannel::TaggedParagraph));
    assert!(report.is_valid(), "{}", report.message());
}
