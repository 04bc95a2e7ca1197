//! DOCX embedder
//! Author: kartik4091

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::package::{add_relationship, rels_name, OfficePackage};
use super::xml::{Element, Node};
use super::{
    core_props, ensure_namespace, escape_text, find_tagged, next_shape_id, remove_marker, visible_text, Anchor,
    PackageState, DRAWINGML_NS, IMAGE_REL_TYPE, PNG_CONTENT_TYPE, RELATIONSHIPS_NS,
};
use crate::config::SigningConfig;
use crate::embed::sidecar::SidecarHandler;
use crate::embed::{
    tagged_metadata, wrong_state, EmbeddedDocument, ExtractedBundle, FormatHandler, PreparedDocument, PreparedState,
};
use crate::error::{Error, Result};
use crate::fingerprint::text_fingerprint;
use crate::qr::QrImage;
use crate::types::{DocumentFormat, MetadataChannel, QrPlacement, SignatureBundle};

pub const DOCUMENT_PART: &str = "word/document.xml";
const WORDPROCESSING_DRAWING_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const STAMP_TEXT: &str = "*** MODIFIED / TAMPERED ***";

fn drawing_run(rel_id: &str, size_emu: i64, shape_id: u32) -> String {
    format!(
        concat!(
            r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{size}" cy="{size}"/><wp:docPr id="{id}" name="CertSeal QR {id}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="certseal_qr.png"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{size}" cy="{size}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
        ),
        size = size_emu,
        id = shape_id,
        rel = rel_id,
    )
}

fn text_paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape_text(text)
    )
}

fn stamp_paragraph() -> String {
    format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/><w:color w:val="FF0000"/><w:sz w:val="48"/></w:rPr><w:t>{}</w:t></w:r></w:p>"#,
        STAMP_TEXT
    )
}

fn body_mut(root: &mut Element) -> Result<&mut Element> {
    root.child_mut("w:body")
        .ok_or_else(|| Error::malformed("document part has no w:body"))
}

/// Inserts `paragraph` at the end of the body, ahead of the section properties
fn append_to_body(root: &mut Element, paragraph: Element) -> Result<()> {
    let body = body_mut(root)?;
    let position = body
        .children
        .iter()
        .rposition(|n| matches!(n, Node::Element(e) if e.name == "w:sectPr"))
        .unwrap_or(body.children.len());
    body.children.insert(position, Node::Element(paragraph));
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct DocxHandler;

/// Body text, one line per paragraph, metadata paragraphs excluded
pub fn read_text(path: &Path) -> Result<String> {
    let package = OfficePackage::open(path)?;
    let root = package.read_xml(DOCUMENT_PART)?;
    Ok(visible_text(&root, "w:p", "w:t"))
}

impl FormatHandler for DocxHandler {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    #[instrument(skip(self))]
    fn prepare(&self, input: &Path, placeholder: &str) -> Result<PreparedDocument> {
        let mut package = OfficePackage::open(input)?;
        let mut root = package.read_xml(DOCUMENT_PART)?;

        let mut anchor = None;
        let mut redactions = 0;
        for path in root.find_paths("w:p") {
            let Some(paragraph) = root.at_path_mut(&path) else {
                continue;
            };
            let removed = remove_marker(paragraph, "w:t", placeholder);
            if removed > 0 && anchor.is_none() {
                anchor = Some(Anchor::Paragraph(path));
            }
            redactions += removed;
        }
        if redactions > 0 {
            package.write_xml(DOCUMENT_PART, &root);
        } else {
            warn!("⚠️ Placeholder {} not found; the QR is appended to the body", placeholder);
        }

        Ok(PreparedDocument {
            format: DocumentFormat::Docx,
            source: input.to_path_buf(),
            content_digest: text_fingerprint(&visible_text(&root, "w:p", "w:t"), placeholder),
            redactions,
            state: PreparedState::Package(Box::new(PackageState { package, anchor })),
        })
    }

    #[instrument(skip_all, fields(output = %output.display()))]
    fn embed(
        &self,
        prepared: PreparedDocument,
        qr: &QrImage,
        bundle: &SignatureBundle,
        config: &SigningConfig,
        output: &Path,
    ) -> Result<EmbeddedDocument> {
        let redactions = prepared.redactions;
        let PreparedState::Package(state) = prepared.state else {
            return Err(wrong_state(&DocumentFormat::Docx));
        };
        let PackageState { mut package, anchor } = *state;

        let media = package.unique_name("word/media/", "certseal_qr", "png");
        package.set(&media, qr.to_png()?);
        package.ensure_default_content_type("png", PNG_CONTENT_TYPE)?;
        let target = media.trim_start_matches("word/");
        let rel_id = add_relationship(&mut package, &rels_name(DOCUMENT_PART), IMAGE_REL_TYPE, target)?;

        let mut root = package.read_xml(DOCUMENT_PART)?;
        ensure_namespace(&mut root, "wp", WORDPROCESSING_DRAWING_NS);
        ensure_namespace(&mut root, "r", RELATIONSHIPS_NS);
        ensure_namespace(&mut root, "a", DRAWINGML_NS);

        let size = config.qr.docx_size_emu;
        let run = Element::fragment(&drawing_run(&rel_id, size, next_shape_id(&root, "wp:docPr")))?;
        let at_placeholder = match &anchor {
            Some(Anchor::Paragraph(path)) => match root.at_path_mut(path) {
                Some(paragraph) => {
                    paragraph.push(run.clone());
                    true
                }
                None => false,
            },
            _ => false,
        };
        if !at_placeholder {
            append_to_body(&mut root, wrap_in_paragraph(run))?;
        }

        let json = bundle.to_json();
        let channel = match core_props::write_comments(&mut package, &json) {
            Ok(()) => MetadataChannel::CoreProperties,
            Err(e) => {
                warn!("⚠️ Core properties rejected the bundle ({}); writing a tagged paragraph", e);
                append_to_body(&mut root, Element::fragment(&text_paragraph(&tagged_metadata(&json)))?)?;
                MetadataChannel::TaggedParagraph
            }
        };

        package.write_xml(DOCUMENT_PART, &root);
        package.save(output)?;
        info!("📝 DOCX signed: {}", output.display());

        Ok(EmbeddedDocument {
            output_path: output.to_path_buf(),
            format: DocumentFormat::Docx,
            channels: vec![channel],
            placement: Some(QrPlacement {
                page: 0,
                x: 0.0,
                y: 0.0,
                size: size as f64,
                at_placeholder,
            }),
            redactions,
        })
    }

    fn extract(&self, path: &Path) -> Result<Option<ExtractedBundle>> {
        let package = OfficePackage::open(path)?;
        match core_props::read_comments(&package) {
            Ok(Some(text)) if text.trim_start().starts_with('{') => {
                return Ok(Some(ExtractedBundle {
                    channel: MetadataChannel::CoreProperties,
                    json: text,
                    validation_text: None,
                }));
            }
            Ok(_) => {}
            Err(e) => debug!("Core properties unreadable: {}", e),
        }

        let root = package.read_xml(DOCUMENT_PART)?;
        if let Some(json) = find_tagged(&root, "w:p", "w:t") {
            return Ok(Some(ExtractedBundle {
                channel: MetadataChannel::TaggedParagraph,
                json,
                validation_text: None,
            }));
        }
        SidecarHandler.extract(path)
    }

    fn fingerprint(&self, path: &Path, placeholder: &str) -> Result<String> {
        Ok(text_fingerprint(&read_text(path)?, placeholder))
    }

    #[instrument(skip(self))]
    fn stamp_modified(&self, input: &Path, output: &Path) -> Result<()> {
        let mut package = OfficePackage::open(input)?;
        let mut root = package.read_xml(DOCUMENT_PART)?;
        let stamp = Element::fragment(&stamp_paragraph())?;
        body_mut(&mut root)?.children.insert(0, Node::Element(stamp));
        package.write_xml(DOCUMENT_PART, &root);
        package.save(output)?;
        Ok(())
    }
}

fn wrap_in_paragraph(run: Element) -> Element {
    let mut paragraph = Element::new("w:p");
    paragraph.push(run);
    paragraph
}
