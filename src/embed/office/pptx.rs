//! PPTX embedder
//! Author: kartik4091

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::package::{add_relationship, rels_name, OfficePackage};
use super::xml::Element;
use super::{
    core_props, ensure_namespace, escape_text, find_tagged, next_shape_id, remove_marker, visible_text, Anchor,
    PackageState, DRAWINGML_NS, IMAGE_REL_TYPE, PNG_CONTENT_TYPE, RELATIONSHIPS_NS,
};
use crate::config::SigningConfig;
use crate::embed::sidecar::SidecarHandler;
use crate::embed::{
    tagged_metadata, wrong_state, EmbeddedDocument, ExtractedBundle, FormatHandler, PreparedDocument, PreparedState,
};
use crate::error::{EmbedError, Error, Result};
use crate::fingerprint::text_fingerprint;
use crate::qr::QrImage;
use crate::types::{DocumentFormat, MetadataChannel, QrPlacement, SignatureBundle};

pub const EMU_PER_INCH: i64 = 914_400;
/// QR position when no placeholder was found: 8 in from the left, 5 in from the top
const DEFAULT_OFFSET: (i64, i64) = (8 * EMU_PER_INCH, 5 * EMU_PER_INCH);
const METADATA_OFFSET: i64 = EMU_PER_INCH / 5;
const STAMP_PREFIX: &str = "[MODIFIED] ";

/// Slide parts ordered by slide number
pub fn slide_parts(package: &OfficePackage) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = package
        .names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();
    slides.into_iter().map(|(_, name)| name).collect()
}

fn sp_tree_mut(root: &mut Element) -> Result<&mut Element> {
    root.child_mut("p:cSld")
        .and_then(|c| c.child_mut("p:spTree"))
        .ok_or_else(|| Error::malformed("slide has no p:cSld/p:spTree"))
}

fn shape_offset(shape: &Element) -> (i64, i64) {
    let off = shape
        .child("p:spPr")
        .and_then(|p| p.child("a:xfrm"))
        .and_then(|x| x.child("a:off"));
    let coord = |key: &str| {
        off.and_then(|o| o.attr(key))
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };
    (coord("x"), coord("y"))
}

fn picture(rel_id: &str, shape_id: u32, x: i64, y: i64, size: i64) -> String {
    format!(
        concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="CertSeal QR {id}"/>"#,
            r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{size}" cy="{size}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
        ),
        id = shape_id,
        rel = rel_id,
        x = x,
        y = y,
        size = size,
    )
}

fn text_box(shape_id: u32, text: &str) -> String {
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="CertSeal Metadata {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="{off}" y="{off}"/><a:ext cx="6400800" cy="365760"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#,
            r#"<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" sz="100"/>"#,
            r#"<a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        ),
        id = shape_id,
        off = METADATA_OFFSET,
        text = escape_text(text),
    )
}

fn prepare_slide(root: &mut Element, index: usize, marker: &str, anchor: &mut Option<Anchor>) -> usize {
    let mut removed = 0;
    for path in root.find_paths("p:sp") {
        let Some(shape) = root.at_path_mut(&path) else {
            continue;
        };
        let mut in_shape = 0;
        for paragraph_path in shape.find_paths("a:p") {
            if let Some(paragraph) = shape.at_path_mut(&paragraph_path) {
                in_shape += remove_marker(paragraph, "a:t", marker);
            }
        }
        if in_shape > 0 && anchor.is_none() {
            let (x, y) = shape_offset(shape);
            *anchor = Some(Anchor::Shape { slide: index, x, y });
        }
        removed += in_shape;
    }
    // tables and other frames
    for path in root.find_paths("a:p") {
        if let Some(paragraph) = root.at_path_mut(&path) {
            removed += remove_marker(paragraph, "a:t", marker);
        }
    }
    removed
}

fn presentation_text(package: &OfficePackage, slides: &[String]) -> Result<String> {
    let mut text = Vec::with_capacity(slides.len());
    for slide in slides {
        text.push(visible_text(&package.read_xml(slide)?, "a:p", "a:t"));
    }
    Ok(text.join("\n"))
}

/// Text of every slide in slide order
pub fn read_text(path: &Path) -> Result<String> {
    let package = OfficePackage::open(path)?;
    presentation_text(&package, &slide_parts(&package))
}

#[derive(Debug, Clone, Copy)]
pub struct PptxHandler;

impl FormatHandler for PptxHandler {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    #[instrument(skip(self))]
    fn prepare(&self, input: &Path, placeholder: &str) -> Result<PreparedDocument> {
        let mut package = OfficePackage::open(input)?;
        let slides = slide_parts(&package);
        if slides.is_empty() {
            return Err(EmbedError::NoPages.into());
        }

        let mut anchor = None;
        let mut redactions = 0;
        for (index, slide) in slides.iter().enumerate() {
            let mut root = package.read_xml(slide)?;
            let removed = prepare_slide(&mut root, index, placeholder, &mut anchor);
            if removed > 0 {
                debug!("Removed {} placeholder(s) from {}", removed, slide);
                package.write_xml(slide, &root);
                redactions += removed;
            }
        }
        if anchor.is_none() {
            warn!("⚠️ Placeholder {} not found; the QR goes to the first slide", placeholder);
        }

        let content_digest = text_fingerprint(&presentation_text(&package, &slides)?, placeholder);
        Ok(PreparedDocument {
            format: DocumentFormat::Pptx,
            source: input.to_path_buf(),
            content_digest,
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
            return Err(wrong_state(&DocumentFormat::Pptx));
        };
        let PackageState { mut package, anchor } = *state;
        let slides = slide_parts(&package);

        let (slide_index, x, y, at_placeholder) = match anchor {
            Some(Anchor::Shape { slide, x, y }) if slide < slides.len() => (slide, x, y, true),
            _ => (0, DEFAULT_OFFSET.0, DEFAULT_OFFSET.1, false),
        };
        let slide = slides
            .get(slide_index)
            .cloned()
            .ok_or_else(|| EmbedError::MissingPart("ppt/slides/slide1.xml".into()))?;

        let media = package.unique_name("ppt/media/", "certseal_qr", "png");
        package.set(&media, qr.to_png()?);
        package.ensure_default_content_type("png", PNG_CONTENT_TYPE)?;
        let target = format!("../{}", media.trim_start_matches("ppt/"));
        let rel_id = add_relationship(&mut package, &rels_name(&slide), IMAGE_REL_TYPE, &target)?;

        let size = config.qr.pptx_size_emu;
        let mut root = package.read_xml(&slide)?;
        ensure_namespace(&mut root, "r", RELATIONSHIPS_NS);
        ensure_namespace(&mut root, "a", DRAWINGML_NS);
        let pic = Element::fragment(&picture(&rel_id, next_shape_id(&root, "p:cNvPr"), x, y, size))?;
        sp_tree_mut(&mut root)?.push(pic);
        package.write_xml(&slide, &root);

        let json = bundle.to_json();
        let channel = match core_props::write_comments(&mut package, &json) {
            Ok(()) => MetadataChannel::CoreProperties,
            Err(e) => {
                warn!("⚠️ Core properties rejected the bundle ({}); adding a tagged text box", e);
                let first = &slides[0];
                let mut root = package.read_xml(first)?;
                let shape = Element::fragment(&text_box(next_shape_id(&root, "p:cNvPr"), &tagged_metadata(&json)))?;
                sp_tree_mut(&mut root)?.push(shape);
                package.write_xml(first, &root);
                MetadataChannel::TaggedParagraph
            }
        };

        package.save(output)?;
        info!("📊 PPTX signed: {}", output.display());

        Ok(EmbeddedDocument {
            output_path: output.to_path_buf(),
            format: DocumentFormat::Pptx,
            channels: vec![channel],
            placement: Some(QrPlacement {
                page: slide_index,
                x: x as f64,
                y: y as f64,
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

        for slide in slide_parts(&package) {
            let root = package.read_xml(&slide)?;
            if let Some(json) = find_tagged(&root, "a:p", "a:t") {
                return Ok(Some(ExtractedBundle {
                    channel: MetadataChannel::TaggedParagraph,
                    json,
                    validation_text: None,
                }));
            }
        }
        SidecarHandler.extract(path)
    }

    fn fingerprint(&self, path: &Path, placeholder: &str) -> Result<String> {
        Ok(text_fingerprint(&read_text(path)?, placeholder))
    }

    #[instrument(skip(self))]
    fn stamp_modified(&self, input: &Path, output: &Path) -> Result<()> {
        let mut package = OfficePackage::open(input)?;
        for slide in slide_parts(&package) {
            let mut root = package.read_xml(&slide)?;
            for path in root.find_paths("p:txBody") {
                let Some(body) = root.at_path_mut(&path) else {
                    continue;
                };
                if let Some(first) = body.find_paths("a:t").into_iter().next() {
                    if let Some(text) = body.at_path_mut(&first) {
                        let stamped = format!("{}{}", STAMP_PREFIX, text.own_text());
                        text.set_text(&stamped);
                    }
                }
            }
            package.write_xml(&slide, &root);
        }
        package.save(output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slides_sorted_numerically() {
        let mut package = OfficePackage::default();
        for name in ["ppt/slides/slide10.xml", "ppt/slides/slide2.xml", "ppt/slides/_rels/slide2.xml.rels"] {
            package.set(name, b"<x/>".to_vec());
        }
        assert_eq!(
            slide_parts(&package),
            vec!["ppt/slides/slide2.xml".to_string(), "ppt/slides/slide10.xml".to_string()]
        );
    }

    #[test]
    fn test_marker_shape_becomes_anchor() {
        let mut root = Element::fragment(concat!(
            r#"<p:sld><p:cSld><p:spTree>"#,
            r#"<p:sp><p:spPr><a:xfrm><a:off x="100" y="200"/></a:xfrm></p:spPr>"#,
            r#"<p:txBody><a:p><a:r><a:t>Title</a:t></a:r></a:p></p:txBody></p:sp>"#,
            r#"<p:sp><p:spPr><a:xfrm><a:off x="3000" y="4000"/></a:xfrm></p:spPr>"#,
            r#"<p:txBody><a:p><a:r><a:t>{{QR}}</a:t></a:r></a:p></p:txBody></p:sp>"#,
            r#"</p:spTree></p:cSld></p:sld>"#
        ))
        .unwrap();
        let mut anchor = None;
        assert_eq!(prepare_slide(&mut root, 0, "{{QR}}", &mut anchor), 1);
        assert_eq!(anchor, Some(Anchor::Shape { slide: 0, x: 3000, y: 4000 }));
        assert!(!visible_text(&root, "a:p", "a:t").contains("{{QR}}"));
    }
}
