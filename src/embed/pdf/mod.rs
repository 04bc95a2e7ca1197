//! PDF embedder: placeholder redaction, QR overlay, info dictionary
//! Author: kartik4091
//! Created: 2025-06-05

pub mod cmap;
pub mod fonts;
pub mod info;
pub mod overlay;
pub mod page;
pub mod text;

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use lopdf::content::Operation;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

use self::fonts::FontTable;
use self::overlay::{OverlaySpec, BOLD_FONT, FONT, QR_IMAGE, STAMP_STATE, WATERMARK_STATE};
use self::page::PageBox;
use self::text::{find_marker, redact_operation, visible_text, TextScanner};
use super::{wrong_state, EmbeddedDocument, ExtractedBundle, FormatHandler, PreparedDocument, PreparedState};
use crate::config::{OverlayPages, SigningConfig};
use crate::error::{EmbedError, Result};
use crate::fingerprint::text_fingerprint;
use crate::qr::QrImage;
use crate::types::{DocumentFormat, QrPlacement, SignatureBundle};

/// Distance of the default QR position from the page's bottom-right corner
const DEFAULT_MARGIN: f32 = 36.0;

/// First placeholder found, in top-down page coordinates relative to the page box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderHit {
    pub page: usize,
    /// Left edge from the page's left side
    pub x0: f32,
    /// Top edge from the page's top side
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Loaded document with placeholders already removed
pub struct PdfState {
    doc: Document,
    pages: Vec<ObjectId>,
    hit: Option<PlaceholderHit>,
}

impl PdfState {
    pub fn placeholder(&self) -> Option<PlaceholderHit> {
        self.hit
    }
}

/// Bottom-up origin for an element of `size` whose top-down top edge is `top`
pub fn to_overlay_y(page: &PageBox, top: f32, size: f32) -> f32 {
    page.lly + page.height() - top - size
}

fn load(path: &Path) -> Result<Document> {
    let doc = Document::load(path)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(EmbedError::Encrypted.into());
    }
    Ok(doc)
}

fn page_ids(doc: &Document) -> Result<Vec<ObjectId>> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(EmbedError::NoPages.into());
    }
    Ok(pages)
}

/// Visible (non-artifact) decoded text of every page, in page order
fn document_text(doc: &Document, pages: &[ObjectId]) -> Result<String> {
    let mut text = String::new();
    for page_id in pages {
        let ops = page::operations(doc, *page_id)?;
        let fonts = FontTable::from_resources(doc, &page::resources(doc, *page_id));
        text.push_str(&visible_text(&TextScanner::new(&fonts).scan(&ops)));
    }
    Ok(text)
}

/// Removes every marker occurrence from the page content. Returns the number
/// removed and the first marker's top-down rectangle.
fn redact_page(doc: &mut Document, page_id: ObjectId, marker: &str) -> Result<(usize, Option<[f32; 4]>)> {
    let ops = page::operations(doc, page_id)?;
    let fonts = FontTable::from_resources(doc, &page::resources(doc, page_id));
    let shown = TextScanner::new(&fonts).scan(&ops);
    let page_box = page::media_box(doc, page_id);

    let matches = find_marker(&shown, marker);
    let Some(first) = matches.first().map(|m| {
        [
            m.bounds.x0 - page_box.llx,
            page_box.ury - m.bounds.y1,
            m.bounds.x1 - page_box.llx,
            page_box.ury - m.bounds.y0,
        ]
    }) else {
        return Ok((0, None));
    };

    // glyph ranges to drop, per content operation
    let mut targets: BTreeMap<usize, Vec<Range<usize>>> = BTreeMap::new();
    for found in &matches {
        for (item, range) in &found.spans {
            targets.entry(*item).or_default().push(range.clone());
        }
    }
    let mut rewrites: BTreeMap<usize, (usize, Vec<Range<usize>>)> = targets
        .into_iter()
        .map(|(item, ranges)| (shown[item].op_index, (item, ranges)))
        .collect();

    let mut rewritten: Vec<Operation> = Vec::with_capacity(ops.len() + rewrites.len());
    for (index, op) in ops.into_iter().enumerate() {
        match rewrites.remove(&index) {
            Some((item, ranges)) => {
                let shown_op = &shown[item];
                let metrics = fonts.get(&shown_op.font);
                rewritten.extend(redact_operation(&op, &ranges, &shown_op.advances(), metrics));
            }
            None => rewritten.push(op),
        }
    }
    page::replace_content(doc, page_id, &page::encode(rewritten)?)?;
    Ok((matches.len(), Some(first)))
}

/// Visible text of every page, decoded through each font
pub fn read_text(path: &Path) -> Result<String> {
    let doc = load(path)?;
    let pages = page_ids(&doc)?;
    document_text(&doc, &pages)
}

/// QR origin over a placeholder, kept inside the page box
fn placeholder_position(page_box: &PageBox, hit: &PlaceholderHit, size: f32) -> (f32, f32) {
    let x = (page_box.llx + hit.x0).min(page_box.urx - size).max(page_box.llx);
    let y = to_overlay_y(page_box, hit.y0, size).max(page_box.lly);
    (x, y)
}

fn default_position(page_box: &PageBox, size: f32) -> (f32, f32) {
    (
        (page_box.urx - size - DEFAULT_MARGIN).max(page_box.llx),
        page_box.lly + DEFAULT_MARGIN,
    )
}

#[derive(Debug, Clone, Copy)]
pub struct PdfHandler;

impl FormatHandler for PdfHandler {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    #[instrument(skip(self))]
    fn prepare(&self, input: &Path, placeholder: &str) -> Result<PreparedDocument> {
        let mut doc = load(input)?;
        let pages = page_ids(&doc)?;

        let mut hit = None;
        let mut redactions = 0;
        for (index, page_id) in pages.iter().enumerate() {
            let (removed, rect) = redact_page(&mut doc, *page_id, placeholder)?;
            redactions += removed;
            if hit.is_none() {
                if let Some([x0, y0, x1, y1]) = rect {
                    debug!("Placeholder on page {} at ({:.1}, {:.1})", index + 1, x0, y0);
                    hit = Some(PlaceholderHit { page: index, x0, y0, x1, y1 });
                }
            }
        }
        if hit.is_none() {
            warn!("⚠️ Placeholder {} not found; the QR goes to the default corner", placeholder);
        }

        let content_digest = text_fingerprint(&document_text(&doc, &pages)?, placeholder);
        Ok(PreparedDocument {
            format: DocumentFormat::Pdf,
            source: input.to_path_buf(),
            content_digest,
            redactions,
            state: PreparedState::Pdf(Box::new(PdfState { doc, pages, hit })),
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
        let PreparedState::Pdf(state) = prepared.state else {
            return Err(wrong_state(&DocumentFormat::Pdf));
        };
        let PdfState { mut doc, pages, hit } = *state;

        let size = config.qr.pdf_size;
        let image_id = doc.add_object(overlay::qr_xobject(qr)?);
        let font_id = doc.add_object(page::standard_font("Helvetica"));
        let state_id = doc.add_object(page::opacity_state(config.watermark.opacity));
        let primary_page = hit.map(|h| h.page).unwrap_or(0);

        let mut placement = None;
        for (index, page_id) in pages.iter().enumerate() {
            if config.overlay_pages == OverlayPages::PlaceholderPage && index != primary_page {
                continue;
            }
            let page_box = page::media_box(&doc, *page_id);
            let (x, y, at_placeholder) = match hit.filter(|h| h.page == index) {
                Some(h) => {
                    let (x, y) = placeholder_position(&page_box, &h, size);
                    (x, y, true)
                }
                None => {
                    let (x, y) = default_position(&page_box, size);
                    (x, y, false)
                }
            };

            let ops = overlay::certificate_overlay(&OverlaySpec {
                page: page_box,
                x,
                y,
                size,
                info_text: &config.info_text,
                legend: &config.validation_legend,
                watermark: &config.watermark,
            });
            page::add_resource(&mut doc, *page_id, "XObject", QR_IMAGE, Object::Reference(image_id))?;
            page::add_resource(&mut doc, *page_id, "Font", FONT, Object::Reference(font_id))?;
            page::add_resource(&mut doc, *page_id, "ExtGState", WATERMARK_STATE, Object::Reference(state_id))?;
            page::wrap_content(&mut doc, *page_id, &page::encode(ops)?)?;

            if index == primary_page {
                placement = Some(QrPlacement {
                    page: index,
                    x: x as f64,
                    y: y as f64,
                    size: size as f64,
                    at_placeholder,
                });
            }
        }

        let channels = info::write_info(&mut doc, &bundle.to_json(), &config.validation_legend, &config.document_info);
        doc.save(output)?;
        info!("📄 PDF signed: {}", output.display());

        Ok(EmbeddedDocument {
            output_path: output.to_path_buf(),
            format: DocumentFormat::Pdf,
            channels,
            placement,
            redactions,
        })
    }

    fn extract(&self, path: &Path) -> Result<Option<ExtractedBundle>> {
        let doc = load(path)?;
        Ok(info::read_bundle(&doc))
    }

    fn fingerprint(&self, path: &Path, placeholder: &str) -> Result<String> {
        let doc = load(path)?;
        let pages = page_ids(&doc)?;
        Ok(text_fingerprint(&document_text(&doc, &pages)?, placeholder))
    }

    #[instrument(skip(self))]
    fn stamp_modified(&self, input: &Path, output: &Path) -> Result<()> {
        let mut doc = load(input)?;
        let pages = page_ids(&doc)?;
        let font_id = doc.add_object(page::standard_font("Helvetica-Bold"));
        let state_id = doc.add_object(page::opacity_state(0.3));
        for page_id in &pages {
            let page_box = page::media_box(&doc, *page_id);
            page::add_resource(&mut doc, *page_id, "Font", BOLD_FONT, Object::Reference(font_id))?;
            page::add_resource(&mut doc, *page_id, "ExtGState", STAMP_STATE, Object::Reference(state_id))?;
            page::wrap_content(&mut doc, *page_id, &page::encode(overlay::tamper_overlay(page_box))?)?;
        }
        doc.save(output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_y_flips_top_down_coordinates() {
        let page = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        };
        // an element whose top sits 100pt below the top edge
        assert_eq!(to_overlay_y(&page, 100.0, 60.0), 632.0);
        let shifted = PageBox { lly: 10.0, ury: 802.0, ..page };
        assert_eq!(to_overlay_y(&shifted, 100.0, 60.0), 642.0);
    }

    #[test]
    fn test_default_position_is_bottom_right() {
        let page = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        };
        assert_eq!(default_position(&page, 60.0), (516.0, 36.0));
    }

    #[test]
    fn test_placeholder_position_stays_on_page() {
        let page = PageBox {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        };
        let near_edge = PlaceholderHit {
            page: 0,
            x0: 590.0,
            y0: 770.0,
            x1: 610.0,
            y1: 782.0,
        };
        assert_eq!(placeholder_position(&page, &near_edge, 60.0), (552.0, 0.0));

        let inside = PlaceholderHit { x0: 100.0, y0: 100.0, ..near_edge };
        assert_eq!(placeholder_position(&page, &inside, 60.0), (100.0, 632.0));
    }
}
