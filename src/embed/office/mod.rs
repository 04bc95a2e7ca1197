//! DOCX and PPTX embedders
//! Author: kartik4091
//! Created: 2025-06-06

pub mod core_props;
pub mod docx;
pub mod package;
pub mod pptx;
pub mod xml;

pub use docx::DocxHandler;
pub use pptx::PptxHandler;

use self::package::OfficePackage;
use self::xml::Element;
use super::parse_tagged_metadata;

pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const IMAGE_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// Where the placeholder was before it was removed
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Anchor {
    /// Element path of the DOCX paragraph
    Paragraph(Vec<usize>),
    /// Slide index and the offset of the shape's frame, in EMU
    Shape { slide: usize, x: i64, y: i64 },
}

/// Package with placeholders removed, waiting for the QR
pub struct PackageState {
    pub(crate) package: OfficePackage,
    pub(crate) anchor: Option<Anchor>,
}

/// Removes every `marker` occurrence from the text runs of `paragraph`, also
/// when the marker is split across runs. Returns the number removed.
pub fn remove_marker(paragraph: &mut Element, text_tag: &str, marker: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    let preserve = text_tag == "w:t";
    let mut removed = 0;
    loop {
        let paths = paragraph.find_paths(text_tag);
        let texts: Vec<String> = paths
            .iter()
            .map(|p| paragraph.at_path(p).map(Element::own_text).unwrap_or_default())
            .collect();
        let joined = texts.concat();
        let Some(start) = joined.find(marker) else {
            break;
        };
        let end = start + marker.len();

        let mut offset = 0;
        for (path, text) in paths.iter().zip(&texts) {
            let (seg_start, seg_end) = (offset, offset + text.len());
            offset = seg_end;
            let (cut_start, cut_end) = (start.max(seg_start), end.min(seg_end));
            if cut_start >= cut_end {
                continue;
            }
            let mut kept = String::with_capacity(text.len());
            kept.push_str(&text[..cut_start - seg_start]);
            kept.push_str(&text[cut_end - seg_start..]);
            if let Some(run_text) = paragraph.at_path_mut(path) {
                run_text.set_text(&kept);
                if preserve {
                    run_text.set_attr("xml:space", "preserve");
                }
            }
        }
        removed += 1;
    }
    removed
}

/// Text of every paragraph except signature-metadata fallbacks, joined
pub fn visible_text(root: &Element, paragraph_tag: &str, text_tag: &str) -> String {
    root.find_paths(paragraph_tag)
        .iter()
        .filter_map(|p| root.at_path(p))
        .map(|p| p.text_of(text_tag))
        .filter(|t| parse_tagged_metadata(t).is_none())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First tagged fallback paragraph's bundle text
pub fn find_tagged(root: &Element, paragraph_tag: &str, text_tag: &str) -> Option<String> {
    root.find_paths(paragraph_tag)
        .iter()
        .filter_map(|p| root.at_path(p))
        .find_map(|p| parse_tagged_metadata(&p.text_of(text_tag)).map(str::to_string))
}

/// Largest numeric `id` attribute among `tag` elements, plus one
pub fn next_shape_id(root: &Element, tag: &str) -> u32 {
    root.descendants(tag)
        .iter()
        .filter_map(|e| e.attr("id").and_then(|id| id.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1
}

/// Declares `prefix` on the root element when the part does not already
pub fn ensure_namespace(root: &mut Element, prefix: &str, uri: &str) {
    let key = format!("xmlns:{}", prefix);
    if root.attr(&key).is_none() {
        root.set_attr(&key, uri);
    }
}

/// XML-escaped text for markup built with `format!`
pub fn escape_text(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}
