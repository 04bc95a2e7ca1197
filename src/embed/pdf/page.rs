//! Page-level access: content, inherited attributes, resources
//! Author: kartik4091

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::fonts::{number, resolve};
use crate::error::{Error, Result};

const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page box in bottom-up user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }
}

fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    match doc.get_object(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::malformed(format!("page {:?} is not a dictionary", page_id))),
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    match doc.get_object_mut(page_id)? {
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(Error::malformed(format!("page {:?} is not a dictionary", page_id))),
    }
}

/// Looks `key` up on the page, then along its `/Parent` chain
pub fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_dict(doc, page_id).ok()?;
    // page trees are shallow; the bound stops reference cycles
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value).clone());
        }
        let parent = match current.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        current = match doc.get_object(parent) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return None,
        };
    }
    None
}

pub fn media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let values: Vec<f32> = match inherited(doc, page_id, b"MediaBox") {
        Some(Object::Array(items)) => items.iter().filter_map(|o| number(resolve(doc, o))).collect(),
        _ => Vec::new(),
    };
    let [a, b, c, d] = if values.len() == 4 {
        [values[0], values[1], values[2], values[3]]
    } else {
        LETTER
    };
    PageBox {
        llx: a.min(c),
        lly: b.min(d),
        urx: a.max(c),
        ury: b.max(d),
    }
}

/// Effective resource dictionary of a page, indirections resolved one level
pub fn resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    }
}

pub fn operations(doc: &Document, page_id: ObjectId) -> Result<Vec<Operation>> {
    let content = doc.get_page_content(page_id)?;
    Ok(Content::decode(&content)?.operations)
}

pub fn encode(operations: Vec<Operation>) -> Result<Vec<u8>> {
    let mut bytes = b"\n".to_vec();
    bytes.extend(Content { operations }.encode()?);
    bytes.push(b'\n');
    Ok(bytes)
}

/// Zlib-compresses `data` into a `/FlateDecode` stream
pub fn flate_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    Ok(Stream::new(dict, compressed))
}

/// Replaces every content stream of the page with `content`
pub fn replace_content(doc: &mut Document, page_id: ObjectId, content: &[u8]) -> Result<()> {
    let stream_id = doc.add_object(flate_stream(Dictionary::new(), content)?);
    page_dict_mut(doc, page_id)?.set("Contents", Object::Reference(stream_id));
    Ok(())
}

fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    Ok(match page_dict(doc, page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

/// Isolates the existing content in `q`/`Q` and appends `overlay` after it
pub fn wrap_content(doc: &mut Document, page_id: ObjectId, overlay: &[u8]) -> Result<()> {
    let existing = content_refs(doc, page_id)?;
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"\nQ\n".to_vec();
    closing.extend_from_slice(overlay);
    let close_id = doc.add_object(flate_stream(Dictionary::new(), &closing)?);

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));
    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Adds `name` to the page's `category` resources (Font, XObject, ExtGState).
/// The page gets its own inline copy so other pages sharing resources are unaffected.
pub fn add_resource(doc: &mut Document, page_id: ObjectId, category: &str, name: &str, value: Object) -> Result<()> {
    let mut resources = resources(doc, page_id);
    let mut entries = match resources.get(category.as_bytes()) {
        Ok(object) => match resolve(doc, object) {
            Object::Dictionary(dict) => dict.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };
    entries.set(name, value);
    resources.set(category, Object::Dictionary(entries));
    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Standard Helvetica with WinAnsi encoding
pub fn standard_font(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Constant-alpha graphics state for fills and strokes
pub fn opacity_state(alpha: f32) -> Dictionary {
    dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(alpha.into()),
        "CA" => Object::Real(alpha.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_page(media_box: Option<Vec<Object>>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(mb) = media_box.clone() {
            page.set("MediaBox", mb);
        }
        let page_id = doc.add_object(page);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! { "Font" => dictionary! {} },
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn test_media_box_is_inherited() {
        let (doc, page_id) = one_page(None);
        let mb = media_box(&doc, page_id);
        assert_eq!((mb.width(), mb.height()), (595.0, 842.0));
    }

    #[test]
    fn test_page_media_box_wins() {
        let (doc, page_id) = one_page(Some(vec![0.into(), 0.into(), 300.into(), 400.into()]));
        assert_eq!(media_box(&doc, page_id).height(), 400.0);
    }

    #[test]
    fn test_wrap_content_brackets_original() {
        let (mut doc, page_id) = one_page(None);
        wrap_content(&mut doc, page_id, b"\nBT ET\n").unwrap();
        let ops = operations(&doc, page_id).unwrap();
        let names: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "BT", "ET", "Q", "BT", "ET"]);
    }

    #[test]
    fn test_add_resource_copies_inherited_dictionary() {
        let (mut doc, page_id) = one_page(None);
        add_resource(&mut doc, page_id, "Font", "CsHelv", Object::Dictionary(standard_font("Helvetica"))).unwrap();
        let res = resources(&doc, page_id);
        let Ok(Object::Dictionary(fonts)) = res.get(b"Font") else {
            panic!("font resources missing");
        };
        assert!(fonts.has(b"CsHelv"));
    }
}
