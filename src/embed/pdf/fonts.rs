//! Glyph advance widths for locating and redacting text
//! Author: kartik4091

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicode;

/// Helvetica advance widths for WinAnsi codes 32..=126, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const DEFAULT_WIDTH: f32 = 500.0;
const COURIER_WIDTH: f32 = 600.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// Width of one byte in Helvetica, in 1/1000 em
pub fn helvetica_width(code: u8) -> f32 {
    match code {
        32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as f32,
        _ => DEFAULT_WIDTH + 56.0,
    }
}

/// Width of `text` set in Helvetica at `size` points
pub fn helvetica_text_width(text: &[u8], size: f32) -> f32 {
    text.iter().map(|b| helvetica_width(*b)).sum::<f32>() * size / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Builtin {
    Helvetica,
    Courier,
    Unknown,
}

/// Advance widths and text decoding of one font resource
#[derive(Debug, Clone)]
pub struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    missing_width: f32,
    builtin: Builtin,
    /// Type0 font: multi-byte codes, widths by CID
    composite: bool,
    cid_widths: HashMap<u32, f32>,
    default_cid_width: f32,
    to_unicode: ToUnicode,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::fallback()
    }
}

impl FontMetrics {
    pub fn fallback() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            missing_width: 0.0,
            builtin: Builtin::Unknown,
            composite: false,
            cid_widths: HashMap::new(),
            default_cid_width: DEFAULT_CID_WIDTH,
            to_unicode: ToUnicode::default(),
        }
    }

    fn from_font(doc: &Document, font: &Dictionary) -> Self {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| match o {
                Object::Name(n) => Some(String::from_utf8_lossy(n).to_ascii_lowercase()),
                _ => None,
            })
            .unwrap_or_default();
        let builtin = if base_font.contains("courier") {
            Builtin::Courier
        } else if base_font.contains("helvetica") || base_font.contains("arial") {
            Builtin::Helvetica
        } else {
            Builtin::Unknown
        };
        let composite = matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type0");

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .map(|v| v as i64)
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| match o {
                Object::Array(items) => Some(
                    items
                        .iter()
                        .map(|item| number(resolve(doc, item)).unwrap_or(0.0))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();
        let missing_width = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| match resolve(doc, o) {
                Object::Dictionary(d) => d.get(b"MissingWidth").ok().and_then(|w| number(resolve(doc, w))),
                _ => None,
            })
            .unwrap_or(0.0);

        let descendant = if composite { descendant_font(doc, font) } else { None };
        let default_cid_width = descendant
            .and_then(|d| d.get(b"DW").ok())
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(DEFAULT_CID_WIDTH);
        let cid_widths = match descendant.and_then(|d| d.get(b"W").ok()).map(|o| resolve(doc, o)) {
            Some(Object::Array(items)) => parse_cid_widths(doc, items),
            _ => HashMap::new(),
        };
        let to_unicode = match font.get(b"ToUnicode").ok().map(|o| resolve(doc, o)) {
            Some(Object::Stream(stream)) => {
                let data = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                ToUnicode::parse(&data)
            }
            _ => ToUnicode::default(),
        };

        Self {
            first_char,
            widths,
            missing_width,
            builtin,
            composite,
            cid_widths,
            default_cid_width,
            to_unicode,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Splits shown string bytes into character codes and their byte lengths.
    /// Simple fonts are always single-byte; Type0 fonts follow the ToUnicode
    /// codespace and default to two bytes.
    pub fn codes(&self, data: &[u8]) -> Vec<(u32, usize)> {
        if self.composite {
            self.to_unicode.split(data, 2)
        } else {
            data.iter().map(|b| (*b as u32, 1)).collect()
        }
    }

    /// Text a code stands for. Without a ToUnicode entry, simple fonts read
    /// as Latin-1 and composite codes as Unicode scalars (Identity mappings).
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.lookup(code) {
            return text.to_string();
        }
        if !self.composite {
            return char::from(code as u8).to_string();
        }
        char::from_u32(code)
            .filter(|c| !c.is_control())
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string()
    }

    /// Advance of one code, in 1/1000 text space units
    pub fn width(&self, code: u32) -> f32 {
        if self.composite {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_cid_width);
        }
        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(w) = self.widths.get(index as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        if self.missing_width > 0.0 {
            return self.missing_width;
        }
        match self.builtin {
            Builtin::Helvetica => helvetica_width(code.min(255) as u8),
            Builtin::Courier => COURIER_WIDTH,
            Builtin::Unknown => DEFAULT_WIDTH,
        }
    }
}

fn descendant_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    match resolve(doc, font.get(b"DescendantFonts").ok()?) {
        Object::Array(items) => match resolve(doc, items.first()?) {
            Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

/// `/W` entries: `c [w1 w2 ...]` or `c_first c_last w`
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])).map(|v| v as u32) else {
            break;
        };
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(other) => {
                let last = number(other).map(|v| v as u32);
                let w = items.get(i + 2).and_then(|o| number(resolve(doc, o)));
                let (Some(last), Some(w)) = (last, w) else {
                    break;
                };
                for cid in (first..=last).take(0x10000) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Metrics for every font resource of a page, keyed by resource name
#[derive(Debug, Clone, Default)]
pub struct FontTable {
    fonts: HashMap<Vec<u8>, FontMetrics>,
    fallback: FontMetrics,
}

impl FontTable {
    pub fn from_resources(doc: &Document, resources: &Dictionary) -> Self {
        let mut fonts = HashMap::new();
        if let Ok(font_dict) = resources.get(b"Font") {
            if let Object::Dictionary(font_dict) = resolve(doc, font_dict) {
                for (name, font) in font_dict.iter() {
                    if let Object::Dictionary(font) = resolve(doc, font) {
                        fonts.insert(name.clone(), FontMetrics::from_font(doc, font));
                    }
                }
            }
        }
        Self {
            fonts,
            fallback: FontMetrics::fallback(),
        }
    }

    pub fn get(&self, name: &[u8]) -> &FontMetrics {
        self.fonts.get(name).unwrap_or(&self.fallback)
    }
}

/// Follows one level of indirection
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Numeric operand as f32
pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_helvetica_metrics() {
        assert_eq!(helvetica_width(b' '), 278.0);
        assert_eq!(helvetica_width(b'W'), 944.0);
        assert_eq!(helvetica_width(b'~'), 584.0);
        assert_eq!(helvetica_text_width(b"{{QR}}", 10.0), (334.0 * 2.0 + 778.0 + 722.0 + 334.0 * 2.0) / 100.0);
    }

    #[test]
    fn test_widths_array_wins_over_builtin() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 65,
            "Widths" => vec![Object::Integer(700), Object::Integer(0)],
        };
        let metrics = FontMetrics::from_font(&doc, &font);
        assert_eq!(metrics.width(b'A' as u32), 700.0);
        // zero width entry falls back to the builtin table
        assert_eq!(metrics.width(b'B' as u32), 667.0);
        assert_eq!(metrics.width(b' ' as u32), 278.0);
    }

    #[test]
    fn test_courier_is_monospaced() {
        let doc = Document::with_version("1.5");
        let font = dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Courier" };
        let metrics = FontMetrics::from_font(&doc, &font);
        assert_eq!(metrics.width(b'i' as u32), 600.0);
        assert_eq!(metrics.width(b'M' as u32), 600.0);
    }

    #[test]
    fn test_type0_font_uses_cid_widths_and_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = lopdf::Stream::new(
            dictionary! {},
            b"1 begincodespacerange <0000> <FFFF> endcodespacerange\n1 beginbfchar <0005> <007B> endbfchar".to_vec(),
        );
        let cmap_id = doc.add_object(cmap);
        let descendant = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 900,
            "W" => vec![
                Object::Integer(5),
                Object::Array(vec![Object::Integer(320), Object::Integer(640)]),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(250),
            ],
        };
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+NotoSans",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Dictionary(descendant)],
            "ToUnicode" => Object::Reference(cmap_id),
        };
        let metrics = FontMetrics::from_font(&doc, &font);
        assert!(metrics.is_composite());
        assert_eq!(metrics.codes(&[0x00, 0x05, 0x00, 0x0B]), vec![(5, 2), (11, 2)]);
        assert_eq!(metrics.width(5), 320.0);
        assert_eq!(metrics.width(6), 640.0);
        assert_eq!(metrics.width(11), 250.0);
        assert_eq!(metrics.width(99), 900.0);
        assert_eq!(metrics.decode(5), "{");
        // no ToUnicode entry: the code is read as a Unicode scalar
        assert_eq!(metrics.decode(0x51), "Q");
    }

    #[test]
    fn test_simple_font_decodes_latin1() {
        let metrics = FontMetrics::fallback();
        assert_eq!(metrics.codes(b"{Q"), vec![(0x7B, 1), (0x51, 1)]);
        assert_eq!(metrics.decode(0xE9), "é");
    }
}
