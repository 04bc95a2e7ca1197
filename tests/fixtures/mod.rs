//! Synthesized documents and a shared key pair for integration tests
#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use certseal::config::KeyConfig;
use certseal::crypto::KeyManager;
use certseal::SigningConfig;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const MARKER: &str = "{{QR}}";

const DOCX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const PPTX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const SLIDE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CORE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const OFFICE_DOCUMENT_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const CORE_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";

pub const CORE_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Certificate</dc:title></cp:coreProperties>"#
);

pub const BROKEN_CORE_XML: &str = r#"<cp:coreProperties xmlns:cp="x"><dc:title>Certificate</cp:coreProperties>"#;

/// Text drawn on a PDF page in 12pt Helvetica at a baseline position
pub struct PdfLine<'a> {
    pub text: &'a str,
    pub x: i64,
    pub y: i64,
}

/// ToUnicode CMap of the subset font: CIDs 0x0120..=0x017E stand for U+0020..=U+007E
const SUBSET_TO_UNICODE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Subset-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0120> <017E> <0020>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

/// Offset between a character and its CID in the subset font
const SUBSET_CID_OFFSET: u32 = 0x100;

pub struct TestFixtures;

impl TestFixtures {
    /// Signing configuration whose 2048-bit key pair is generated once per test binary
    pub fn signing_config() -> SigningConfig {
        static SHARED: OnceLock<(TempDir, SigningConfig)> = OnceLock::new();
        let (_, config) = SHARED.get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            let config = Self::config_in(dir.path(), 2048);
            KeyManager::new(config.keys.clone()).ensure().unwrap();
            (dir, config)
        });
        config.clone()
    }

    pub fn config_in(dir: &Path, bits: usize) -> SigningConfig {
        SigningConfig {
            keys: KeyConfig {
                private_key: dir.join("keys").join("private_key.pem"),
                public_key: dir.join("keys").join("public_key.pem"),
                bits,
            },
            ..SigningConfig::default()
        }
    }

    fn text_ops(line: &PdfLine<'_>) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![line.x.into(), line.y.into()]),
            Operation::new("Tj", vec![Object::string_literal(line.text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// One Letter-sized page per entry of `pages`
    pub fn write_pdf(path: &Path, pages: &[&[PdfLine<'_>]]) {
        let pages: Vec<Vec<Operation>> = pages
            .iter()
            .map(|lines| lines.iter().flat_map(Self::text_ops).collect())
            .collect();
        Self::write_pdf_operations(path, &pages);
    }

    /// `BT`, font and position, the given show operators, `ET`
    pub fn text_object(font: &str, x: i64, y: i64, shows: Vec<Operation>) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
        ];
        ops.extend(shows);
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    /// Two-byte codes of `text` in the subset font `F2`
    pub fn subset_codes(text: &str) -> Object {
        let bytes = text
            .chars()
            .flat_map(|c| ((c as u32 + SUBSET_CID_OFFSET) as u16).to_be_bytes())
            .collect();
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    /// Two-byte codes of `text` in `F3`, an Identity-H font whose CIDs equal the characters
    pub fn identity_codes(text: &str) -> Object {
        let bytes = text.chars().flat_map(|c| (c as u16).to_be_bytes()).collect();
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    /// One Letter-sized page per operation list. Fonts: `F1` Helvetica,
    /// `F2` a Type0 subset font with a ToUnicode CMap, `F3` a Type0 Identity-H
    /// font without one.
    pub fn write_pdf_operations(path: &Path, pages: &[Vec<Operation>]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let subset_id = Self::add_type0_font(&mut doc, "ABCDEF+NotoSans", Some(SUBSET_TO_UNICODE));
        let identity_id = Self::add_type0_font(&mut doc, "NotoSans", None);
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id, "F2" => subset_id, "F3" => identity_id },
        });

        let mut kids = Vec::new();
        for operations in pages {
            let content = Content {
                operations: operations.clone(),
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn add_type0_font(doc: &mut Document, base_font: &str, to_unicode: Option<&[u8]>) -> lopdf::ObjectId {
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font,
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "DW" => 600,
        });
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
        };
        if let Some(cmap) = to_unicode {
            let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
            font.set("ToUnicode", Object::Reference(cmap_id));
        }
        doc.add_object(font)
    }

    /// Draws extra body text on the first page, after everything already there
    pub fn append_pdf_text(path: &Path, text: &str) {
        let mut doc = Document::load(path).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content {
            operations: Self::text_ops(&PdfLine { text, x: 72, y: 400 }),
        };
        let stream_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
        let contents = match page.get(b"Contents").unwrap().clone() {
            Object::Array(mut items) => {
                items.push(Object::Reference(stream_id));
                items
            }
            other => vec![other, Object::Reference(stream_id)],
        };
        page.set("Contents", Object::Array(contents));
        doc.save(path).unwrap();
    }

    fn write_zip(path: &Path, parts: &[(String, String)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in parts {
            zip.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn content_types(overrides: &[(&str, &str)]) -> String {
        let mut xml = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#
        ));
        for (part, content_type) in overrides {
            xml.push_str(&format!(r#"<Override PartName="{}" ContentType="{}"/>"#, part, content_type));
        }
        xml.push_str("</Types>");
        xml
    }

    fn package_rels(main_part: &str, with_core: bool) -> String {
        let mut xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                r#"<Relationship Id="rId1" Type="{}" Target="{}"/>"#
            ),
            OFFICE_DOCUMENT_REL, main_part
        );
        if with_core {
            xml.push_str(&format!(
                r#"<Relationship Id="rId2" Type="{}" Target="docProps/core.xml"/>"#,
                CORE_REL
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    /// DOCX with one paragraph per entry; `|` splits a paragraph into runs.
    /// `core` is the core-properties part, if any.
    pub fn write_docx(path: &Path, paragraphs: &[&str], core: Option<&str>) {
        let mut body = String::new();
        for paragraph in paragraphs {
            body.push_str("<w:p>");
            for run in paragraph.split('|') {
                body.push_str(&format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, run));
            }
            body.push_str("</w:p>");
        }
        let document = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                r#"<w:body>{}<w:sectPr/></w:body></w:document>"#
            ),
            body
        );

        let mut overrides = vec![("/word/document.xml", DOCX_CONTENT_TYPE)];
        if core.is_some() {
            overrides.push(("/docProps/core.xml", CORE_CONTENT_TYPE));
        }
        let mut parts = vec![
            ("[Content_Types].xml".to_string(), Self::content_types(&overrides)),
            ("_rels/.rels".to_string(), Self::package_rels("word/document.xml", core.is_some())),
            ("word/document.xml".to_string(), document),
        ];
        if let Some(core) = core {
            parts.push(("docProps/core.xml".to_string(), core.to_string()));
        }
        Self::write_zip(path, &parts);
    }

    /// PPTX with one slide per entry, each a list of `(text, x, y)` text frames in EMU
    pub fn write_pptx(path: &Path, slides: &[&[(&str, i64, i64)]], core: Option<&str>) {
        let mut overrides = vec![("/ppt/presentation.xml".to_string(), PPTX_CONTENT_TYPE)];
        let mut parts = Vec::new();
        for (index, shapes) in slides.iter().enumerate() {
            let mut tree = String::from(
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#,
            );
            for (n, (text, x, y)) in shapes.iter().enumerate() {
                tree.push_str(&format!(
                    concat!(
                        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
                        r#"<p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="1828800" cy="914400"/></a:xfrm></p:spPr>"#,
                        r#"<p:txBody><a:bodyPr/><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
                    ),
                    id = n + 2,
                    x = x,
                    y = y,
                    text = text,
                ));
            }
            let slide = format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
                    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
                    r#"<p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#
                ),
                tree
            );
            let name = format!("ppt/slides/slide{}.xml", index + 1);
            overrides.push((format!("/{}", name), SLIDE_CONTENT_TYPE));
            parts.push((name, slide));
        }
        if core.is_some() {
            overrides.push(("/docProps/core.xml".to_string(), CORE_CONTENT_TYPE));
        }
        let presentation = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#
        );

        let override_refs: Vec<(&str, &str)> = overrides.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        let mut all = vec![
            ("[Content_Types].xml".to_string(), Self::content_types(&override_refs)),
            ("_rels/.rels".to_string(), Self::package_rels("ppt/presentation.xml", core.is_some())),
            ("ppt/presentation.xml".to_string(), presentation.to_string()),
        ];
        all.extend(parts);
        if let Some(core) = core {
            all.push(("docProps/core.xml".to_string(), core.to_string()));
        }
        Self::write_zip(path, &all);
    }

    /// Rewrites one package part with a plain string replacement
    pub fn edit_part(path: &Path, part: &str, from: &str, to: &str) {
        let mut package = certseal::embed::office::package::OfficePackage::open(path).unwrap();
        let text = String::from_utf8(package.get(part).unwrap().to_vec()).unwrap();
        assert!(text.contains(from), "{} not found in {}", from, part);
        package.set(part, text.replace(from, to).into_bytes());
        package.save(path).unwrap();
    }

    pub fn file_in(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }
}
