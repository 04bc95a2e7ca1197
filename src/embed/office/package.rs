//! Office Open XML package access
//! Author: kartik4091

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::Element;
use crate::error::{EmbedError, Result};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const PACKAGE_RELS: &str = "_rels/.rels";

const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    directory: bool,
}

/// Every part of a package held in memory, in archive order
#[derive(Debug, Clone, Default)]
pub struct OfficePackage {
    entries: Vec<Entry>,
}

impl OfficePackage {
    pub fn open(path: &Path) -> Result<Self> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                directory: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    /// Writes every part back, preserving order
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = ZipWriter::new(File::create(path)?);
        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.directory {
                writer.add_directory(entry.name.clone(), options)?;
            } else {
                writer.start_file(entry.name.clone(), options)?;
                writer.write_all(&entry.data)?;
            }
        }
        writer.finish()?;
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.data.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|e| !e.directory).map(|e| e.name.as_str())
    }

    /// Replaces a part, or appends it when new
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(Entry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                directory: false,
            }),
        }
    }

    pub fn read_xml(&self, name: &str) -> Result<Element> {
        let data = self
            .get(name)
            .ok_or_else(|| EmbedError::MissingPart(name.to_string()))?;
        Element::parse(data)
    }

    pub fn write_xml(&mut self, name: &str, root: &Element) {
        self.set(name, root.to_xml());
    }

    /// A part name not yet used, derived from `stem` and `ext`
    pub fn unique_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        let mut candidate = format!("{}{}.{}", dir, stem, ext);
        let mut n = 1;
        while self.has(&candidate) {
            candidate = format!("{}{}{}.{}", dir, stem, n, ext);
            n += 1;
        }
        candidate
    }

    /// Makes sure `[Content_Types].xml` maps `ext` to `content_type`
    pub fn ensure_default_content_type(&mut self, ext: &str, content_type: &str) -> Result<()> {
        let mut types = self.read_xml(CONTENT_TYPES)?;
        let known = types
            .elements()
            .any(|e| e.local_name() == "Default" && e.attr("Extension").map(|x| x.eq_ignore_ascii_case(ext)) == Some(true));
        if !known {
            let mut default = Element::new("Default");
            default.set_attr("Extension", ext);
            default.set_attr("ContentType", content_type);
            types.children.insert(0, super::xml::Node::Element(default));
            self.write_xml(CONTENT_TYPES, &types);
        }
        Ok(())
    }

    pub fn ensure_override(&mut self, part: &str, content_type: &str) -> Result<()> {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        let mut types = self.read_xml(CONTENT_TYPES)?;
        let known = types
            .elements()
            .any(|e| e.local_name() == "Override" && e.attr("PartName") == Some(part_name.as_str()));
        if !known {
            let mut element = Element::new("Override");
            element.set_attr("PartName", &part_name);
            element.set_attr("ContentType", content_type);
            types.push(element);
            self.write_xml(CONTENT_TYPES, &types);
        }
        Ok(())
    }
}

/// Relationships part of `part`: `word/document.xml` → `word/_rels/document.xml.rels`
pub fn rels_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Adds a relationship with a fresh `rIdN` identifier and returns it.
/// Creates the relationships part when missing.
pub fn add_relationship(package: &mut OfficePackage, rels_part: &str, rel_type: &str, target: &str) -> Result<String> {
    let mut rels = if package.has(rels_part) {
        package.read_xml(rels_part)?
    } else {
        let mut root = Element::new("Relationships");
        root.set_attr("xmlns", RELS_NAMESPACE);
        root
    };

    let taken: Vec<String> = rels
        .elements()
        .filter_map(|e| e.attr("Id").map(str::to_string))
        .collect();
    let mut n = taken.len() + 1;
    while taken.iter().any(|id| *id == format!("rId{}", n)) {
        n += 1;
    }
    let id = format!("rId{}", n);

    let mut relationship = Element::new("Relationship");
    relationship.set_attr("Id", &id);
    relationship.set_attr("Type", rel_type);
    relationship.set_attr("Target", target);
    rels.push(relationship);
    package.write_xml(rels_part, &rels);
    Ok(id)
}
