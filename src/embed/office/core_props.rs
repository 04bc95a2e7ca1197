//! Core properties part: `dc:description` carries the signature bundle
//! Author: kartik4091

use super::package::{add_relationship, OfficePackage, PACKAGE_RELS};
use super::xml::Element;
use crate::error::{EmbedError, Result};

pub const CORE_PART: &str = "docProps/core.xml";
const DESCRIPTION: &str = "dc:description";
const CORE_REL_TYPE: &str = "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const CORE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.core-properties+xml";

const NAMESPACES: [(&str, &str); 5] = [
    ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
    ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
    ("xmlns:dcterms", "http://purl.org/dc/terms/"),
    ("xmlns:dcmitype", "http://purl.org/dc/dcmitype/"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
];

fn core_part_name(package: &OfficePackage) -> Option<String> {
    let rels = package.read_xml(PACKAGE_RELS).ok()?;
    let name = rels
        .elements()
        .find(|r| r.attr("Type") == Some(CORE_REL_TYPE))
        .and_then(|r| r.attr("Target"))
        .map(|t| t.trim_start_matches('/').to_string());
    name
}

/// Stores `comments` in the core properties, creating the part (and its
/// relationship and content-type override) when the package has none.
pub fn write_comments(package: &mut OfficePackage, comments: &str) -> Result<()> {
    let part = core_part_name(package).unwrap_or_else(|| CORE_PART.to_string());
    let mut root = if package.has(&part) {
        package.read_xml(&part)?
    } else {
        if !package.has(PACKAGE_RELS) {
            return Err(EmbedError::MissingPart(PACKAGE_RELS.to_string()).into());
        }
        let mut root = Element::new("cp:coreProperties");
        for (key, value) in NAMESPACES {
            root.set_attr(key, value);
        }
        add_relationship(package, PACKAGE_RELS, CORE_REL_TYPE, &part)?;
        package.ensure_override(&part, CORE_CONTENT_TYPE)?;
        root
    };

    if root.attr("xmlns:dc").is_none() {
        root.set_attr("xmlns:dc", NAMESPACES[1].1);
    }
    root.ensure_child(DESCRIPTION).set_text(comments);
    package.write_xml(&part, &root);
    Ok(())
}

/// The `dc:description` text, if the package has one
pub fn read_comments(package: &OfficePackage) -> Result<Option<String>> {
    let part = core_part_name(package).unwrap_or_else(|| CORE_PART.to_string());
    if !package.has(&part) {
        return Ok(None);
    }
    let root = package.read_xml(&part)?;
    Ok(root
        .child(DESCRIPTION)
        .map(|d| d.own_text())
        .filter(|t| !t.trim().is_empty()))
}
