//! Template inspection
//! Author: kartik4091
//! Created: 2025-06-07
//!
//! Lists the `{{NAME}}` tokens a template carries so a batch can be checked
//! before any record is processed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::DEFAULT_PLACEHOLDER;
use crate::embed::office::{docx, pptx};
use crate::embed::pdf;
use crate::error::Result;
use crate::types::DocumentFormat;
use crate::utils::is_readable_file;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{[A-Za-z0-9_]+\}\}").expect("literal placeholder pattern"))
}

/// What a template holds and what is wrong with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateReport {
    pub path: PathBuf,
    pub format: DocumentFormat,
    /// Distinct tokens, sorted
    pub placeholders: Vec<String>,
    pub has_qr_marker: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl TemplateReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Distinct `{{NAME}}` tokens in `text`, sorted
pub fn detect_placeholders(text: &str) -> Vec<String> {
    placeholder_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn template_text(path: &Path, format: &DocumentFormat) -> Option<Result<String>> {
    match format {
        DocumentFormat::Pdf => Some(pdf::read_text(path)),
        DocumentFormat::Docx => Some(docx::read_text(path)),
        DocumentFormat::Pptx => Some(pptx::read_text(path)),
        DocumentFormat::Other(_) => None,
    }
}

/// Inspects a template. Problems are collected in the report, never returned.
#[instrument]
pub fn inspect_template(path: &Path) -> TemplateReport {
    let format = DocumentFormat::from_path(path);
    let mut report = TemplateReport {
        path: path.to_path_buf(),
        format: format.clone(),
        placeholders: Vec::new(),
        has_qr_marker: false,
        warnings: Vec::new(),
        errors: Vec::new(),
    };

    if !is_readable_file(path) {
        report.errors.push(format!("Template file does not exist: {}", path.display()));
        return report;
    }

    let text = match template_text(path, &format) {
        None => {
            report.errors.push(format!("Unsupported template format: {}", format));
            return report;
        }
        Some(Err(e)) => {
            report.errors.push(format!("Could not read {} template: {}", format, e));
            return report;
        }
        Some(Ok(text)) => text,
    };

    report.placeholders = detect_placeholders(&text);
    report.has_qr_marker = report.placeholders.iter().any(|p| p == DEFAULT_PLACEHOLDER);
    if report.placeholders.is_empty() {
        warn!("⚠️ No placeholders in {}", path.display());
        report.warnings.push(format!("No placeholders found in the {} template", format));
    } else if !report.has_qr_marker {
        report
            .warnings
            .push(format!("No {} marker; the QR will use the default position", DEFAULT_PLACEHOLDER));
    }
    debug!("Template placeholders: {:?}", report.placeholders);
    report
}
