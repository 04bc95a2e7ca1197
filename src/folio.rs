//! Folio codes for certificates
//! Author: kartik4091
//!
//! Patterns mix literal text with tokens: `{counter}`, `{counter:06d}`,
//! `{random}`, `{date}` and `{<field>}` for any record field holding a string.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Local;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::types::CertificateRecord;

pub const DEFAULT_PATTERN: &str = "RALLY-{counter:06d}";

const RANDOM_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RANDOM_LEN: usize = 6;
const FIELD_MAX_CHARS: usize = 10;

fn folio_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^[\w-]{3,50}$").expect("literal folio pattern"))
}

fn component_parts() -> &'static [Regex; 3] {
    static PARTS: OnceLock<[Regex; 3]> = OnceLock::new();
    PARTS.get_or_init(|| {
        [
            Regex::new(r"\d+").expect("literal digit pattern"),
            Regex::new(r"[A-Za-z]+").expect("literal letter pattern"),
            Regex::new(r"[^A-Za-z0-9]").expect("literal separator pattern"),
        ]
    })
}

/// Pieces of a folio, for display and search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolioComponents {
    pub original: String,
    pub numeric_part: String,
    pub alpha_part: String,
    pub separator: String,
}

/// Issues folios from patterns with a per-session counter
#[derive(Debug, Default)]
pub struct FolioManager {
    counter: u64,
    issued: HashSet<String>,
}

impl FolioManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_counter(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Expands `pattern` against `fields`. An expansion that cleans down to
    /// nothing falls back to the default pattern.
    pub fn generate(&mut self, fields: &CertificateRecord, pattern: &str) -> String {
        let mut folio = pattern.to_string();

        for (key, value) in fields {
            let Value::String(text) = value else {
                continue;
            };
            let token = format!("{{{}}}", key);
            if !folio.contains(&token) {
                continue;
            }
            let key_lower = key.to_lowercase();
            let replacement = if key_lower.contains("initials") || key_lower.contains("name") || key_lower.contains("nombre") {
                initials(text)
            } else {
                text.chars().take(FIELD_MAX_CHARS).collect()
            };
            folio = folio.replace(&token, &replacement);
        }

        if folio.contains("{counter}") {
            let n = self.next_counter();
            folio = folio.replace("{counter}", &n.to_string());
        }
        if folio.contains("{counter:06d}") {
            let n = self.next_counter();
            folio = folio.replace("{counter:06d}", &format!("{:06}", n));
        }
        if folio.contains("{random}") {
            folio = folio.replace("{random}", &random_code());
        }
        if folio.contains("{date}") {
            folio = folio.replace("{date}", &Local::now().format("%Y%m%d").to_string());
        }

        let mut cleaned = clean(&folio);
        if cleaned.is_empty() {
            let n = self.next_counter();
            cleaned = format!("RALLY-{:06}", n);
            debug!("Folio pattern {:?} produced nothing; using {}", pattern, cleaned);
        }
        self.issued.insert(cleaned.clone());
        cleaned
    }

    /// Whether this session already issued `folio`
    pub fn is_issued(&self, folio: &str) -> bool {
        self.issued.contains(folio)
    }

    /// 3 to 50 word characters or hyphens
    pub fn validate(folio: &str) -> bool {
        folio_shape().is_match(folio)
    }

    pub fn components(folio: &str) -> FolioComponents {
        let [digits, letters, separators] = component_parts();
        let first = |re: &Regex| re.find(folio).map(|m| m.as_str().to_string()).unwrap_or_default();
        FolioComponents {
            original: folio.to_string(),
            numeric_part: first(digits),
            alpha_part: first(letters),
            separator: first(separators),
        }
    }
}

/// Upper-case initials of the first two words
fn initials(text: &str) -> String {
    text.split_whitespace()
        .take(2)
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_LEN)
        .map(|_| RANDOM_ALPHABET[rng.gen_range(0..RANDOM_ALPHABET.len())] as char)
        .collect()
}

/// Keeps `[A-Za-z0-9_-]`, upper-cased
fn clean(folio: &str) -> String {
    folio
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CertificateRecord {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_default_pattern_counts_up() {
        let mut manager = FolioManager::new();
        let fields = CertificateRecord::new();
        assert_eq!(manager.generate(&fields, DEFAULT_PATTERN), "RALLY-000001");
        assert_eq!(manager.generate(&fields, DEFAULT_PATTERN), "RALLY-000002");
        assert!(manager.is_issued("RALLY-000002"));
    }

    #[test]
    fn test_field_tokens() {
        let mut manager = FolioManager::new();
        let fields = record(json!({"name": "ana maria lopez", "event": "Rally Internacional 2025"}));
        let folio = manager.generate(&fields, "{event}-{name}-{counter}");
        assert_eq!(folio, "RALLYINTE-AM-1");
    }

    #[test]
    fn test_random_and_date_tokens() {
        let mut manager = FolioManager::new();
        let folio = manager.generate(&CertificateRecord::new(), "X-{random}-{date}");
        assert_eq!(folio.len(), 2 + RANDOM_LEN + 1 + 8);
        assert!(FolioManager::validate(&folio));
    }

    #[test]
    fn test_empty_expansion_falls_back() {
        let mut manager = FolioManager::new();
        assert_eq!(manager.generate(&CertificateRecord::new(), "***"), "RALLY-000001");
    }

    #[test]
    fn test_validate() {
        assert!(FolioManager::validate("AB-12"));
        assert!(!FolioManager::validate("AB"));
        assert!(!FolioManager::validate("AB 12"));
        assert!(!FolioManager::validate(&"A".repeat(51)));
    }

    #[test]
    fn test_components() {
        let parts = FolioManager::components("RALLY-000042");
        assert_eq!(parts.numeric_part, "000042");
        assert_eq!(parts.alpha_part, "RALLY");
        assert_eq!(parts.separator, "-");
    }
}
