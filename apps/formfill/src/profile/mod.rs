//! Free-text profile parsing.
//!
//! A profile is whatever the user typed: some lines are `key：value`, the
//! rest is prose. Key/value lines are extracted, keys are normalized and
//! resolved against the canonical field table, and a standardized mapping
//! block is appended once so later runs over other templates see the same
//! canonical names.

pub mod tables;

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

pub use tables::{CanonicalField, FieldAliases, FieldTables};

/// Heading of the appended block; its presence makes normalization a no-op.
pub const MAPPING_MARKER: &str = "## 标准化资料映射（系统自动生成，用于跨模板复用）";

static KEY_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_\-（）()【】\[\]·.]+").expect("valid key regex"));
static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*•·]+\s*").expect("valid bullet regex"));
static NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)、]\s*").expect("valid numbering regex"));
static DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[：:=]").expect("valid delimiter regex"));

const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」'];

/// A canonical field found in the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileField {
    pub canonical: CanonicalField,
    pub raw_value: String,
    /// `raw_value` with all whitespace removed.
    pub normalized_value: String,
}

/// Whitespace-free right-hand sides of every parsed profile line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitValues(BTreeSet<String>);

impl ExplicitValues {
    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExplicitValues {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| {
                    let s: String = s.into();
                    strip_whitespace(&s)
                })
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProfile {
    /// Profile text handed to the inference service; possibly augmented.
    pub text: String,
    pub fields: Vec<ProfileField>,
    pub explicit_values: ExplicitValues,
}

pub struct ProfileNormalizer<'a> {
    tables: &'a FieldTables,
}

impl<'a> ProfileNormalizer<'a> {
    pub fn new(tables: &'a FieldTables) -> Self {
        Self { tables }
    }

    pub fn normalize(&self, profile: &str) -> NormalizedProfile {
        let pairs = self.extract_pairs(profile);
        let fields = self.canonical_fields(&pairs);

        let text = if profile.is_empty() || profile.contains(MAPPING_MARKER) || fields.is_empty() {
            profile.to_string()
        } else {
            let mut text = profile.trim_end().to_string();
            text.push_str("\n\n");
            text.push_str(MAPPING_MARKER);
            for field in &fields {
                text.push('\n');
                text.push_str(field.canonical.label());
                text.push('：');
                text.push_str(&field.raw_value);
            }
            text
        };

        // The appended block only repeats values already present, so the
        // explicit set is the same whether it is read before or after.
        let explicit_values = pairs.into_values().collect();

        debug!(
            canonical_fields = fields.len(),
            augmented = text.len() != profile.len(),
            "Normalized profile"
        );

        NormalizedProfile {
            text,
            fields,
            explicit_values,
        }
    }

    /// Lowercases and strips punctuation and noise tokens from a key.
    pub fn normalize_key(&self, key: &str) -> String {
        let mut cleaned = KEY_PUNCTUATION.replace_all(key, "").to_lowercase();
        for token in &self.tables.noise_tokens {
            cleaned = cleaned.replace(token.as_str(), "");
        }
        cleaned.trim().to_string()
    }

    /// Normalized key → value for every key/value line, first occurrence
    /// winning.
    fn extract_pairs(&self, profile: &str) -> HashMap<String, String> {
        let mut pairs = HashMap::new();
        for line in profile.lines() {
            let Some((key, value)) = split_line(line) else {
                continue;
            };
            let key = self.normalize_key(key);
            if !key.is_empty() {
                pairs.entry(key).or_insert_with(|| value.to_string());
            }
        }
        pairs
    }

    fn canonical_fields(&self, pairs: &HashMap<String, String>) -> Vec<ProfileField> {
        self.tables
            .fields
            .iter()
            .filter_map(|entry| {
                let value = entry
                    .candidates()
                    .find_map(|candidate| pairs.get(&self.normalize_key(candidate)))?;
                Some(ProfileField {
                    canonical: entry.field,
                    raw_value: value.clone(),
                    normalized_value: strip_whitespace(value),
                })
            })
            .collect()
    }
}

/// Splits one profile line into key and value, or `None` when it is not a
/// key/value line.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let line = match BULLET_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    let line = match NUMBER_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };

    let delimiter = DELIMITER.find(line)?;
    let key = line[..delimiter.start()].trim();
    let value = line[delimiter.end()..].trim().trim_matches(QUOTES);
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Decodes profile bytes once at the boundary: UTF-8 (lossy), BOM removed.
pub fn profile_text_from_bytes(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = &decoded;
    text.strip_prefix('\u{feff}').unwrap_or(text).to_string()
}
