use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::placeholder::Tag;

/// Tag → value map. Keys are always valid tags; values are trimmed text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FillMap(BTreeMap<Tag, String>);

impl FillMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from an untyped JSON object.
    ///
    /// Keys that are not tags are dropped. Values go through
    /// [`value_text`]. When two keys normalize to the same tag, the
    /// lowest-sorting key wins (`serde_json::Map` iterates in key order).
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        let mut map = BTreeMap::new();
        for (key, value) in object {
            if let Some(tag) = Tag::from_key(key) {
                map.entry(tag).or_insert_with(|| value_text(value));
            }
        }
        Self(map)
    }

    pub fn insert(&mut self, tag: Tag, value: impl Into<String>) {
        self.0.insert(tag, value.into());
    }

    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.0.get(&tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &str)> {
        self.0.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// Number of entries with a non-empty value.
    pub fn filled_count(&self) -> usize {
        self.0.values().filter(|v| !v.is_empty()).count()
    }
}

impl FromIterator<(Tag, String)> for FillMap {
    fn from_iter<I: IntoIterator<Item = (Tag, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for FillMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_json_object(&object))
    }
}

/// Text of a JSON value as a fill candidate: `null` is empty, strings are
/// trimmed, other scalars use their JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// How a placeholder's final value came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillSource {
    /// Equal to a value the profile states explicitly.
    ExplicitMatch,
    /// Inferred and accepted because it overlaps an explicit value.
    AiInferredAccepted,
    /// Inferred but cleared because nothing in the profile supports it.
    AiInferredRejected,
    /// No value was produced.
    Unfilled,
}

/// Outcome for one placeholder of a fill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    pub tag: Tag,
    pub value: String,
    pub source: FillSource,
}

impl FillResult {
    pub fn is_filled(&self) -> bool {
        !self.value.is_empty()
    }
}
