use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder identifier, written into the template as `{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(u32);

impl Tag {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Reads a key as returned by the inference service.
    ///
    /// A bare number (`"3"`) is wrapped into tag syntax first. Anything that
    /// is not exactly `{digits}` afterwards is rejected.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        let inner = match key.strip_prefix('{') {
            Some(rest) => rest.strip_suffix('}')?,
            None => key,
        };
        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        inner.parse().ok().map(Self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Tag::from_key(&raw)
            .ok_or_else(|| de::Error::custom(format!("'{raw}' is not a placeholder tag")))
    }
}

/// Position of a table cell, 1-based for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLocation {
    pub table: usize,
    pub row: usize,
    pub column: usize,
}

impl CellLocation {
    /// Builds a location from 0-based indices.
    pub fn from_indices(table: usize, row: usize, column: usize) -> Self {
        Self {
            table: table + 1,
            row: row + 1,
            column: column + 1,
        }
    }

    /// 0-based (table, row, cell) indices for document access.
    pub fn indices(&self) -> (usize, usize, usize) {
        (
            self.table.saturating_sub(1),
            self.row.saturating_sub(1),
            self.column.saturating_sub(1),
        )
    }

    /// Human-readable position used in prompts.
    pub fn describe(&self) -> String {
        format!("表格{}第{}行第{}列", self.table, self.row, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    Text,
    /// An empty cell beside a photo label: the frame the photo goes in.
    Photo,
}

/// One originally-empty table cell found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub tag: Tag,
    pub location: CellLocation,
    /// First-row text of the same column; empty for first-row cells.
    pub header: String,
    pub kind: PlaceholderKind,
}

impl Placeholder {
    /// Label shown to users: the header, or the tag when there is none.
    pub fn label(&self) -> String {
        if self.header.is_empty() {
            self.tag.to_string()
        } else {
            self.header.clone()
        }
    }
}
