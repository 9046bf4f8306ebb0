//! TextRecord: one parsed record plus its provenance in the source file.

use crate::digest::RecordDigest;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One entry of a checklist field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ChecklistItem {
    pub fn new(checked: bool, value: Option<String>) -> Self {
        Self { checked, value }
    }
}

/// Checklist items keyed by item name, in file order.
pub type Checklist = IndexMap<String, ChecklistItem>;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// One-line or multi-line text.
    Text(String),
    Checklist(Checklist),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Checklist(_) => None,
        }
    }

    pub fn as_checklist(&self) -> Option<&Checklist> {
        match self {
            Self::Checklist(items) => Some(items),
            Self::Text(_) => None,
        }
    }

    /// True for empty text or a checklist with no items.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Checklist(items) => items.is_empty(),
        }
    }
}

/// Field values keyed by schema field name.
pub type FieldValues = IndexMap<String, FieldValue>;

/// A record parsed out of a store file.
///
/// `first_line`/`line_count` locate the record in the exact file snapshot
/// that produced it and are meaningless against any other snapshot.
/// The digest is derived from `raw_text` on construction and cannot be set
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    group: String,
    raw_text: String,
    first_line: usize,
    line_count: usize,
    digest: RecordDigest,
    fields: FieldValues,
}

impl TextRecord {
    pub fn new(
        group: impl Into<String>,
        raw_text: impl Into<String>,
        first_line: usize,
        fields: FieldValues,
    ) -> Self {
        let raw_text = raw_text.into();
        let line_count = raw_text.matches('\n').count() + 1;
        let digest = RecordDigest::of(&raw_text);
        Self {
            group: group.into(),
            raw_text,
            first_line,
            line_count,
            digest,
            fields,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Zero-based line where the record starts.
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Half-open zero-based line span `[first_line, first_line + line_count)`.
    pub fn line_range(&self) -> Range<usize> {
        self.first_line..self.first_line + self.line_count
    }

    pub fn digest(&self) -> &RecordDigest {
        &self.digest
    }

    pub fn fields(&self) -> &FieldValues {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }

    pub fn checklist(&self, name: &str) -> Option<&Checklist> {
        self.field(name).and_then(FieldValue::as_checklist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_follows_newlines() {
        let record = TextRecord::new("g", "Title: a\nAuthor: b\n  more", 4, FieldValues::new());
        assert_eq!(record.line_count(), 3);
        assert_eq!(record.line_range(), 4..7);
    }

    #[test]
    fn digest_is_derived_from_raw_text() {
        let record = TextRecord::new("g", "Title: a", 0, FieldValues::new());
        assert_eq!(record.digest(), &RecordDigest::of("Title: a"));
    }

    #[test]
    fn typed_field_accessors() {
        let mut fields = FieldValues::new();
        fields.insert("title".to_string(), FieldValue::Text("Fix".to_string()));
        let mut items = Checklist::new();
        items.insert("Server".to_string(), ChecklistItem::new(true, None));
        fields.insert("affected".to_string(), FieldValue::Checklist(items));

        let record = TextRecord::new("g", "Title: Fix", 0, fields);
        assert_eq!(record.text("title"), Some("Fix"));
        assert_eq!(record.text("affected"), None);
        assert!(record.checklist("affected").is_some_and(|c| c["Server"].checked));
        assert!(record.field("missing").is_none());
    }
}
