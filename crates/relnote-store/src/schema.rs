//! Record schemas: statically declared field lists per record type.
//!
//! A schema tells the parser which field titles to keep and how to decode
//! them, and tells the renderer how to lay field values out as record text.

use crate::record::{FieldValue, FieldValues, TextRecord};
use serde::{Deserialize, Serialize};

pub const RELEASE_NOTE_SCHEMA: &str = "release-note";
pub const SUBSCRIBER_SCHEMA: &str = "subscriber";

/// Indent used for continuation lines when rendering.
pub const RENDER_INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single line of text.
    Line,
    /// Free multi-line text.
    Text,
    /// Named boolean flags, each optionally carrying free text.
    Checklist,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Text => "text",
            Self::Checklist => "checklist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key under which the decoded value is stored.
    pub name: String,
    /// Title as written in the file, left of the `:`.
    pub title: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Allowed item names for checklist fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: &str, title: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            kind,
            required: false,
            items: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_items(mut self, items: &[&str]) -> Self {
        self.items = items.iter().map(|item| item.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Delivery/release note entries.
    pub fn release_note() -> Self {
        Self::new(
            RELEASE_NOTE_SCHEMA,
            vec![
                FieldSpec::new("title", "Title", FieldKind::Line).required(),
                FieldSpec::new("issue", "Issue", FieldKind::Line),
                FieldSpec::new("author", "Author", FieldKind::Line).required(),
                FieldSpec::new("description", "Description", FieldKind::Text).required(),
                FieldSpec::new("affected", "Affected", FieldKind::Checklist).with_items(&[
                    "Server",
                    "Client",
                    "Database",
                    "Documentation",
                ]),
                FieldSpec::new("upgrade_notes", "Upgrade Notes", FieldKind::Text),
            ],
        )
    }

    /// Digest subscriber entries.
    pub fn subscriber() -> Self {
        Self::new(
            SUBSCRIBER_SCHEMA,
            vec![
                FieldSpec::new("name", "Name", FieldKind::Line).required(),
                FieldSpec::new("email", "Email", FieldKind::Line).required(),
                FieldSpec::new("frequency", "Frequency", FieldKind::Checklist)
                    .with_items(&["Daily", "Weekly", "Release"]),
            ],
        )
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::release_note(), Self::subscriber()]
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Look up a field by the title written in the file.
    pub fn field_by_title(&self, title: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.title == title)
    }

    /// Required fields that are absent or empty in `record`.
    ///
    /// The parser never calls this; validation is left to callers.
    pub fn missing_required<'a>(&'a self, record: &TextRecord) -> Vec<&'a FieldSpec> {
        self.fields
            .iter()
            .filter(|field| field.required)
            .filter(|field| record.field(&field.name).is_none_or(FieldValue::is_empty))
            .collect()
    }

    /// Lay out field values as record text in schema order.
    ///
    /// Empty values are omitted. Multi-line values and checklists go on
    /// indented lines below a bare `Title:` line; blank lines inside a value
    /// are dropped since they would end the record.
    pub fn render(&self, values: &FieldValues) -> String {
        let mut lines = Vec::new();
        for field in &self.fields {
            let Some(value) = values.get(&field.name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match value {
                FieldValue::Text(text) if field.kind == FieldKind::Line => {
                    let joined = text
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    lines.push(format!("{}: {joined}", field.title));
                }
                FieldValue::Text(text) => {
                    let body: Vec<&str> = text
                        .lines()
                        .map(str::trim_end)
                        .filter(|line| !line.trim().is_empty())
                        .collect();
                    if let [single] = body.as_slice() {
                        lines.push(format!("{}: {}", field.title, single.trim()));
                    } else {
                        lines.push(format!("{}:", field.title));
                        lines.extend(body.iter().map(|line| format!("{RENDER_INDENT}{line}")));
                    }
                }
                FieldValue::Checklist(items) => {
                    lines.push(format!("{}:", field.title));
                    for (name, item) in items {
                        let mark = if item.checked { "[x]" } else { "[ ]" };
                        match item.value.as_deref().map(str::trim) {
                            Some(text) if !text.is_empty() => {
                                lines.push(format!("{RENDER_INDENT}{mark} {name}: {text}"))
                            }
                            _ => lines.push(format!("{RENDER_INDENT}{mark} {name}")),
                        }
                    }
                }
            }
        }
        lines.join("\n")
    }
}

/// Find a schema by name.
pub fn find_schema<'a>(schemas: &'a [RecordSchema], name: &str) -> Option<&'a RecordSchema> {
    schemas.iter().find(|schema| schema.name == name)
}
