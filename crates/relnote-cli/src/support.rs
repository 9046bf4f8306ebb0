use crate::config::RelnoteConfig;
use relnote_store::{
    Checklist, FieldKind, FieldValue, FieldValues, RecordSchema, StoreError, StoreParser,
    StoreSnapshot, decode_checklist,
};
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn load_config_or_exit(path: Option<&Path>) -> RelnoteConfig {
    RelnoteConfig::load(path).unwrap_or_else(|e| fail(e))
}

pub fn schema_or_exit(config: &RelnoteConfig, name: Option<&str>) -> RecordSchema {
    config.schema(name).unwrap_or_else(|e| fail(e))
}

pub fn parse_file_or_exit(schema: &RecordSchema, path: &Path) -> StoreSnapshot {
    StoreParser::new(schema)
        .parse_path(path)
        .unwrap_or_else(|e| fail(e))
}

pub fn store_op_or_exit<T>(result: Result<T, StoreError>) -> T {
    result.unwrap_or_else(|e| fail(e))
}

/// Read a payload file, or stdin for `-` / no path.
pub fn read_payload_or_exit(path: Option<&Path>) -> String {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("failed to read payload {}: {e}", path.display()))),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .unwrap_or_else(|e| fail(format!("failed to read payload from stdin: {e}")));
            text
        }
    }
}

/// Decode repeated `name=value` assignments against `schema`.
///
/// Repeating a text field appends a line; repeating a checklist adds items.
pub fn parse_field_assignments(
    schema: &RecordSchema,
    assignments: &[String],
) -> Result<FieldValues, String> {
    let mut values = FieldValues::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("field assignment must be NAME=VALUE, got `{assignment}`"))?;
        let name = name.trim();
        let spec = schema.field(name).ok_or_else(|| {
            format!("schema `{}` has no field named `{name}`", schema.name)
        })?;
        match spec.kind {
            FieldKind::Checklist => {
                let items = decode_checklist(&value.replace(';', "\n"));
                let entry = values
                    .entry(name.to_string())
                    .or_insert_with(|| FieldValue::Checklist(Checklist::new()));
                if let FieldValue::Checklist(existing) = entry {
                    existing.extend(items);
                }
            }
            FieldKind::Line | FieldKind::Text => {
                let entry = values
                    .entry(name.to_string())
                    .or_insert_with(|| FieldValue::Text(String::new()));
                if let FieldValue::Text(existing) = entry {
                    if !existing.is_empty() {
                        existing.push('\n');
                    }
                    existing.push_str(value);
                }
            }
        }
    }
    Ok(values)
}

pub fn field_assignments_or_exit(schema: &RecordSchema, assignments: &[String]) -> FieldValues {
    parse_field_assignments(schema, assignments).unwrap_or_else(|e| fail(e))
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}

/// Rendered payload written under the scratch dir; removed on drop.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn create(dir: &Path, content: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or(0);
        let path = dir.join(format!(
            "relnote-payload-{}-{unique}.txt",
            std::process::id()
        ));
        fs::write(&path, content)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_assignments_follow_schema_kinds() {
        let schema = RecordSchema::release_note();
        let values = parse_field_assignments(
            &schema,
            &[
                "title=Faster search".to_string(),
                "description=Index rebuilt".to_string(),
                "description=every night.".to_string(),
                "affected=[x] Server: restart;[ ] Client".to_string(),
            ],
        )
        .expect("assignments should decode");

        assert_eq!(
            values.get("description").and_then(FieldValue::as_text),
            Some("Index rebuilt\nevery night.")
        );
        let affected = values
            .get("affected")
            .and_then(FieldValue::as_checklist)
            .expect("checklist");
        assert!(affected["Server"].checked);
        assert_eq!(affected["Server"].value.as_deref(), Some("restart"));
        assert!(!affected["Client"].checked);

        let rendered = schema.render(&values);
        assert_eq!(
            rendered,
            "Title: Faster search\nDescription:\n    Index rebuilt\n    every night.\nAffected:\n    [x] Server: restart\n    [ ] Client"
        );
    }

    #[test]
    fn field_assignments_reject_unknown_fields() {
        let schema = RecordSchema::release_note();
        let err = parse_field_assignments(&schema, &["colour=blue".to_string()])
            .expect_err("unknown field");
        assert!(err.contains("colour"));
        assert!(parse_field_assignments(&schema, &["title".to_string()]).is_err());
    }
}
