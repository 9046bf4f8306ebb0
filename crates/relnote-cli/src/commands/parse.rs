use crate::config::RelnoteConfig;
use crate::support::{parse_file_or_exit, print_json, schema_or_exit};
use relnote_store::{RecordSchema, TextRecord};
use serde_json::{Value, json};
use std::path::PathBuf;

pub fn run(file: PathBuf, schema: Option<String>, config: &RelnoteConfig, json_output: bool) {
    let schema = schema_or_exit(config, schema.as_deref());
    let snapshot = parse_file_or_exit(&schema, &file);

    if json_output {
        let groups = snapshot
            .groups()
            .iter()
            .map(|(name, records)| {
                json!({
                    "name": name,
                    "records": records
                        .iter()
                        .map(|record| record_json(&schema, record))
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        print_json(&json!({
            "action": "parse",
            "path": file.display().to_string(),
            "schema": schema.name,
            "groupCount": snapshot.group_count(),
            "recordCount": snapshot.len(),
            "groups": groups
        }));
        return;
    }

    println!(
        "relnote parse\n  Path: {}\n  Schema: {}\n  Groups: {}\n  Records: {}",
        file.display(),
        schema.name,
        snapshot.group_count(),
        snapshot.len()
    );
    for (name, records) in snapshot.groups() {
        println!("[{name}] {} record(s)", records.len());
        for record in records {
            let range = record.line_range();
            let label = record
                .text("title")
                .or_else(|| record.raw_text().lines().next())
                .unwrap_or_default();
            println!(
                "  - {} lines {}-{} {label}",
                record.digest(),
                range.start + 1,
                range.end
            );
            let missing = missing_required(&schema, record);
            if !missing.is_empty() {
                println!("    missing required: {}", missing.join(", "));
            }
        }
    }
}

pub(crate) fn record_json(schema: &RecordSchema, record: &TextRecord) -> Value {
    let mut value = json!(record);
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "missingRequired".to_string(),
            json!(missing_required(schema, record)),
        );
    }
    value
}

fn missing_required<'a>(schema: &'a RecordSchema, record: &TextRecord) -> Vec<&'a str> {
    schema
        .missing_required(record)
        .into_iter()
        .map(|field| field.name.as_str())
        .collect()
}
