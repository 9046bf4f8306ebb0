use crate::config::RelnoteConfig;
use crate::support::{fail, field_assignments_or_exit, print_json, schema_or_exit};
use relnote_store::{RecordDigest, RecordSchema, StoreParser};
use serde_json::json;

pub fn run(fields: Vec<String>, schema: Option<String>, config: &RelnoteConfig, json_output: bool) {
    let schema = schema_or_exit(config, schema.as_deref());
    let text = render_or_exit(&schema, &fields);
    let missing = missing_after_render(&schema, &text);

    if json_output {
        print_json(&json!({
            "action": "render",
            "schema": schema.name,
            "text": text,
            "digest": RecordDigest::of(&text),
            "missingRequired": missing
        }));
        return;
    }

    println!("{text}");
    if !missing.is_empty() {
        eprintln!("warning: missing required field(s): {}", missing.join(", "));
    }
}

/// Render `--field` assignments into record text.
pub fn render_or_exit(schema: &RecordSchema, fields: &[String]) -> String {
    let values = field_assignments_or_exit(schema, fields);
    let text = schema.render(&values);
    if text.is_empty() {
        fail("no non-empty field values to render");
    }
    text
}

fn missing_after_render(schema: &RecordSchema, text: &str) -> Vec<String> {
    let snapshot = StoreParser::new(schema)
        .parse_str(text)
        .unwrap_or_else(|e| fail(e));
    snapshot
        .records()
        .flat_map(|record| schema.missing_required(record))
        .map(|field| field.name.clone())
        .collect()
}
