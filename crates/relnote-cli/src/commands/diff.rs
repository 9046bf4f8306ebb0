use crate::commands::parse::record_json;
use crate::config::RelnoteConfig;
use crate::support::{parse_file_or_exit, print_json, schema_or_exit};
use relnote_store::diff;
use serde_json::json;
use std::path::PathBuf;

pub fn run(
    old: PathBuf,
    new: PathBuf,
    schema: Option<String>,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, schema.as_deref());
    let old_snapshot = parse_file_or_exit(&schema, &old);
    let new_snapshot = parse_file_or_exit(&schema, &new);
    let added = diff(&old_snapshot, &new_snapshot);

    if json_output {
        let groups = added
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
            "action": "diff",
            "oldPath": old.display().to_string(),
            "newPath": new.display().to_string(),
            "count": added.len(),
            "groups": groups
        }));
    } else if added.is_empty() {
        println!("relnote diff\n  No new records");
    } else {
        println!("relnote diff\n  New records: {}\n", added.len());
        print!("{}", added.summary());
    }
}
