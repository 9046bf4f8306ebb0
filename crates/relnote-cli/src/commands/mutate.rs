use crate::config::RelnoteConfig;
use crate::support::{print_json, read_payload_or_exit, schema_or_exit, store_op_or_exit};
use relnote_store::{FileMutator, ReplaceOutcome};
use serde_json::json;
use std::path::{Path, PathBuf};

pub fn run_insert(
    file: PathBuf,
    group: String,
    payload: PathBuf,
    schema: Option<String>,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, schema.as_deref());
    let text = read_payload_or_exit(Some(&payload));
    let outcome = store_op_or_exit(FileMutator::new(&schema).insert(&file, &group, &text));

    if json_output {
        print_json(&json!({
            "action": "insert",
            "path": file.display().to_string(),
            "group": outcome.group,
            "groupCreated": outcome.group_created,
            "digest": outcome.digest,
            "firstLine": outcome.first_line + 1
        }));
    } else {
        println!(
            "relnote insert\n  Group: [{}]{}\n  Digest: {}\n  Line: {}\n  Path: {}",
            outcome.group,
            if outcome.group_created { " (created)" } else { "" },
            outcome.digest,
            outcome.first_line + 1,
            file.display()
        );
    }
}

pub fn run_update(
    file: PathBuf,
    digest: String,
    payload: PathBuf,
    schema: Option<String>,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, schema.as_deref());
    let text = read_payload_or_exit(Some(&payload));
    let outcome = store_op_or_exit(FileMutator::new(&schema).update(&file, &digest, &text));
    report_replace("update", &file, &outcome, json_output);
}

pub fn run_remove(
    file: PathBuf,
    digest: String,
    schema: Option<String>,
    config: &RelnoteConfig,
    json_output: bool,
) {
    let schema = schema_or_exit(config, schema.as_deref());
    let outcome = store_op_or_exit(FileMutator::new(&schema).remove(&file, &digest));
    report_replace("remove", &file, &outcome, json_output);
}

fn report_replace(action: &str, file: &Path, outcome: &ReplaceOutcome, json_output: bool) {
    let previous = &outcome.previous;
    if json_output {
        print_json(&json!({
            "action": action,
            "path": file.display().to_string(),
            "group": previous.group(),
            "previousDigest": previous.digest(),
            "digest": outcome.digest
        }));
        return;
    }

    println!(
        "relnote {action}\n  Group: [{}]\n  Previous: {}",
        previous.group(),
        previous.digest()
    );
    if let Some(digest) = &outcome.digest {
        println!("  Digest: {digest}");
    }
    println!("  Path: {}", file.display());
}
