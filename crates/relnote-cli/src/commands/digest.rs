use crate::support::{print_json, read_payload_or_exit, store_op_or_exit};
use relnote_store::{RecordDigest, normalize_payload};
use serde_json::json;
use std::path::PathBuf;

pub fn run(file: Option<PathBuf>, json_output: bool) {
    let text = read_payload_or_exit(file.as_deref());
    let payload = store_op_or_exit(normalize_payload(&text));
    let digest = RecordDigest::of(&payload);

    if json_output {
        print_json(&json!({
            "action": "digest",
            "digest": digest,
            "lineCount": payload.lines().count()
        }));
    } else {
        println!("{digest}");
    }
}
