//! # relnote-store
//!
//! Flat-file record store for human-edited release notes.
//!
//! This crate provides:
//! - `StoreParser`: file text -> `StoreSnapshot` of grouped `TextRecord`s
//!   with exact provenance (line range, raw text, digest)
//! - `diff`: records new in one snapshot relative to another
//! - `FileMutator`: insert/update/remove of one record directly in the file
//! - `RecordSchema`: declared field lists used for decoding and rendering
//!
//! It does not run version control or shell commands; `relnote-steps`
//! wraps the mutator with those.
//!
//! ## Data model
//!
//! ```text
//! notes.txt (on disk, groups of blank-line separated records)
//!     |  parse                         ^  insert / update / remove
//!     v                                |
//! StoreSnapshot (immutable) --digest--> FileMutator
//! ```

pub mod diff;
pub mod digest;
pub mod error;
pub mod lock;
pub mod mutator;
pub mod parser;
pub mod record;
pub mod schema;
pub mod snapshot;

pub use diff::{DigestIndex, NewRecords, diff};
pub use digest::{RecordDigest, digest};
pub use error::{ParseError, ParseProblem, StoreError};
pub use lock::{FileLockGuard, store_lock_path, with_file_lock};
pub use mutator::{FileMutator, InsertOutcome, ReplaceOutcome, normalize_payload, write_atomic};
pub use parser::{
    StoreParser, decode_checklist, group_marker_name, is_valid_group_name, merge_indented, parse,
    remove_square_brackets,
};
pub use record::{Checklist, ChecklistItem, FieldValue, FieldValues, TextRecord};
pub use schema::{
    FieldKind, FieldSpec, RELEASE_NOTE_SCHEMA, RecordSchema, SUBSCRIBER_SCHEMA, find_schema,
};
pub use snapshot::{DEFAULT_GROUP, StoreSnapshot};
