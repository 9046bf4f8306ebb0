//! StoreSnapshot: the immutable parse result of one file at one instant.

use crate::record::TextRecord;
use indexmap::IndexMap;
use serde::Serialize;

/// Group name used for records that precede any `[Name]` marker.
pub const DEFAULT_GROUP: &str = "default";

/// Groups of records in order of first appearance in the file.
///
/// A snapshot is never written back. Changes go through the file mutator
/// and become visible only by parsing again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StoreSnapshot {
    groups: IndexMap<String, Vec<TextRecord>>,
}

impl StoreSnapshot {
    pub fn from_groups(groups: IndexMap<String, Vec<TextRecord>>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &IndexMap<String, Vec<TextRecord>> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&[TextRecord]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// All records, group by group, in file order.
    pub fn records(&self) -> impl Iterator<Item = &TextRecord> {
        self.groups.values().flatten()
    }

    /// Total number of records across groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// True when the snapshot holds no records (it may still hold empty groups).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First record, scanning groups in order, whose digest matches.
    pub fn get_by_digest(&self, digest: &str) -> Option<&TextRecord> {
        self.records().find(|record| record.digest() == digest)
    }

    pub fn into_groups(self) -> IndexMap<String, Vec<TextRecord>> {
        self.groups
    }
}
