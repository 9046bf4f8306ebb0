//! StoreDiff: records that appear in a newer snapshot but not an older one.
//!
//! Only additions are reported. An edited record shows up as a new record
//! (its old text is simply absent from the result), and removed records are
//! not reported at all.

use crate::digest::RecordDigest;
use crate::record::TextRecord;
use crate::snapshot::StoreSnapshot;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Per-group digest sets of one snapshot.
#[derive(Debug, Default)]
pub struct DigestIndex<'a> {
    groups: HashMap<&'a str, HashSet<&'a RecordDigest>>,
}

impl<'a> DigestIndex<'a> {
    /// Index every record of `snapshot` by group and digest.
    ///
    /// Two identical records in one group are a logic error for diffing
    /// and trip a debug assertion.
    pub fn build(snapshot: &'a StoreSnapshot) -> Self {
        let mut groups: HashMap<&'a str, HashSet<&'a RecordDigest>> = HashMap::new();
        for (name, records) in snapshot.groups() {
            let digests = groups.entry(name.as_str()).or_default();
            for record in records {
                let inserted = digests.insert(record.digest());
                debug_assert!(
                    inserted,
                    "duplicate digest {} in group {name}",
                    record.digest()
                );
                if !inserted {
                    tracing::warn!(group = %name, digest = %record.digest(), "duplicate record in group");
                }
            }
        }
        Self { groups }
    }

    pub fn contains(&self, group: &str, digest: &RecordDigest) -> bool {
        self.groups
            .get(group)
            .is_some_and(|digests| digests.contains(digest))
    }
}

/// Records new in a snapshot, grouped in the newer snapshot's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NewRecords {
    groups: IndexMap<String, Vec<TextRecord>>,
}

impl NewRecords {
    pub fn groups(&self) -> &IndexMap<String, Vec<TextRecord>> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&[TextRecord]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_groups(self) -> IndexMap<String, Vec<TextRecord>> {
        self.groups
    }

    /// Plain-text digest of the new records, one block per group.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (group, records) in &self.groups {
            out.push_str(&format!("[{group}] {} new record(s)\n", records.len()));
            for record in records {
                for line in record.raw_text().lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        out
    }
}

/// Records of `new` whose digest is absent from the same-named group of `old`.
///
/// Groups with no new records are omitted.
pub fn diff(old: &StoreSnapshot, new: &StoreSnapshot) -> NewRecords {
    let index = DigestIndex::build(old);
    let mut groups: IndexMap<String, Vec<TextRecord>> = IndexMap::new();
    for (name, records) in new.groups() {
        let added: Vec<TextRecord> = records
            .iter()
            .filter(|record| !index.contains(name, record.digest()))
            .cloned()
            .collect();
        if !added.is_empty() {
            groups.insert(name.clone(), added);
        }
    }
    tracing::debug!(
        groups = groups.len(),
        records = groups.values().map(Vec::len).sum::<usize>(),
        "computed snapshot diff"
    );
    NewRecords { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::StoreParser;
    use crate::schema::{FieldKind, FieldSpec, RecordSchema};

    fn name_schema() -> RecordSchema {
        RecordSchema::new("names", vec![FieldSpec::new("name", "Name", FieldKind::Line)])
    }

    fn snapshot(text: &str) -> StoreSnapshot {
        StoreParser::new(&name_schema())
            .parse_str(text)
            .expect("fixture should parse")
    }

    fn names(records: &[TextRecord]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|record| record.text("name"))
            .collect()
    }

    #[test]
    fn diff_reports_only_additions_per_group() {
        let old = snapshot("[g1]\n\nName: aaa\n\nName: bbb\n\n[g2]\n\nName: ccc");
        let new = snapshot("[g1]\n\nName: aaa\n\nName: ddd\n\n[g2]\n\nName: ccc\n\nName: eee");

        let result = diff(&old, &new);
        assert_eq!(
            result.groups().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["g1", "g2"]
        );
        assert_eq!(names(result.group("g1").expect("g1")), vec!["ddd"]);
        assert_eq!(names(result.group("g2").expect("g2")), vec!["eee"]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn same_record_in_another_group_counts_as_new() {
        let old = snapshot("[g1]\nName: aaa");
        let new = snapshot("[g2]\nName: aaa");
        let result = diff(&old, &new);
        assert_eq!(names(result.group("g2").expect("g2")), vec!["aaa"]);
        assert!(result.group("g1").is_none());
    }

    #[test]
    fn unchanged_snapshot_yields_empty_diff() {
        let text = "[g1]\nName: aaa\n\n[g2]\n";
        let result = diff(&snapshot(text), &snapshot(text));
        assert!(result.is_empty());
        assert_eq!(result.len(), 0);
    }

    #[test]
    fn removals_are_not_reported() {
        let old = snapshot("[g1]\nName: aaa\n\nName: bbb");
        let new = snapshot("[g1]\nName: aaa");
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn order_follows_new_snapshot() {
        let old = snapshot("");
        let new = snapshot("[b]\nName: 2\n\nName: 1\n[a]\nName: 3");
        let result = diff(&old, &new);
        assert_eq!(
            result.groups().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert_eq!(names(result.group("b").expect("b")), vec!["2", "1"]);
    }

    #[test]
    fn summary_lists_groups_and_indented_text() {
        let old = snapshot("");
        let new = snapshot("[g1]\nName: aaa");
        assert_eq!(diff(&old, &new).summary(), "[g1] 1 new record(s)\n  Name: aaa\n\n");
    }
}
