//! StoreParser: raw file text -> groups of typed records.
//!
//! File layout:
//!
//! ```text
//! [GroupName]
//!
//! Title: first line of value
//!     continuation line
//! Affected:
//!     [x] Server: restart required
//!     [ ] Client
//!
//! Title: next record
//! ```
//!
//! Blank lines and group markers end a record. Record bodies are kept
//! verbatim as `raw_text` so the mutator can address them by line range.

use crate::error::{ParseError, ParseProblem, StoreError};
use crate::record::{Checklist, ChecklistItem, FieldValue, FieldValues, TextRecord};
use crate::schema::{FieldKind, RecordSchema};
use crate::snapshot::{DEFAULT_GROUP, StoreSnapshot};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

fn group_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[[A-Za-z0-9]+\]\s*$").expect("group marker regex must compile"))
}

/// Strip one leading `[` and one trailing `]`, leaving unbalanced input as-is.
pub fn remove_square_brackets(text: &str) -> &str {
    let text = text.strip_prefix('[').unwrap_or(text);
    text.strip_suffix(']').unwrap_or(text)
}

/// Group name carried by a marker line, if `line` is one.
pub fn group_marker_name(line: &str) -> Option<&str> {
    if group_marker_re().is_match(line) {
        Some(remove_square_brackets(line.trim_end()))
    } else {
        None
    }
}

/// True when `name` can be written as a marker line and read back unchanged.
pub fn is_valid_group_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Split file content into lines the same way `BufRead::lines` does.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Parse a sequence of lines with `schema`.
///
/// All separator problems in the input are collected before failing.
pub fn parse<I, S>(schema: &RecordSchema, lines: I) -> Result<StoreSnapshot, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = ParseState::new(schema);
    for (line_no, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        state.push_line(line_no, line.strip_suffix('\r').unwrap_or(line));
    }
    state.finish()
}

/// Parser bound to one record schema.
#[derive(Debug, Clone, Copy)]
pub struct StoreParser<'s> {
    schema: &'s RecordSchema,
}

impl<'s> StoreParser<'s> {
    pub fn new(schema: &'s RecordSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s RecordSchema {
        self.schema
    }

    pub fn parse_str(&self, text: &str) -> Result<StoreSnapshot, ParseError> {
        parse(self.schema, split_lines(text))
    }

    pub fn parse_reader(&self, reader: impl BufRead) -> Result<StoreSnapshot, StoreError> {
        let mut state = ParseState::new(self.schema);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StoreError::io(format!("line {}", line_no + 1), e))?;
            state.push_line(line_no, &line);
        }
        Ok(state.finish()?)
    }

    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<StoreSnapshot, StoreError> {
        let path = path.as_ref();
        let text = read_store_text(path)?;
        self.parse_str(&text)
            .map_err(|err| StoreError::Parse(err.with_source(path)))
    }
}

/// Read a store file, rejecting content that is not UTF-8.
pub(crate) fn read_store_text(path: &Path) -> Result<String, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
    String::from_utf8(bytes).map_err(|e| {
        StoreError::io(
            format!("read {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

struct ParseState<'s> {
    schema: &'s RecordSchema,
    groups: IndexMap<String, Vec<TextRecord>>,
    current_group: String,
    body: Vec<String>,
    body_start: usize,
    problems: Vec<ParseProblem>,
}

impl<'s> ParseState<'s> {
    fn new(schema: &'s RecordSchema) -> Self {
        Self {
            schema,
            groups: IndexMap::new(),
            current_group: DEFAULT_GROUP.to_string(),
            body: Vec::new(),
            body_start: 0,
            problems: Vec::new(),
        }
    }

    fn push_line(&mut self, line_no: usize, line: &str) {
        if is_blank(line) {
            self.terminate();
            return;
        }
        if let Some(name) = group_marker_name(line) {
            self.terminate();
            self.current_group = name.to_string();
            self.groups.entry(self.current_group.clone()).or_default();
            return;
        }
        if self.body.is_empty() {
            self.body_start = line_no;
        }
        self.body.push(line.to_string());
    }

    fn terminate(&mut self) {
        if self.body.is_empty() {
            return;
        }
        let body = std::mem::take(&mut self.body);
        let fields = decode_body(self.schema, &body, self.body_start, &mut self.problems);
        let record = TextRecord::new(
            self.current_group.clone(),
            body.join("\n"),
            self.body_start,
            fields,
        );
        tracing::trace!(
            group = %record.group(),
            first_line = record.first_line(),
            line_count = record.line_count(),
            "parsed record"
        );
        self.groups
            .entry(self.current_group.clone())
            .or_default()
            .push(record);
    }

    fn finish(mut self) -> Result<StoreSnapshot, ParseError> {
        self.terminate();
        if !self.problems.is_empty() {
            return Err(ParseError::new(self.problems));
        }
        Ok(StoreSnapshot::from_groups(self.groups))
    }
}

fn decode_body(
    schema: &RecordSchema,
    body: &[String],
    first_line: usize,
    problems: &mut Vec<ParseProblem>,
) -> FieldValues {
    let mut collected: Vec<(&str, Vec<&str>)> = Vec::new();
    for (offset, line) in body.iter().enumerate() {
        if line.starts_with([' ', '\t']) {
            match collected.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => tracing::debug!(
                    line = first_line + offset + 1,
                    "continuation line without a field title ignored"
                ),
            }
            continue;
        }
        match line.split_once(':') {
            Some((title, rest)) => {
                let rest = rest.trim();
                let seed = if rest.is_empty() { Vec::new() } else { vec![rest] };
                collected.push((title.trim(), seed));
            }
            None => problems.push(ParseProblem {
                line: first_line + offset + 1,
                content: line.clone(),
            }),
        }
    }

    let mut fields = FieldValues::new();
    for (title, lines) in collected {
        let Some(spec) = schema.field_by_title(title) else {
            tracing::debug!(title, schema = %schema.name, "unknown field title dropped");
            continue;
        };
        let text = merge_indented(&lines);
        let value = match spec.kind {
            FieldKind::Checklist => FieldValue::Checklist(decode_checklist(&text)),
            FieldKind::Line | FieldKind::Text => FieldValue::Text(text),
        };
        fields.insert(spec.name.clone(), value);
    }
    fields
}

fn indent_width(line: &str) -> usize {
    line.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

/// Join value lines after removing the smallest indent they share.
///
/// Tabs and spaces both count as one indent unit.
pub fn merge_indented<S: AsRef<str>>(lines: &[S]) -> String {
    let common = lines
        .iter()
        .map(|line| indent_width(line.as_ref()))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| &line.as_ref()[common..])
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode checklist lines: `[x] Name`, `[ ] Name: text`, `Name: text`, `Name`.
pub fn decode_checklist(text: &str) -> Checklist {
    let mut items = Checklist::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (checked, rest) = if let Some(rest) = line
            .strip_prefix("[x]")
            .or_else(|| line.strip_prefix("[X]"))
        {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("[ ]") {
            (false, rest)
        } else {
            (false, line)
        };
        let (name, value) = match rest.split_once(':') {
            Some((name, value)) => {
                let value = value.trim();
                (name.trim(), (!value.is_empty()).then(|| value.to_string()))
            }
            None => (rest.trim(), None),
        };
        if name.is_empty() {
            continue;
        }
        items.insert(name.to_string(), ChecklistItem::new(checked, value));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSchema;

    fn parse_release(text: &str) -> StoreSnapshot {
        StoreParser::new(&RecordSchema::release_note())
            .parse_str(text)
            .expect("fixture should parse")
    }

    #[test]
    fn remove_square_brackets_examples() {
        assert_eq!(remove_square_brackets("[aaa]"), "aaa");
        assert_eq!(remove_square_brackets("aaa"), "aaa");
        assert_eq!(remove_square_brackets("[aaa"), "aaa");
        assert_eq!(remove_square_brackets("aaa]"), "aaa");
        assert_eq!(remove_square_brackets("[[aaa]]"), "[aaa]");
    }

    #[test]
    fn group_marker_detection() {
        assert_eq!(group_marker_name("[Release42]"), Some("Release42"));
        assert_eq!(group_marker_name("[g1]  \t"), Some("g1"));
        assert_eq!(group_marker_name(" [g1]"), None);
        assert_eq!(group_marker_name("[g 1]"), None);
        assert_eq!(group_marker_name("[x] Server"), None);
        assert_eq!(group_marker_name("[]"), None);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let snapshot = parse_release("");
        assert_eq!(snapshot.group_count(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn marker_without_body_yields_empty_group() {
        let snapshot = parse_release("[g1]\n\n");
        assert_eq!(snapshot.group_names().collect::<Vec<_>>(), vec!["g1"]);
        assert_eq!(snapshot.group("g1").map(<[TextRecord]>::len), Some(0));
    }

    #[test]
    fn records_before_any_marker_use_default_group() {
        let snapshot = parse_release("Title: a\n\n[g1]\nTitle: b\n");
        assert_eq!(
            snapshot.group_names().collect::<Vec<_>>(),
            vec![DEFAULT_GROUP, "g1"]
        );
    }

    #[test]
    fn provenance_tracks_line_ranges() {
        let text = "[g1]\n\nTitle: a\nAuthor: jo\n\n\nTitle: b\n[g2]\nTitle: c";
        let snapshot = parse_release(text);
        let g1 = snapshot.group("g1").expect("g1");
        assert_eq!(g1.len(), 2);
        assert_eq!((g1[0].first_line(), g1[0].line_count()), (2, 2));
        assert_eq!(g1[0].raw_text(), "Title: a\nAuthor: jo");
        assert_eq!((g1[1].first_line(), g1[1].line_count()), (6, 1));
        let g2 = snapshot.group("g2").expect("g2");
        assert_eq!((g2[0].first_line(), g2[0].line_count()), (8, 1));
        assert_eq!(g2[0].group(), "g2");
    }

    #[test]
    fn crlf_input_is_normalized() {
        let snapshot = parse_release("[g1]\r\n\r\nTitle: a\r\nAuthor: b\r\n");
        let record = &snapshot.group("g1").expect("g1")[0];
        assert_eq!(record.raw_text(), "Title: a\nAuthor: b");
        assert_eq!(record.text("title"), Some("a"));
    }

    #[test]
    fn fields_decode_per_schema() {
        let text = "Title: Fix login\nAuthor:  jo \nDescription:\n    line one\n      line two\nAffected:\n\t[x] Server: restart\n\t[ ] Client\nBogus: dropped";
        let snapshot = parse_release(text);
        let record = snapshot.records().next().expect("one record");
        assert_eq!(record.text("title"), Some("Fix login"));
        assert_eq!(record.text("author"), Some("jo"));
        assert_eq!(record.text("description"), Some("line one\n  line two"));
        let affected = record.checklist("affected").expect("checklist");
        assert_eq!(
            affected.get("Server"),
            Some(&ChecklistItem::new(true, Some("restart".to_string())))
        );
        assert_eq!(affected.get("Client"), Some(&ChecklistItem::new(false, None)));
        assert!(record.field("Bogus").is_none());
        assert!(record.field("bogus").is_none());
        assert!(record.field("issue").is_none());
    }

    #[test]
    fn seeded_value_keeps_continuation_indent() {
        let text = "Description: first\n    second";
        let snapshot = parse_release(text);
        let record = snapshot.records().next().expect("one record");
        assert_eq!(record.text("description"), Some("first\n    second"));
    }

    #[test]
    fn merge_indented_strips_smallest_common_indent() {
        assert_eq!(
            merge_indented(&["    line one", "      line two"]),
            "line one\n  line two"
        );
        assert_eq!(merge_indented(&["\tone", "  two"]), "one\n two");
        assert_eq!(merge_indented::<&str>(&[]), "");
    }

    #[test]
    fn checklist_variants() {
        let items = decode_checklist("[X] Alpha\n[ ] Beta: note\nGamma: free text\nDelta\n\n[x]  : nameless");
        assert_eq!(items.len(), 4);
        assert!(items["Alpha"].checked);
        assert_eq!(items["Beta"], ChecklistItem::new(false, Some("note".to_string())));
        assert_eq!(items["Gamma"], ChecklistItem::new(false, Some("free text".to_string())));
        assert_eq!(items["Delta"], ChecklistItem::new(false, None));
        assert_eq!(
            items.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Alpha", "Beta", "Gamma", "Delta"]
        );
    }

    #[test]
    fn unknown_checklist_items_are_kept() {
        let snapshot = parse_release("Affected:\n    [x] Mainframe");
        let record = snapshot.records().next().expect("one record");
        assert!(record.checklist("affected").expect("checklist")["Mainframe"].checked);
    }

    #[test]
    fn missing_separators_are_aggregated() {
        let text = "Title: ok\nno separator here\n\n[g2]\nTitle: fine\nalso broken\n  indented is fine";
        let err = StoreParser::new(&RecordSchema::release_note())
            .parse_str(text)
            .expect_err("parse must fail");
        assert_eq!(
            err.problems,
            vec![
                ParseProblem {
                    line: 2,
                    content: "no separator here".to_string(),
                },
                ParseProblem {
                    line: 6,
                    content: "also broken".to_string(),
                },
            ]
        );
    }

    #[test]
    fn parse_reader_matches_parse_str() {
        let text = "[g1]\n\nTitle: a\n    more\n\nTitle: b\n";
        let from_reader = StoreParser::new(&RecordSchema::release_note())
            .parse_reader(text.as_bytes())
            .expect("reader parse");
        assert_eq!(from_reader, parse_release(text));
    }

    #[test]
    fn group_name_validation() {
        assert!(is_valid_group_name("Release42"));
        assert!(!is_valid_group_name(""));
        assert!(!is_valid_group_name("with space"));
        assert!(!is_valid_group_name("[g]"));
    }
}
