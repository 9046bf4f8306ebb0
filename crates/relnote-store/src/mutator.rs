//! FileMutator: single-record, format-preserving rewrites of a store file.
//!
//! Every operation reads the file fresh, computes the complete new content
//! in memory and then replaces the file atomically (sibling temp file +
//! rename). Lines outside the touched span are copied through verbatim,
//! each with its own line ending; new lines take the file's dominant ending.
//!
//! Nothing here locks the file. Update/Remove use the digest as an
//! optimistic precondition only: the record must still exist with exactly
//! the text the caller saw.

use crate::digest::RecordDigest;
use crate::error::{ParseError, StoreError};
use crate::parser::{
    StoreParser, group_marker_name, is_blank, is_valid_group_name, read_store_text,
};
use crate::record::TextRecord;
use crate::schema::RecordSchema;
use crate::snapshot::DEFAULT_GROUP;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub group: String,
    /// True when the group marker did not exist and was appended.
    pub group_created: bool,
    pub digest: RecordDigest,
    /// Zero-based line of the inserted record in the rewritten file.
    pub first_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    /// Record as it was before the rewrite.
    pub previous: TextRecord,
    /// Digest of the replacement text; `None` for removals.
    pub digest: Option<RecordDigest>,
}

/// One line of an existing file, split from its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceLine<'a> {
    text: &'a str,
    /// `"\r\n"`, `"\n"`, or empty for a last line without a newline.
    ending: &'a str,
}

/// Split `content` the same way the parser numbers lines.
fn split_source(content: &str) -> Vec<SourceLine<'_>> {
    content
        .split_inclusive('\n')
        .map(|raw| {
            if let Some(text) = raw.strip_suffix("\r\n") {
                SourceLine { text, ending: "\r\n" }
            } else if let Some(text) = raw.strip_suffix('\n') {
                SourceLine { text, ending: "\n" }
            } else {
                SourceLine { text: raw, ending: "" }
            }
        })
        .collect()
}

/// A line of the rewritten file. `ending` is `None` for lines the
/// mutator adds; they get the file's dominant ending.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutLine<'a> {
    text: String,
    ending: Option<&'a str>,
}

impl<'a> OutLine<'a> {
    fn kept(line: &SourceLine<'a>) -> Self {
        Self {
            text: line.text.to_string(),
            ending: Some(line.ending),
        }
    }

    fn added(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ending: None,
        }
    }

    fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }
}

/// Line terminator style of an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineLayout {
    /// Ending used for added lines: CRLF only when most lines use it.
    dominant: &'static str,
    trailing_newline: bool,
}

impl LineLayout {
    fn detect(content: &str) -> Self {
        let crlf = content.matches("\r\n").count();
        let lf = content.matches('\n').count() - crlf;
        Self {
            dominant: if crlf > lf { "\r\n" } else { "\n" },
            trailing_newline: content.ends_with('\n'),
        }
    }

    fn render(&self, lines: &[OutLine<'_>]) -> String {
        let mut out = String::new();
        for (idx, line) in lines.iter().enumerate() {
            out.push_str(&line.text);
            if idx + 1 == lines.len() && !self.trailing_newline {
                break;
            }
            match line.ending {
                Some(ending) if !ending.is_empty() => out.push_str(ending),
                _ => out.push_str(self.dominant),
            }
        }
        out
    }
}

/// Clean up record text supplied by a caller.
///
/// Trailing whitespace is stripped from every line and leading/trailing
/// blank lines are dropped. The result must be a single record: non-empty,
/// with no blank or group-marker lines, and every unindented line must
/// carry a `:` separator.
pub fn normalize_payload(text: &str) -> Result<String, StoreError> {
    let lines = payload_lines(text)?;
    Ok(lines.join("\n"))
}

fn payload_lines(text: &str) -> Result<Vec<String>, StoreError> {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let start = lines
        .iter()
        .position(|line| !line.is_empty())
        .unwrap_or(lines.len());
    let lines = &lines[start..];

    if lines.is_empty() {
        return Err(StoreError::InvalidPayload("payload is empty".to_string()));
    }
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "blank line at payload line {} would split the record",
                idx + 1
            )));
        }
        if group_marker_name(line).is_some() {
            return Err(StoreError::InvalidPayload(format!(
                "payload line {} is a group marker: {line}",
                idx + 1
            )));
        }
    }
    if lines[0].starts_with([' ', '\t']) {
        return Err(StoreError::InvalidPayload(format!(
            "first payload line is indented and has no field to continue: {}",
            lines[0]
        )));
    }
    let problems: Vec<_> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.starts_with([' ', '\t']) && !line.contains(':'))
        .map(|(idx, line)| crate::error::ParseProblem {
            line: idx + 1,
            content: line.to_string(),
        })
        .collect();
    if !problems.is_empty() {
        return Err(StoreError::Parse(
            ParseError::new(problems).with_source(Path::new("<payload>")),
        ));
    }
    Ok(lines.iter().map(|line| line.to_string()).collect())
}

/// Splice `payload` into `group`, or append the group when it is missing.
///
/// Records before any marker belong to the default group unless the file
/// carries an explicit `[default]` marker; then that section is the target.
/// Returns the new lines, the payload's first line and whether the group
/// was created.
fn splice_insert<'a>(
    lines: &[SourceLine<'a>],
    group: &str,
    payload: &[String],
) -> (Vec<OutLine<'a>>, usize, bool) {
    fn splice(out: &mut Vec<OutLine<'_>>, payload: &[String]) -> usize {
        if out.last().is_some_and(|line| !line.is_blank()) {
            out.push(OutLine::added(""));
        }
        let first = out.len();
        out.extend(payload.iter().map(|line| OutLine::added(line.as_str())));
        out.push(OutLine::added(""));
        first
    }

    let mut out: Vec<OutLine<'a>> = Vec::with_capacity(lines.len() + payload.len() + 3);
    let mut in_group = group == DEFAULT_GROUP
        && !lines
            .iter()
            .any(|line| group_marker_name(line.text) == Some(DEFAULT_GROUP));
    let mut inserted_at: Option<usize> = None;

    for line in lines {
        if inserted_at.is_none()
            && let Some(name) = group_marker_name(line.text)
        {
            if in_group {
                inserted_at = Some(splice(&mut out, payload));
            }
            in_group = name == group;
        }
        out.push(OutLine::kept(line));
    }

    let mut group_created = false;
    let first_line = match inserted_at {
        Some(first) => first,
        None => {
            if !in_group {
                group_created = true;
                if out.last().is_some_and(|line| !line.is_blank()) {
                    out.push(OutLine::added(""));
                }
                out.push(OutLine::added(format!("[{group}]")));
                out.push(OutLine::added(""));
            }
            let first = splice(&mut out, payload);
            // Blank separator is only needed between blocks, not at EOF.
            out.pop();
            first
        }
    };
    (out, first_line, group_created)
}

/// Copy `lines` through, replacing the lines in `range` with `replacement`.
///
/// The last replacement line inherits the ending of the last replaced line.
fn replace_range<'a>(
    lines: &[SourceLine<'a>],
    range: Range<usize>,
    replacement: Option<&[String]>,
) -> Vec<OutLine<'a>> {
    let mut out = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if range.contains(&idx) {
            if idx == range.start
                && let Some(replacement) = replacement
            {
                out.extend(replacement.iter().map(|text| OutLine::added(text.as_str())));
                let span_ending = lines.get(range.end - 1).map(|last| last.ending);
                if let (Some(last), Some(ending)) = (out.last_mut(), span_ending) {
                    last.ending = Some(ending);
                }
            }
            continue;
        }
        out.push(OutLine::kept(line));
    }
    out
}

/// Rewrites one store file, one record at a time.
#[derive(Debug, Clone, Copy)]
pub struct FileMutator<'s> {
    parser: StoreParser<'s>,
}

impl<'s> FileMutator<'s> {
    pub fn new(schema: &'s RecordSchema) -> Self {
        Self {
            parser: StoreParser::new(schema),
        }
    }

    /// Insert `text` as a new record at the end of `group`.
    ///
    /// A missing group is appended to the end of the file with its marker.
    pub fn insert(
        &self,
        path: impl AsRef<Path>,
        group: &str,
        text: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let path = path.as_ref();
        if !is_valid_group_name(group) {
            return Err(StoreError::InvalidGroupName(group.to_string()));
        }
        let payload = payload_lines(text)?;
        let content = read_store_text(path)?;
        let mut layout = LineLayout::detect(&content);
        layout.trailing_newline = true;

        let (out, first_line, group_created) =
            splice_insert(&split_source(&content), group, &payload);
        write_atomic(path, &layout.render(&out))?;

        if group_created {
            tracing::info!(group, path = %path.display(), "group not found; created it at end of file");
        }
        let digest = RecordDigest::of(&payload.join("\n"));
        tracing::info!(group, %digest, first_line, path = %path.display(), "inserted record");
        Ok(InsertOutcome {
            group: group.to_string(),
            group_created,
            digest,
            first_line,
        })
    }

    /// Replace the record whose digest is `digest` with `text`.
    pub fn update(
        &self,
        path: impl AsRef<Path>,
        digest: &str,
        text: &str,
    ) -> Result<ReplaceOutcome, StoreError> {
        let payload = payload_lines(text)?;
        let new_digest = RecordDigest::of(&payload.join("\n"));
        let previous = self.rewrite_record(path.as_ref(), digest, Some(&payload))?;
        tracing::info!(old = %previous.digest(), new = %new_digest, "updated record");
        Ok(ReplaceOutcome {
            previous,
            digest: Some(new_digest),
        })
    }

    /// Delete the record whose digest is `digest`.
    pub fn remove(&self, path: impl AsRef<Path>, digest: &str) -> Result<ReplaceOutcome, StoreError> {
        let previous = self.rewrite_record(path.as_ref(), digest, None)?;
        tracing::info!(digest = %previous.digest(), "removed record");
        Ok(ReplaceOutcome {
            previous,
            digest: None,
        })
    }

    fn rewrite_record(
        &self,
        path: &Path,
        digest: &str,
        replacement: Option<&[String]>,
    ) -> Result<TextRecord, StoreError> {
        let digest = RecordDigest::from(digest);
        let content = read_store_text(path)?;
        let snapshot = self
            .parser
            .parse_str(&content)
            .map_err(|err| StoreError::Parse(err.with_source(path)))?;
        let record = snapshot
            .get_by_digest(digest.as_str())
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound {
                digest: digest.to_string(),
                path: path.display().to_string(),
            })?;

        let out = replace_range(&split_source(&content), record.line_range(), replacement);
        write_atomic(path, &LineLayout::detect(&content).render(&out))?;
        Ok(record)
    }
}

/// Resolve a symlinked store path to the file it points at.
fn write_target(path: &Path) -> Result<PathBuf, StoreError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path)
            .map_err(|e| StoreError::io(format!("resolve {}", path.display()), e)),
        _ => Ok(path.to_path_buf()),
    }
}

/// Replace `path` with `content` without ever exposing a partial file.
///
/// A symlinked `path` stays a symlink; its target is replaced. The new
/// file takes the permission bits of the one it replaces.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let target = write_target(path)?;
    let path = target.as_path();
    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), StoreError> {
        let mut file = File::create(&tmp_path)
            .map_err(|e| StoreError::io(format!("create {}", tmp_path.display()), e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(format!("write {}", tmp_path.display()), e))?;
        file.sync_all()
            .map_err(|e| StoreError::io(format!("sync {}", tmp_path.display()), e))?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(&tmp_path, meta.permissions()).map_err(|e| {
                StoreError::io(format!("set permissions on {}", tmp_path.display()), e)
            })?;
        }
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(
            format!("{} -> {}", tmp_path.display(), path.display()),
            e,
        )
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<SourceLine<'_>> {
        split_source(text)
    }

    fn joined(out: &[OutLine<'_>]) -> String {
        out.iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn payload(text: &str) -> Vec<String> {
        payload_lines(text).expect("payload should be valid")
    }

    #[test]
    fn payload_is_trimmed_to_one_record() {
        assert_eq!(
            normalize_payload("\n\nTitle: a  \n    more\t\n\n \n").expect("valid"),
            "Title: a\n    more"
        );
    }

    #[test]
    fn payload_rejects_empty_split_and_marker() {
        assert!(matches!(normalize_payload(" \n\n"), Err(StoreError::InvalidPayload(_))));
        assert!(matches!(
            normalize_payload("Title: a\n\nTitle: b"),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(matches!(
            normalize_payload("Title: a\n[g2]"),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(matches!(
            normalize_payload("Title: a\nno colon"),
            Err(StoreError::Parse(_))
        ));
    }

    #[test]
    fn payload_rejects_indented_first_line() {
        assert!(matches!(
            normalize_payload("  Title: x"),
            Err(StoreError::InvalidPayload(_))
        ));
        assert!(matches!(
            normalize_payload("\n\tTitle: x\nAuthor: y"),
            Err(StoreError::InvalidPayload(_))
        ));
    }

    #[test]
    fn splice_before_next_group_marker() {
        let (out, first, created) = splice_insert(
            &lines("[g1]\n\nTitle: a\n\n[g2]\n\nTitle: b"),
            "g1",
            &payload("Title: new"),
        );
        assert!(!created);
        assert_eq!(first, 4);
        assert_eq!(
            joined(&out),
            "[g1]\n\nTitle: a\n\nTitle: new\n\n[g2]\n\nTitle: b"
        );
    }

    #[test]
    fn splice_adds_separator_when_missing() {
        let (out, first, _) = splice_insert(
            &lines("[g1]\nTitle: a\n[g2]\nTitle: b"),
            "g1",
            &payload("Title: new"),
        );
        assert_eq!(first, 3);
        assert_eq!(
            joined(&out),
            "[g1]\nTitle: a\n\nTitle: new\n\n[g2]\nTitle: b"
        );
    }

    #[test]
    fn splice_at_end_of_last_group() {
        let (out, first, created) =
            splice_insert(&lines("[g1]\n\nTitle: a"), "g1", &payload("Title: new"));
        assert!(!created);
        assert_eq!(first, 4);
        assert_eq!(joined(&out), "[g1]\n\nTitle: a\n\nTitle: new");
    }

    #[test]
    fn missing_group_is_appended() {
        let (out, first, created) =
            splice_insert(&lines("[g1]\n\nTitle: a"), "g9", &payload("Title: new"));
        assert!(created);
        assert_eq!(first, 6);
        assert_eq!(joined(&out), "[g1]\n\nTitle: a\n\n[g9]\n\nTitle: new");
    }

    #[test]
    fn default_group_insert_precedes_first_marker() {
        let (out, first, created) = splice_insert(
            &lines("Title: loose\n[g1]\nTitle: a"),
            DEFAULT_GROUP,
            &payload("Title: new"),
        );
        assert!(!created);
        assert_eq!(first, 2);
        assert_eq!(joined(&out), "Title: loose\n\nTitle: new\n\n[g1]\nTitle: a");
    }

    #[test]
    fn default_group_insert_targets_explicit_default_marker() {
        let (out, first, created) = splice_insert(
            &lines("[g1]\nTitle: a\n\n[default]\nTitle: b"),
            DEFAULT_GROUP,
            &payload("Title: new"),
        );
        assert!(!created);
        assert_eq!(first, 6);
        assert_eq!(
            joined(&out),
            "[g1]\nTitle: a\n\n[default]\nTitle: b\n\nTitle: new"
        );
    }

    #[test]
    fn insert_into_empty_file_creates_group() {
        let (out, first, created) = splice_insert(&[], "g1", &payload("Title: new"));
        assert!(created);
        assert_eq!(first, 2);
        assert_eq!(joined(&out), "[g1]\n\nTitle: new");
    }

    #[test]
    fn replace_range_swaps_only_the_span() {
        let source = lines("[g1]\n\nTitle: a\n    more\n\nTitle: b");
        let replaced = replace_range(&source, 2..4, Some(&payload("Title: c")));
        assert_eq!(joined(&replaced), "[g1]\n\nTitle: c\n\nTitle: b");
        let removed = replace_range(&source, 2..4, None);
        assert_eq!(joined(&removed), "[g1]\n\n\nTitle: b");
    }

    #[test]
    fn split_source_keeps_each_ending() {
        let source = lines("a\r\nb\nc");
        assert_eq!(
            source,
            vec![
                SourceLine { text: "a", ending: "\r\n" },
                SourceLine { text: "b", ending: "\n" },
                SourceLine { text: "c", ending: "" },
            ]
        );
    }

    #[test]
    fn layout_picks_dominant_ending() {
        assert_eq!(LineLayout::detect("a\r\nb\r\nc\n").dominant, "\r\n");
        assert_eq!(LineLayout::detect("a\r\nb\nc\n").dominant, "\n");
        assert_eq!(LineLayout::detect("").dominant, "\n");
    }

    #[test]
    fn render_keeps_copied_endings_and_uses_dominant_for_new_lines() {
        let content = "a\r\nb\nc\r\n";
        let source = lines(content);
        let out = replace_range(&source, 1..2, Some(&payload("Title: x\n    y")));
        let layout = LineLayout::detect(content);
        assert_eq!(layout.render(&out), "a\r\nTitle: x\r\n    y\nc\r\n");
    }

    #[test]
    fn render_honors_missing_final_newline() {
        let content = "a\nb";
        let out = replace_range(&lines(content), 0..1, None);
        assert_eq!(LineLayout::detect(content).render(&out), "b");
        assert_eq!(LineLayout::detect("").render(&[]), "");

        let mut layout = LineLayout::detect(content);
        layout.trailing_newline = true;
        let (out, _, _) = splice_insert(&lines(content), DEFAULT_GROUP, &payload("Title: c"));
        assert_eq!(layout.render(&out), "a\nb\n\nTitle: c\n");
    }
}
