//! `%name%` placeholder substitution for step argv templates.

use crate::StepError;
use std::path::{Path, PathBuf};

pub const TMP_FILENAME: &str = "tmpFilename";
pub const OUTPUT_FILE: &str = "outputFile";
pub const GROUP_NAME: &str = "groupName";
pub const ORIG_FILE: &str = "origFile";
pub const DIGEST: &str = "digest";

pub const PLACEHOLDER_NAMES: [&str; 5] = [TMP_FILENAME, OUTPUT_FILE, GROUP_NAME, ORIG_FILE, DIGEST];

/// Values available to one step sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    /// Scratch file holding the record payload.
    pub tmp_filename: Option<PathBuf>,
    /// Store file the built-in steps rewrite.
    pub output_file: Option<PathBuf>,
    pub group_name: Option<String>,
    /// Store file as known to version control, when it differs from the output.
    pub orig_file: Option<PathBuf>,
    /// Digest of the record an update/remove targets.
    pub digest: Option<String>,
}

impl Placeholders {
    pub fn with_tmp_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_filename = Some(path.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_group_name(mut self, group: impl Into<String>) -> Self {
        self.group_name = Some(group.into());
        self
    }

    pub fn with_orig_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.orig_file = Some(path.into());
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    fn lookup(&self, name: &str) -> Result<Option<String>, StepError> {
        let display = |path: &Option<PathBuf>| path.as_deref().map(|p| p.display().to_string());
        match name {
            TMP_FILENAME => Ok(display(&self.tmp_filename)),
            OUTPUT_FILE => Ok(display(&self.output_file)),
            GROUP_NAME => Ok(self.group_name.clone()),
            ORIG_FILE => Ok(display(&self.orig_file)),
            DIGEST => Ok(self.digest.clone()),
            other => Err(StepError::UnknownPlaceholder(other.to_string())),
        }
    }

    /// Value of a named placeholder, failing when it is not set.
    pub fn require(&self, name: &str) -> Result<String, StepError> {
        self.lookup(name)?
            .ok_or_else(|| StepError::MissingValue(name.to_string()))
    }

    pub(crate) fn require_path(&self, name: &str) -> Result<PathBuf, StepError> {
        self.require(name).map(PathBuf::from)
    }

    /// Replace every `%name%` token in `template`.
    ///
    /// A `%` that does not open an alphanumeric token is copied as-is.
    pub fn substitute(&self, template: &str) -> Result<String, StepError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(end)
                    if end > 0 && after[..end].chars().all(|c| c.is_ascii_alphanumeric()) =>
                {
                    out.push_str(&self.require(&after[..end])?);
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('%');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    pub fn substitute_all(&self, argv: &[String]) -> Result<Vec<String>, StepError> {
        argv.iter().map(|arg| self.substitute(arg)).collect()
    }
}

pub(crate) fn path_exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}
