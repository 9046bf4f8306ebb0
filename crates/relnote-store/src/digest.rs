//! Record identity: SHA-1 over the raw record text.
//!
//! A record has no ID column. Two records with the same raw text are the
//! same record; editing one character makes it a different record.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Lowercase hex SHA-1 of a record's raw text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDigest(pub String);

impl RecordDigest {
    /// Digest the UTF-8 bytes of `raw_text`.
    pub fn of(raw_text: &str) -> Self {
        let hash = Sha1::digest(raw_text.as_bytes());
        Self(format!("{hash:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordDigest {
    fn from(value: &str) -> Self {
        Self(value.trim().to_ascii_lowercase())
    }
}

impl PartialEq<str> for RecordDigest {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Convenience wrapper returning the hex string directly.
pub fn digest(raw_text: &str) -> String {
    RecordDigest::of(raw_text).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_sha1_vectors() {
        assert_eq!(digest(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(digest("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn digest_is_deterministic() {
        let text = "Title: Fix login\nAuthor: jo";
        assert_eq!(digest(text), digest(text));
    }

    #[test]
    fn one_character_changes_the_digest() {
        assert_ne!(digest("Title: aaa"), digest("Title: aab"));
    }

    #[test]
    fn digest_hashes_utf8_bytes() {
        let text = "Title: caf\u{e9}";
        let expected = format!("{:x}", Sha1::digest("Title: café".as_bytes()));
        assert_eq!(digest(text), expected);
        assert_eq!(digest(text).len(), 40);
    }

    #[test]
    fn digest_from_user_input_is_normalized() {
        let parsed = RecordDigest::from("  A9993E364706816ABA3E25717850C26C9CD0D89D \n");
        assert_eq!(parsed, RecordDigest::of("abc"));
    }
}
