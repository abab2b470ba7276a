//! Identifier normalization and kind classification.
//!
//! Raw strings come from two places: free-text catalog fields ("978-3-16-148410-0 (pbk.)")
//! and barcode payloads. Both go through [`normalize`] before anything else looks at them.
//! Normalization never fails; short or garbage output is left for the validator to judge.

use std::fmt;

use serde::Serialize;

use crate::validate::checksum_valid;

/// What namespace a normalized identifier most likely belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Isbn,
    Issn,
    Ean,
    VolumeIndex,
    Unknown,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isbn => write!(f, "isbn"),
            Self::Issn => write!(f, "issn"),
            Self::Ean => write!(f, "ean"),
            Self::VolumeIndex => write!(f, "volume_index"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A normalized identifier. `kind` and `valid` are derived from `value`,
/// so equality on the whole struct is equality on the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identifier {
    pub value: String,
    pub kind: IdKind,
    pub valid: bool,
}

impl Identifier {
    /// Normalize `raw` and derive its kind and checksum validity.
    pub fn parse(raw: &str) -> Self {
        Self::from_normalized(normalize(raw))
    }

    /// Wrap an already-normalized string.
    pub fn from_normalized(value: String) -> Self {
        let kind = guess_kind(&value);
        let valid = checksum_valid(&value);
        Self { value, kind, valid }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Normalize a raw identifier string.
///
/// Steps, in order: cut at the first `(`, cut at the first `/`, upper-case,
/// drop every `-` and space.
pub fn normalize(raw: &str) -> String {
    let mut s = raw;
    if let Some(pos) = s.find('(') {
        s = &s[..pos];
    }
    if let Some(pos) = s.find('/') {
        s = &s[..pos];
    }
    s.to_uppercase()
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect()
}

/// Split a catalog identifier field on `,` / `;` and normalize each piece.
/// Empty pieces are dropped.
pub fn split_field(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Guess the namespace of a normalized identifier.
///
/// Length checks run before the 13-digit prefix checks so that 8-digit ISSNs
/// and 2-digit volume indices never fall into the ISBN branch.
pub fn guess_kind(normalized: &str) -> IdKind {
    let len = normalized.chars().count();
    if len == 0 {
        return IdKind::Unknown;
    }
    if len == 8 {
        return IdKind::Issn;
    }
    if len == 2 {
        return IdKind::VolumeIndex;
    }
    if len != 13 {
        // 10 digits in the common case, or off-length garbage
        return IdKind::Isbn;
    }
    if normalized.starts_with("977") {
        return IdKind::Issn;
    }
    if normalized.starts_with("978") || normalized.starts_with("979") {
        return IdKind::Isbn;
    }
    IdKind::Ean
}
