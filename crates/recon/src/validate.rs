//! Shape and checksum predicates over normalized identifiers.
//!
//! The three predicates are used at different decision points by the
//! classifier and are deliberately kept separate. Digits are ASCII only;
//! the checksum arithmetic works on bytes.

use once_cell::sync::Lazy;
use regex::Regex;

static WELL_FORMED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{9}[0-9X]|[0-9]{13})$").expect("valid well-formed regex"));

// 7 digits + check char, accepted for data reviewed under the older rules.
static LEGACY_SHORT_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{7}[0-9X]$").expect("valid legacy short-form regex"));

static CHECKSUM_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{9}|[0-9]{12})([0-9X])$").expect("valid checksum shape regex"));

/// ISBN-10 shape, 13-digit shape, or the legacy 8-character shape.
pub fn well_formed(id: &str) -> bool {
    well_formed_with(id, true)
}

/// [`well_formed`] with the legacy 8-character shape switchable.
pub fn well_formed_with(id: &str, legacy_short_form: bool) -> bool {
    WELL_FORMED.is_match(id) || (legacy_short_form && LEGACY_SHORT_FORM.is_match(id))
}

/// Position-weighted checksum over the body: `Σ (i × dᵢ)` for i = 1..n-1,
/// compared mod 11 (10 characters) or mod 10 (13 characters) against the
/// final character, where `X` counts as 10.
pub fn checksum_valid(id: &str) -> bool {
    let Some(caps) = CHECKSUM_SHAPE.captures(id) else {
        return false;
    };
    let body = &caps[1];
    let check = match &caps[2] {
        "X" => 10,
        d => u32::from(d.as_bytes()[0] - b'0'),
    };
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| (i as u32 + 1) * u32::from(b - b'0'))
        .sum();
    if id.len() == 10 {
        sum % 11 == check
    } else {
        sum % 10 == check
    }
}

/// Standard ISBN-13 / EAN-13 check: alternating 1/3 weights, total ≡ 0 mod 10.
pub fn isbn13_check_valid(id: &str) -> bool {
    if id.len() != 13 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = id
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    sum % 10 == 0
}

/// Well-formed, in the 978/979 bookland namespace, and passing the ISBN-13 check.
pub fn looks_good(id: &str) -> bool {
    well_formed(id) && (id.starts_with("978") || id.starts_with("979")) && isbn13_check_valid(id)
}
