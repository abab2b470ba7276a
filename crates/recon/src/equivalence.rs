//! Cross-length equivalence between identifiers.
//!
//! Both relations are pairwise over raw digit windows. Neither is transitive,
//! so callers comparing three or more identifiers must check every pair.

use crate::identifier::Identifier;

/// Same publication, possibly in another ISBN-10/ISBN-13 representation.
///
/// Equal lengths compare literally. A 10-character and a 13-character id are
/// equivalent when the 9-character body of the short form equals `long[3..12]`,
/// ignoring the EAN prefix and both check characters. Any other combination
/// compares literally.
pub fn equivalent(a: &str, b: &str) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        _ => {}
    }
    if a.len() == b.len() {
        return a == b;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    if short.len() == 10 && long.len() == 13 {
        return match (short.get(..9), long.get(3..12)) {
            (Some(s), Some(l)) => s == l,
            _ => false,
        };
    }
    a == b
}

/// Looser relation used when merging reviewed data: an empty side is
/// compatible with anything, and an 8- or 10-character id is compatible with
/// a 13-character id sharing its body at offset 3.
pub fn compatible(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    if a.len() == b.len() {
        return a == b;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    if long.len() != 13 {
        return false;
    }
    let body_len = match short.len() {
        10 => 9,
        8 => 7,
        _ => return false,
    };
    match (short.get(..body_len), long.get(3..3 + body_len)) {
        (Some(s), Some(l)) => s == l,
        _ => false,
    }
}

/// True iff `id` is [`equivalent`] to any member of `set`.
pub fn has_equivalent_in<'a, I>(id: &str, set: I) -> bool
where
    I: IntoIterator<Item = &'a Identifier>,
{
    set.into_iter().any(|other| equivalent(id, other.as_str()))
}

/// True iff `id` is [`compatible`] with every member of `set`.
pub fn keeps_all_compatible<I>(id: &str, set: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    set.into_iter().all(|other| compatible(id, other.as_ref()))
}
