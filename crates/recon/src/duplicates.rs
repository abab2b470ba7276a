//! Cross-record duplicate check: the same physical number cannot belong to
//! two different works, so any identifier string held by more than one
//! record is reported for a cataloger to look at. Nothing is corrected.

use std::collections::{BTreeMap, BTreeSet};

use crate::identifier::IdKind;
use crate::model::{CatalogRecord, Diagnostic};

/// Identifier strings (declared or scanned) held by more than one record,
/// ordered by identifier. Volume indices are not identifiers and are skipped.
pub fn find_duplicates(records: &BTreeMap<String, CatalogRecord>) -> Vec<Diagnostic> {
    let mut owners: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records.values() {
        for id in record.declared.iter().chain(record.scanned.iter()) {
            if matches!(id.kind, IdKind::VolumeIndex | IdKind::Unknown) {
                continue;
            }
            owners
                .entry(id.as_str())
                .or_default()
                .insert(record.key.as_str());
        }
    }

    owners
        .into_iter()
        .filter(|(_, recs)| recs.len() > 1)
        .map(|(id, recs)| Diagnostic::DuplicateIdentifier {
            identifier: id.to_string(),
            records: recs.into_iter().map(str::to_string).collect(),
        })
        .collect()
}
