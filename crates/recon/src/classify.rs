use indexmap::IndexSet;

use crate::equivalence::{equivalent, has_equivalent_in};
use crate::identifier::Identifier;
use crate::model::{CatalogRecord, ClassifiedResult, ReconBucket, Verdict, VolumeCoverage, VolumeRow};
use crate::validate::{looks_good, well_formed_with};

const NOT_ISBN13_NOTE: &str = "scanned identifier is not a valid ISBN-13";

/// Classify one aggregated record. Rules are tried in order; the first
/// that matches decides, so a record lands in at most one bucket.
///
/// 1. one declared, one scanned
/// 2. one declared (malformed), nothing scanned
/// 3. nothing declared, one scanned
/// 4. multi-volume (≥2 indexed volumes, scan data on at least one)
///
/// Anything else is unclassified.
pub fn classify_record(record: &CatalogRecord, legacy_short_form: bool) -> Verdict {
    let declared: Vec<&Identifier> = record.declared.iter().collect();
    let scanned: Vec<&Identifier> = record.scanned.iter().collect();

    if declared.is_empty() && scanned.is_empty() {
        return Verdict::Empty;
    }

    let coverage = volume_coverage(record);
    let coverage_note = coverage.as_ref().map(VolumeCoverage::note);

    match (declared.len(), scanned.len()) {
        (1, 1) => {
            return single_pair(record, declared[0], scanned[0], coverage, legacy_short_form);
        }
        (1, 0) => {
            if well_formed_with(declared[0].as_str(), legacy_short_form) {
                return Verdict::DeclaredOnly;
            }
            return Verdict::Reported(result(
                ReconBucket::Malformed,
                record,
                &declared,
                &[],
                None,
                None,
            ));
        }
        (0, 1) => {
            let mut notes = Vec::new();
            if !looks_good(scanned[0].as_str()) {
                notes.push(NOT_ISBN13_NOTE.to_string());
            }
            notes.extend(coverage_note);
            return Verdict::Reported(result(
                ReconBucket::NewIdentifier,
                record,
                &[],
                &scanned,
                join_notes(notes),
                coverage,
            ));
        }
        _ => {}
    }

    let Some(coverage) = coverage else {
        return Verdict::Unclassified;
    };

    let all_scanned = record.all_scanned();
    if all_scanned.len() == 1 {
        // Every volume carries the same number, checked against several
        // declared identifiers.
        return collapsed_against_many(record, &declared, &all_scanned, coverage);
    }

    let consistent = declared
        .iter()
        .all(|d| has_equivalent_in(d.as_str(), &all_scanned));
    let bucket = if consistent {
        ReconBucket::MultiVolumeConsistent
    } else {
        ReconBucket::MultiVolumeReview
    };

    let all: Vec<&Identifier> = all_scanned.iter().collect();
    let note = Some(coverage.note());
    let mut res = result(bucket, record, &declared, &all, note, Some(coverage));
    res.volumes = volume_rows(record);
    Verdict::Reported(res)
}

fn single_pair(
    record: &CatalogRecord,
    declared: &Identifier,
    scanned: &Identifier,
    coverage: Option<VolumeCoverage>,
    legacy_short_form: bool,
) -> Verdict {
    let coverage_note = coverage.as_ref().map(VolumeCoverage::note);

    if !well_formed_with(declared.as_str(), legacy_short_form) {
        let mut notes = Vec::new();
        if !looks_good(scanned.as_str()) {
            notes.push(NOT_ISBN13_NOTE.to_string());
        }
        notes.extend(coverage_note);
        return Verdict::Reported(result(
            ReconBucket::MalformedPair,
            record,
            &[declared],
            &[scanned],
            join_notes(notes),
            coverage,
        ));
    }

    if declared == scanned {
        return Verdict::Confirmed {
            note: coverage_note,
        };
    }

    let bucket = if equivalent(declared.as_str(), scanned.as_str()) {
        ReconBucket::EquivalentForm
    } else {
        ReconBucket::Substitution
    };
    Verdict::Reported(result(
        bucket,
        record,
        &[declared],
        &[scanned],
        coverage_note,
        coverage,
    ))
}

fn collapsed_against_many(
    record: &CatalogRecord,
    declared: &[&Identifier],
    all_scanned: &IndexSet<Identifier>,
    coverage: VolumeCoverage,
) -> Verdict {
    let Some(only) = all_scanned.first() else {
        return Verdict::Unclassified;
    };
    let note = coverage.note();

    if declared.iter().any(|d| *d == only) {
        return Verdict::Confirmed { note: Some(note) };
    }

    let bucket = if has_equivalent_in(only.as_str(), declared.iter().copied()) {
        ReconBucket::EquivalentForm
    } else {
        ReconBucket::Substitution
    };

    let mut notes = Vec::new();
    if bucket == ReconBucket::Substitution && !looks_good(only.as_str()) {
        notes.push(NOT_ISBN13_NOTE.to_string());
    }
    notes.push(note);
    Verdict::Reported(result(
        bucket,
        record,
        declared,
        &[only],
        join_notes(notes),
        Some(coverage),
    ))
}

/// Coverage of indexed volumes, for records with at least two indexed
/// volumes and scan data on at least one of them.
pub fn volume_coverage(record: &CatalogRecord) -> Option<VolumeCoverage> {
    if record.volume_order.len() < 2 || record.per_volume.is_empty() {
        return None;
    }

    let mut indexed: Vec<(i64, &String)> = record
        .volume_order
        .iter()
        .map(|(k, n)| (*n, k))
        .collect();
    indexed.sort();

    let volumes_found: Vec<i64> = indexed
        .iter()
        .filter(|(_, k)| record.per_volume.contains_key(*k))
        .map(|(n, _)| *n)
        .collect();
    if volumes_found.is_empty() {
        // scans only on groups without a volume number
        return None;
    }

    Some(VolumeCoverage {
        found: volumes_found.len(),
        total: indexed.len(),
        all_found: volumes_found.len() == indexed.len(),
        volumes_found,
    })
}

/// One row per volume in volume order; volumes without scan data get an
/// empty identifier list so the gap stays visible.
fn volume_rows(record: &CatalogRecord) -> Vec<VolumeRow> {
    record
        .ordered_volumes()
        .into_iter()
        .map(|(volume, key)| VolumeRow {
            volume,
            image_group: key.to_string(),
            identifiers: record
                .per_volume
                .get(key)
                .map(|ids| ids.iter().map(|id| id.value.clone()).collect::<Vec<_>>())
                .unwrap_or_default(),
        })
        .collect()
}

fn result(
    bucket: ReconBucket,
    record: &CatalogRecord,
    declared: &[&Identifier],
    scanned: &[&Identifier],
    note: Option<String>,
    coverage: Option<VolumeCoverage>,
) -> ClassifiedResult {
    ClassifiedResult {
        bucket,
        record_key: record.key.clone(),
        declared: declared.iter().map(|id| id.value.clone()).collect(),
        scanned: scanned.iter().map(|id| id.value.clone()).collect(),
        note,
        coverage,
        volumes: Vec::new(),
    }
}

fn join_notes(notes: Vec<String>) -> Option<String> {
    if notes.is_empty() {
        None
    } else {
        Some(notes.join("; "))
    }
}
