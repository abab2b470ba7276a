use std::collections::BTreeMap;

use crate::aggregate::FoldStats;
use crate::model::{CatalogRecord, ClassifiedResult, ReconBucket, RunSummary, Verdict};

/// Tally of verdicts that never reach a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictTally {
    pub confirmed: usize,
    pub declared_only: usize,
    pub unclassified: usize,
    pub empty: usize,
}

impl VerdictTally {
    pub fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Reported(_) => {}
            Verdict::Confirmed { .. } => self.confirmed += 1,
            Verdict::DeclaredOnly => self.declared_only += 1,
            Verdict::Unclassified => self.unclassified += 1,
            Verdict::Empty => self.empty += 1,
        }
    }
}

/// Compute run statistics from the classified outcomes and the fold state.
pub fn compute_summary(
    records: &BTreeMap<String, CatalogRecord>,
    outcomes: &[ClassifiedResult],
    tally: &VerdictTally,
    fold: &FoldStats,
    duplicate_identifiers: Option<usize>,
) -> RunSummary {
    // Every bucket appears, even at zero, so the JSON shape is stable.
    let mut bucket_counts: BTreeMap<String, usize> = ReconBucket::ALL
        .iter()
        .map(|b| (b.to_string(), 0))
        .collect();
    let mut needs_review = 0;
    for o in outcomes {
        *bucket_counts.entry(o.bucket.to_string()).or_insert(0) += 1;
        if o.bucket.needs_review() {
            needs_review += 1;
        }
    }

    let (volumes_found, volumes_missing) = count_volumes(records);

    RunSummary {
        total_records: records.len(),
        confirmed: tally.confirmed,
        declared_only: tally.declared_only,
        unclassified: tally.unclassified,
        empty_records: tally.empty,
        needs_review,
        bucket_counts,
        volumes_found,
        volumes_missing,
        images_with_detections: fold.images_with_detections,
        ambiguous_images: fold.ambiguous_images,
        works_without_record: fold.works_without_record,
        duplicate_identifiers,
    }
}

/// Found = volumes with scan data; missing = indexed volumes without any.
fn count_volumes(records: &BTreeMap<String, CatalogRecord>) -> (usize, usize) {
    let mut found = 0;
    let mut missing = 0;
    for record in records.values() {
        found += record.per_volume.len();
        missing += record
            .volume_order
            .keys()
            .filter(|k| !record.per_volume.contains_key(*k))
            .count();
    }
    (found, missing)
}
