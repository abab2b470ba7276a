use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One catalog row: a record key and its normalized declared identifiers.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub record_key: String,
    pub identifiers: Vec<String>,
}

/// One row of the record ↔ work ↔ image-group lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub record_key: String,
    pub work_key: String,
    pub image_group_key: String,
    pub volume_index: Option<i64>,
    pub title_index: Option<i64>,
}

/// A raw barcode decode result for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Symbology, e.g. `EAN13`.
    #[serde(rename = "t")]
    pub symbology: String,
    /// Decoded payload; absent when the decoder could not render it as text.
    #[serde(rename = "d", default)]
    pub data: Option<String>,
    /// Bounding box as `left,top,width,height`.
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub filename: String,
    pub detections: Vec<Detection>,
}

/// One scanned physical volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGroup {
    pub key: String,
    pub volume_index: Option<i64>,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub key: String,
    pub image_groups: Vec<ImageGroup>,
}

/// Per-work detection data, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionDb {
    pub works: Vec<Work>,
}

/// Pre-loaded inputs for one run.
pub struct ReconInput {
    pub catalog: Vec<CatalogEntry>,
    pub mapping: Vec<MappingRow>,
    pub detections: DetectionDb,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// The unit of reconciliation: one catalog-level work family.
#[derive(Debug, Clone, Default)]
pub struct CatalogRecord {
    pub key: String,
    pub declared: IndexSet<Identifier>,
    pub scanned: IndexSet<Identifier>,
    /// Image-group key → identifiers found on that volume. Volumes with no
    /// qualifying detection have no entry.
    pub per_volume: BTreeMap<String, IndexSet<Identifier>>,
    /// Image-group key → declared volume number.
    pub volume_order: BTreeMap<String, i64>,
}

impl CatalogRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Image-group keys ordered by declared volume number; groups with scan
    /// data but no volume number follow, ordered by key.
    pub fn ordered_volumes(&self) -> Vec<(Option<i64>, &str)> {
        let mut indexed: Vec<(i64, &str)> = self
            .volume_order
            .iter()
            .map(|(k, n)| (*n, k.as_str()))
            .collect();
        indexed.sort();

        let mut out: Vec<(Option<i64>, &str)> =
            indexed.into_iter().map(|(n, k)| (Some(n), k)).collect();
        for key in self.per_volume.keys() {
            if !self.volume_order.contains_key(key) {
                out.push((None, key.as_str()));
            }
        }
        out
    }

    /// Union of per-volume identifiers in volume order, first-seen wins.
    pub fn all_scanned(&self) -> IndexSet<Identifier> {
        let mut all = IndexSet::new();
        for (_, key) in self.ordered_volumes() {
            if let Some(ids) = self.per_volume.get(key) {
                for id in ids {
                    all.insert(id.clone());
                }
            }
        }
        all
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconBucket {
    /// Declared identifier is malformed; reported next to what the scan found.
    MalformedPair,
    /// Scan shows the declared number in its other ISBN-10/13 form.
    EquivalentForm,
    /// Scan shows a different number; proposed replacement.
    Substitution,
    /// Declared identifier is malformed and nothing was scanned.
    Malformed,
    /// Nothing declared; the scan found one identifier.
    NewIdentifier,
    /// Volumes carry different identifiers, consistent with the catalog.
    MultiVolumeConsistent,
    /// Volumes carry different identifiers that conflict with the catalog.
    MultiVolumeReview,
}

impl ReconBucket {
    pub const ALL: [ReconBucket; 7] = [
        Self::MalformedPair,
        Self::EquivalentForm,
        Self::Substitution,
        Self::Malformed,
        Self::NewIdentifier,
        Self::MultiVolumeConsistent,
        Self::MultiVolumeReview,
    ];

    /// Report file name for this bucket.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::MalformedPair => "malformed-pairs.csv",
            Self::EquivalentForm => "equivalent-forms.csv",
            Self::Substitution => "substitutions.csv",
            Self::Malformed => "malformed.csv",
            Self::NewIdentifier => "new-identifiers.csv",
            Self::MultiVolumeConsistent => "multi-volume-consistent.csv",
            Self::MultiVolumeReview => "multi-volume-review.csv",
        }
    }

    pub fn is_multi_volume(&self) -> bool {
        matches!(self, Self::MultiVolumeConsistent | Self::MultiVolumeReview)
    }

    /// Buckets a person has to look at before anything is written back.
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            Self::MalformedPair | Self::Substitution | Self::Malformed | Self::MultiVolumeReview
        )
    }
}

impl std::fmt::Display for ReconBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPair => write!(f, "malformed_pair"),
            Self::EquivalentForm => write!(f, "equivalent_form"),
            Self::Substitution => write!(f, "substitution"),
            Self::Malformed => write!(f, "malformed"),
            Self::NewIdentifier => write!(f, "new_identifier"),
            Self::MultiVolumeConsistent => write!(f, "multi_volume_consistent"),
            Self::MultiVolumeReview => write!(f, "multi_volume_review"),
        }
    }
}

/// How many of a record's indexed volumes produced scan data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeCoverage {
    pub found: usize,
    pub total: usize,
    pub volumes_found: Vec<i64>,
    pub all_found: bool,
}

impl VolumeCoverage {
    pub fn note(&self) -> String {
        if self.all_found {
            format!("found on all {} volumes", self.total)
        } else {
            let list: Vec<String> = self.volumes_found.iter().map(|n| n.to_string()).collect();
            format!(
                "found on {}/{} volumes ({})",
                self.found,
                self.total,
                list.join(", ")
            )
        }
    }
}

/// One volume line of a multi-volume outcome. Empty `identifiers` means
/// the volume produced no scan data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeRow {
    pub volume: Option<i64>,
    pub image_group: String,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedResult {
    pub bucket: ReconBucket,
    pub record_key: String,
    pub declared: Vec<String>,
    pub scanned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<VolumeCoverage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeRow>,
}

/// Result of classifying one record. Only `Reported` lands in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Reported(ClassifiedResult),
    /// Scan agrees with the catalog; counted, not reported.
    Confirmed { note: Option<String> },
    /// One well-formed declared identifier and no scan data.
    DeclaredOnly,
    /// Has identifiers but matches no rule.
    Unclassified,
    /// Nothing declared, nothing scanned.
    Empty,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// More than one distinct qualifying barcode on a single image.
    AmbiguousImage {
        work: String,
        image_group: String,
        image: String,
        chosen: String,
        others: Vec<String>,
    },
    /// Work present in the detection database but absent from the mapping.
    WorkWithoutRecord { work: String },
    /// Record carries identifiers but no rule applies to it.
    Unclassified {
        record_key: String,
        declared: usize,
        scanned: usize,
    },
    /// The same identifier string under more than one record.
    DuplicateIdentifier {
        identifier: String,
        records: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub confirmed: usize,
    pub declared_only: usize,
    pub unclassified: usize,
    pub empty_records: usize,
    pub needs_review: usize,
    pub bucket_counts: BTreeMap<String, usize>,
    pub volumes_found: usize,
    pub volumes_missing: usize,
    pub images_with_detections: usize,
    pub ambiguous_images: usize,
    pub works_without_record: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_identifiers: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: RunSummary,
    pub outcomes: Vec<ClassifiedResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconResult {
    /// Outcomes of one bucket, in record-key order.
    pub fn bucket(&self, bucket: ReconBucket) -> Vec<&ClassifiedResult> {
        let mut rows: Vec<&ClassifiedResult> =
            self.outcomes.iter().filter(|o| o.bucket == bucket).collect();
        rows.sort_by(|a, b| a.record_key.cmp(&b.record_key));
        rows
    }

    pub fn duplicates(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::DuplicateIdentifier { identifier, records } => {
                Some((identifier.as_str(), records.as_slice()))
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}
